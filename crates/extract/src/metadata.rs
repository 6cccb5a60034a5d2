use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::graph::KnowledgeGraph;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMention {
    pub text: String,
    pub label: String,
    /// Byte offsets in the source text
    pub start: usize,
    pub end: usize,
    /// True when the mention names a knowledge-graph entity
    pub linked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedText {
    pub source_id: String,
    pub text: String,
    pub mentions: Vec<EntityMention>,
}

pub trait EntityRecognizer: Send + Sync {
    fn recognize(&self, text: &str) -> Result<Vec<EntityMention>>;
}

/// Runs of capitalized words are proper nouns, all-caps words are organizations.
/// Sentence-initial single words are ignored.
pub struct CapitalizedSpanRecognizer;

impl EntityRecognizer for CapitalizedSpanRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<EntityMention>> {
        let mut mentions = Vec::new();
        let mut span: Option<(usize, usize, usize)> = None; // start, end, words
        let mut sentence_start = true;

        let push = |span: (usize, usize, usize), initial: bool, mentions: &mut Vec<EntityMention>| {
            let (start, end, words) = span;
            let surface = &text[start..end];
            if initial && words == 1 && !is_acronym(surface) {
                return;
            }
            let label = if words == 1 && is_acronym(surface) { "ORG" } else { "PROPN" };
            mentions.push(EntityMention {
                text: surface.to_string(),
                label: label.to_string(),
                start,
                end,
                linked: false,
            });
        };

        let mut span_initial = false;
        for (offset, raw) in word_spans(text) {
            let word = raw.trim_end_matches(|c: char| !c.is_alphanumeric());
            let capitalized = word.chars().next().is_some_and(char::is_uppercase);

            if capitalized {
                let word_end = offset + word.len();
                span = Some(match span {
                    Some((start, _, words)) => (start, word_end, words + 1),
                    None => {
                        span_initial = sentence_start;
                        (offset, word_end, 1)
                    }
                });
            } else if let Some(done) = span.take() {
                push(done, span_initial, &mut mentions);
            }

            let ends_sentence = raw.ends_with(['.', '!', '?']);
            if (ends_sentence || word.len() != raw.len()) && capitalized {
                if let Some(done) = span.take() {
                    push(done, span_initial, &mut mentions);
                }
            }
            sentence_start = ends_sentence;
        }
        if let Some(done) = span.take() {
            push(done, span_initial, &mut mentions);
        }

        Ok(mentions)
    }
}

fn is_acronym(word: &str) -> bool {
    word.chars().count() >= 2 && word.chars().all(|c| c.is_uppercase() || c.is_ascii_digit())
}

fn word_spans(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_whitespace()
        .map(move |w| (w.as_ptr() as usize - text.as_ptr() as usize, w))
}

pub struct MetadataEnricher {
    recognizer: Arc<dyn EntityRecognizer>,
}

impl MetadataEnricher {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Extracts mentions from each text and links them to graph entities
    pub fn enrich(&self, items: &[(String, String)], graph: &KnowledgeGraph) -> Vec<EnrichedText> {
        let mut enriched = Vec::with_capacity(items.len());

        for (source_id, text) in items {
            let mut mentions = match self.recognizer.recognize(text) {
                Ok(mentions) => mentions,
                Err(e) => {
                    warn!(source = %source_id, "Entity recognition failed: {}", e);
                    Vec::new()
                }
            };
            for mention in &mut mentions {
                mention.linked = graph.contains_entity(&mention.text);
            }
            debug!(source = %source_id, count = mentions.len(), "Metadata extracted");

            enriched.push(EnrichedText {
                source_id: source_id.clone(),
                text: text.clone(),
                mentions,
            });
        }

        enriched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Triple;

    #[test]
    fn test_capitalized_spans() {
        let mentions = CapitalizedSpanRecognizer
            .recognize("O projeto usa Apache Kafka e a NASA publicou dados. Ontem choveu.")
            .unwrap();
        let found: Vec<(&str, &str)> = mentions
            .iter()
            .map(|m| (m.text.as_str(), m.label.as_str()))
            .collect();

        assert_eq!(found, vec![("Apache Kafka", "PROPN"), ("NASA", "ORG")]);
    }

    #[test]
    fn test_linking_against_graph() {
        let mut graph = KnowledgeGraph::default();
        graph.add_triple(&Triple::new("Kafka", "é_um", "broker"));

        let enricher = MetadataEnricher::new(Arc::new(CapitalizedSpanRecognizer));
        let items = vec![("qa-0".to_string(), "Usamos o Kafka com o Redis.".to_string())];
        let enriched = enricher.enrich(&items, &graph);

        let linked: Vec<(&str, bool)> = enriched[0]
            .mentions
            .iter()
            .map(|m| (m.text.as_str(), m.linked))
            .collect();
        assert_eq!(linked, vec![("Kafka", true), ("Redis", false)]);
    }
}
