use anyhow::Result;
use async_trait::async_trait;
use ingest::Chunk;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_LABELS: [&str; 5] = ["Fato", "Opinião", "Citação", "Dado", "Outro"];
pub const REVIEW_TAG: &str = "REVISAR";

/// Multi-label classifier returning a score in [0, 1] per label
#[async_trait]
pub trait ChunkClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<BTreeMap<String, f32>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedChunk {
    pub chunk: Chunk,
    pub tags: Vec<String>,
    pub scores: BTreeMap<String, f32>,
}

impl ClassifiedChunk {
    pub fn needs_review(&self) -> bool {
        self.tags.iter().any(|t| t == REVIEW_TAG)
    }
}

/// Cue-word classifier used when no trained model is wired in.
/// Each cue hit halves the distance to 1.0; "Outro" absorbs what the others leave.
pub struct KeywordClassifier {
    opinion_cues: Vec<&'static str>,
    quote_cues: Vec<&'static str>,
    fact_cues: Vec<&'static str>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self {
            opinion_cues: vec![
                "acho", "acredito", "opinião", "deveria", "melhor", "pior", "parece",
                "i think", "i believe", "should", "in my view",
            ],
            quote_cues: vec![
                "\"", "“", "segundo", "afirmou", "disse", "declarou", "according to", "said",
            ],
            fact_cues: vec![
                " é um ", " é uma ", " são ", " foi ", " is a ", " is an ", " are ", " was ",
            ],
        }
    }
}

fn cue_score(hits: usize) -> f32 {
    1.0 - 0.5f32.powi(hits as i32)
}

#[async_trait]
impl ChunkClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<BTreeMap<String, f32>> {
        let lower = format!(" {} ", text.to_lowercase());
        let count = |cues: &[&str]| cues.iter().map(|c| lower.matches(*c).count()).sum::<usize>();

        let numbers = text
            .split_whitespace()
            .filter(|w| w.chars().any(|c| c.is_ascii_digit()))
            .count()
            + text.matches('%').count();

        let [fact, opinion, quote, data, other] = DEFAULT_LABELS;
        let mut scores = BTreeMap::new();
        scores.insert(fact.to_string(), cue_score(count(&self.fact_cues)));
        scores.insert(opinion.to_string(), cue_score(count(&self.opinion_cues)));
        scores.insert(quote.to_string(), cue_score(count(&self.quote_cues)));
        scores.insert(data.to_string(), cue_score(numbers));

        let strongest = scores.values().copied().fold(0.0f32, f32::max);
        scores.insert(other.to_string(), 0.9 * (1.0 - strongest));

        Ok(scores)
    }
}

pub struct ChunkTagger {
    classifier: Arc<dyn ChunkClassifier>,
    threshold: f32,
}

impl ChunkTagger {
    pub fn new(classifier: Arc<dyn ChunkClassifier>, threshold: f32) -> Self {
        Self {
            classifier,
            threshold,
        }
    }

    /// Labels at or above the threshold become tags; a chunk with no such
    /// label is tagged for review.
    pub async fn classify_chunk(&self, chunk: Chunk) -> ClassifiedChunk {
        let scores = match self.classifier.classify(&chunk.text).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(chunk_id = %chunk.chunk_id, "Classifier failed: {}", e);
                BTreeMap::new()
            }
        };

        let mut tags: Vec<String> = scores
            .iter()
            .filter(|(_, score)| **score >= self.threshold)
            .map(|(label, _)| label.clone())
            .collect();

        if tags.is_empty() {
            warn!(chunk_id = %chunk.chunk_id, "Chunk tagged for review");
            tags.push(REVIEW_TAG.to_string());
        }

        ClassifiedChunk { chunk, tags, scores }
    }

    pub async fn run(&self, chunks: Vec<Chunk>) -> Vec<ClassifiedChunk> {
        let mut classified = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.text.trim().is_empty() {
                warn!(chunk_id = %chunk.chunk_id, "Skipping blank chunk");
                continue;
            }
            classified.push(self.classify_chunk(chunk).await);
        }
        classified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Chunk {
        Chunk::new("doc".into(), text.into(), "src".into(), (0, 1))
    }

    #[tokio::test]
    async fn test_keyword_scores() {
        let classifier = KeywordClassifier::default();
        let scores = classifier
            .classify("Em 2023, 45% das empresas usavam 3 nuvens e 12 regiões.")
            .await
            .unwrap();
        assert!(scores["Dado"] >= 0.7);
        assert!(scores["Outro"] < 0.1);

        let neutral = classifier.classify("lorem ipsum dolor").await.unwrap();
        assert!(neutral["Outro"] >= 0.7);
    }

    struct Fixed(BTreeMap<String, f32>);

    #[async_trait]
    impl ChunkClassifier for Fixed {
        async fn classify(&self, _text: &str) -> Result<BTreeMap<String, f32>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl ChunkClassifier for Broken {
        async fn classify(&self, _text: &str) -> Result<BTreeMap<String, f32>> {
            anyhow::bail!("model offline")
        }
    }

    #[tokio::test]
    async fn test_tagging_thresholds() {
        let scores = BTreeMap::from([("Fato".to_string(), 0.9), ("Opinião".to_string(), 0.3)]);
        let tagger = ChunkTagger::new(Arc::new(Fixed(scores)), 0.7);
        let result = tagger.classify_chunk(chunk("Python é uma linguagem.")).await;
        assert_eq!(result.tags, vec!["Fato".to_string()]);
        assert!(!result.needs_review());

        let low = BTreeMap::from([("Fato".to_string(), 0.5)]);
        let tagger = ChunkTagger::new(Arc::new(Fixed(low)), 0.7);
        assert!(tagger.classify_chunk(chunk("talvez")).await.needs_review());
    }

    #[tokio::test]
    async fn test_classifier_failure_and_blank_chunks() {
        let tagger = ChunkTagger::new(Arc::new(Broken), 0.7);
        let results = tagger.run(vec![chunk("texto"), chunk("   ")]).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].needs_review());
        assert!(results[0].scores.is_empty());
    }
}
