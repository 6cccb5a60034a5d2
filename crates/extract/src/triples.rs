use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::warn;

use crate::graph::KnowledgeGraph;
use crate::llm::{LlmClient, generate_json_with_retry};
use crate::prompt;
use crate::schema::{ExtractionResult, Triple};

#[async_trait]
pub trait TripleExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<Triple>>;
}

/// Copula patterns: "X é um Y", "X is a Y". Subject is the word right before
/// the copula, object the word right after it.
pub struct PatternExtractor {
    pattern: Regex,
}

impl PatternExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(r"(?i)([\w-]+)\s+(é\s+uma?|is\s+an?)\s+([\w-]+)")?,
        })
    }
}

#[async_trait]
impl TripleExtractor for PatternExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<Triple>> {
        let triples = self
            .pattern
            .captures_iter(text)
            .map(|caps| {
                let copula = caps[2].to_lowercase();
                let predicate = if copula.starts_with('é') { "é_um" } else { "is_a" };
                Triple::new(&caps[1], predicate, &caps[3])
            })
            .collect();
        Ok(triples)
    }
}

pub struct LlmTripleExtractor {
    llm: Arc<dyn LlmClient>,
    max_retries: usize,
}

impl LlmTripleExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            max_retries: 3,
        }
    }
}

#[async_trait]
impl TripleExtractor for LlmTripleExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<Triple>> {
        // Build prompt
        let prompt = prompt::build_extraction_prompt(text);

        // Get JSON response with retry
        let json_str = generate_json_with_retry(self.llm.as_ref(), &prompt, self.max_retries)
            .await
            .context("Failed to extract entities after retries")?;

        let result: ExtractionResult = serde_json::from_str(&json_str)
            .context("Failed to parse extraction result")?;

        Ok(result.into_triples())
    }
}

/// Runs the extractor over every text and loads the triples into `graph`.
/// Texts whose extraction fails are skipped. Returns the number of new triples.
pub async fn populate_graph<'a>(
    extractor: &dyn TripleExtractor,
    texts: impl IntoIterator<Item = &'a str>,
    graph: &mut KnowledgeGraph,
) -> usize {
    let mut added = 0;
    for text in texts {
        match extractor.extract(text).await {
            Ok(triples) => {
                added += triples.iter().filter(|t| graph.add_triple(t)).count();
            }
            Err(e) => warn!("Triple extraction failed: {:#}", e),
        }
    }
    added
}
