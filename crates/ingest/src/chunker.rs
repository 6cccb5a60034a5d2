use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::chunk::Chunk;

/// Scores how trustworthy a chunk's text is, in [0, 1]
pub trait ConfidenceModel: Send + Sync {
    fn score(&self, text: &str) -> Result<f32>;
}

/// Scores every chunk as fully confident
pub struct UniformConfidence;

impl ConfidenceModel for UniformConfidence {
    fn score(&self, _text: &str) -> Result<f32> {
        Ok(1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub window_tokens: usize,
    pub overlap_ratio: f32,
    pub min_confidence: f32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            window_tokens: 512,
            overlap_ratio: 0.15,
            min_confidence: 0.7,
        }
    }
}

impl ChunkerConfig {
    /// Window advance in tokens, never zero
    pub fn step(&self) -> usize {
        let step = (self.window_tokens as f32 * (1.0 - self.overlap_ratio)).floor() as usize;
        step.max(1)
    }
}

pub struct Chunker {
    config: ChunkerConfig,
    confidence: Arc<dyn ConfidenceModel>,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self {
            config,
            confidence: Arc::new(UniformConfidence),
        }
    }

    pub fn with_confidence_model(mut self, model: Arc<dyn ConfidenceModel>) -> Self {
        self.confidence = model;
        self
    }

    /// Sliding window over whitespace tokens
    pub fn chunk_text(
        &self,
        doc_id: &str,
        text: &str,
        source: &str,
    ) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let window = self.config.window_tokens.max(1);
        let step = self.config.step();

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < words.len() {
            let end = (start + window).min(words.len());
            let mut chunk = Chunk::new(
                doc_id.to_string(),
                words[start..end].join(" "),
                source.to_string(),
                (start, end),
            );

            let score = match self.confidence.score(&chunk.text) {
                Ok(score) => score,
                Err(e) => {
                    warn!(chunk_id = %chunk.chunk_id, "Confidence model failed: {}", e);
                    0.0
                }
            };
            chunk.apply_confidence(score, self.config.min_confidence);

            if !chunk.valid {
                warn!(
                    chunk_id = %chunk.chunk_id,
                    confidence = score,
                    "Low-confidence chunk tagged for review"
                );
            }

            chunks.push(chunk);

            if end == words.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkTag;

    #[test]
    fn test_step_matches_overlap() {
        assert_eq!(ChunkerConfig::default().step(), 435);
    }

    #[test]
    fn test_sliding_window_chunking() {
        let chunker = Chunker::new(ChunkerConfig {
            window_tokens: 4,
            overlap_ratio: 0.5,
            min_confidence: 0.7,
        });
        let text = "um dois três quatro cinco seis sete";
        let chunks = chunker.chunk_text("test-doc", text, "test.txt");

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["um dois três quatro", "três quatro cinco seis", "cinco seis sete"]
        );
        assert_eq!(chunks[0].doc_id, "test-doc");
        assert_eq!(chunks[2].offset, (4, 7));
        assert!(chunks.iter().all(|c| c.valid && c.tag.is_none()));
    }

    struct LengthConfidence;

    impl ConfidenceModel for LengthConfidence {
        fn score(&self, text: &str) -> Result<f32> {
            Ok(if text.split_whitespace().count() >= 3 { 0.9 } else { 0.4 })
        }
    }

    #[test]
    fn test_low_confidence_tagged_for_review() {
        let chunker = Chunker::new(ChunkerConfig {
            window_tokens: 3,
            overlap_ratio: 0.0,
            min_confidence: 0.7,
        })
        .with_confidence_model(Arc::new(LengthConfidence));
        let chunks = chunker.chunk_text("doc", "a b c d", "src");

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].valid);
        assert!(!chunks[1].valid);
        assert_eq!(chunks[1].tag, Some(ChunkTag::Review));
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let chunker = Chunker::new(ChunkerConfig::default());
        assert!(chunker.chunk_text("doc", "  \n ", "src").is_empty());
    }
}
