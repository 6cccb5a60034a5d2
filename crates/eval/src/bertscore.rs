use anyhow::{Context, Result};
use index::{Embedder, cosine_similarity, tokenize};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BertScore {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
}

/// Greedy token matching over contextless token embeddings
pub struct BertScorer {
    embedder: Arc<dyn Embedder>,
}

impl BertScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub async fn score(&self, reference: &str, candidate: &str) -> Result<BertScore> {
        let ref_tokens = tokenize(reference);
        let cand_tokens = tokenize(candidate);
        if ref_tokens.is_empty() || cand_tokens.is_empty() {
            return Ok(BertScore::default());
        }

        let ref_emb = self.embedder.encode_batch(&ref_tokens).await
            .context("Failed to embed reference tokens")?;
        let cand_emb = self.embedder.encode_batch(&cand_tokens).await
            .context("Failed to embed candidate tokens")?;

        let precision = greedy_match(&cand_emb, &ref_emb);
        let recall = greedy_match(&ref_emb, &cand_emb);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(BertScore { precision, recall, f1 })
    }
}

/// Mean over `from` of the best cosine against any row of `to`
fn greedy_match(from: &[Vec<f32>], to: &[Vec<f32>]) -> f32 {
    let total: f32 = from
        .iter()
        .map(|a| {
            to.iter()
                .map(|b| cosine_similarity(a, b))
                .fold(f32::NEG_INFINITY, f32::max)
        })
        .sum();
    total / from.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use index::HashingEmbedder;

    #[tokio::test]
    async fn test_identical_text_scores_one() {
        let scorer = BertScorer::new(Arc::new(HashingEmbedder::new(128)));
        let score = scorer.score("grafos de conhecimento", "Grafos de conhecimento").await.unwrap();

        assert_relative_eq!(score.precision, 1.0, epsilon = 1e-5);
        assert_relative_eq!(score.recall, 1.0, epsilon = 1e-5);
        assert_relative_eq!(score.f1, 1.0, epsilon = 1e-5);
    }

    #[tokio::test]
    async fn test_subset_candidate_has_full_precision() {
        let scorer = BertScorer::new(Arc::new(HashingEmbedder::new(4096)));
        let score = scorer.score("redes neurais profundas", "redes").await.unwrap();

        assert_relative_eq!(score.precision, 1.0, epsilon = 1e-5);
        assert!(score.recall < 1.0);
        assert!(score.f1 < 1.0 && score.f1 > 0.0);
    }

    #[tokio::test]
    async fn test_empty_side_scores_zero() {
        let scorer = BertScorer::new(Arc::new(HashingEmbedder::new(16)));
        assert_eq!(scorer.score("", "algo").await.unwrap(), BertScore::default());
    }
}
