use anyhow::Result;
use async_trait::async_trait;
use extract::LlmClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::hybrid::RetrievalResult;

/// Scores (query, document) pairs jointly, one score per pair
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    async fn predict(&self, pairs: &[(String, String)]) -> Result<Vec<f32>>;
}

/// Asks an LLM for a 0-1 relevance grade per pair
pub struct LlmCrossEncoder {
    llm: Arc<dyn LlmClient>,
}

impl LlmCrossEncoder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn build_prompt(query: &str, document: &str) -> String {
        format!(
            "Avalie a relevância do documento para a pergunta numa escala de 0 a 1. Responda apenas com o número.\n\nPergunta: {}\nDocumento: {}\nRelevância:",
            query, document
        )
    }
}

/// First number in the reply, clamped to [0, 1]. Accepts a decimal comma.
pub fn parse_relevance(reply: &str) -> Option<f32> {
    reply
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !(c.is_ascii_digit() || c == '.' || c == ',')))
        .filter(|w| w.chars().any(|c| c.is_ascii_digit()))
        .find_map(|w| w.replace(',', ".").trim_end_matches('.').parse::<f32>().ok())
        .map(|v| v.clamp(0.0, 1.0))
}

#[async_trait]
impl CrossEncoder for LlmCrossEncoder {
    async fn predict(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(pairs.len());
        for (query, document) in pairs {
            let reply = self.llm.generate(&Self::build_prompt(query, document)).await?;
            match parse_relevance(&reply) {
                Some(score) => scores.push(score),
                None => anyhow::bail!("Unparsable relevance grade: {:?}", reply),
            }
        }
        Ok(scores)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub prior_weight: f32,
    pub cross_weight: f32,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            prior_weight: 0.7,
            cross_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    #[serde(flatten)]
    pub candidate: RetrievalResult,
    pub cross_score: Option<f32>,
    pub final_score: f32,
}

impl RankedCandidate {
    fn unscored(candidate: RetrievalResult) -> Self {
        let final_score = candidate.score;
        Self {
            candidate,
            cross_score: None,
            final_score,
        }
    }
}

pub struct Reranker {
    encoder: Arc<dyn CrossEncoder>,
    config: RerankConfig,
}

impl Reranker {
    pub fn new(encoder: Arc<dyn CrossEncoder>, config: RerankConfig) -> Self {
        Self { encoder, config }
    }

    /// Blends each candidate's prior score with its cross-encoder score.
    /// Any cross-encoder failure leaves the input order untouched.
    pub async fn rerank(&self, query: &str, candidates: Vec<RetrievalResult>) -> Vec<RankedCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let pairs: Vec<(String, String)> = candidates
            .iter()
            .map(|c| (query.to_string(), c.text.clone()))
            .collect();

        let scores = match self.encoder.predict(&pairs).await {
            Ok(scores) if scores.len() == candidates.len() => scores,
            Ok(scores) => {
                warn!(
                    expected = candidates.len(),
                    got = scores.len(),
                    "Cross-encoder returned the wrong number of scores, keeping original order"
                );
                return candidates.into_iter().map(RankedCandidate::unscored).collect();
            }
            Err(e) => {
                warn!("Cross-encoder failed, keeping original order: {:#}", e);
                return candidates.into_iter().map(RankedCandidate::unscored).collect();
            }
        };

        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .zip(scores)
            .map(|(candidate, cross)| {
                let final_score = self.config.prior_weight * candidate.score + self.config.cross_weight * cross;
                RankedCandidate {
                    candidate,
                    cross_score: Some(cross),
                    final_score,
                }
            })
            .collect();

        // Stable sort keeps the prior order among equal scores
        ranked.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn candidate(index: usize, score: f32) -> RetrievalResult {
        RetrievalResult {
            index,
            text: format!("doc {}", index),
            dense_score: score,
            sparse_score: score,
            score,
        }
    }

    struct Fixed(Vec<f32>);

    #[async_trait]
    impl CrossEncoder for Fixed {
        async fn predict(&self, _pairs: &[(String, String)]) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl CrossEncoder for Broken {
        async fn predict(&self, _pairs: &[(String, String)]) -> Result<Vec<f32>> {
            anyhow::bail!("model not loaded")
        }
    }

    #[tokio::test]
    async fn test_cross_scores_reorder() {
        let reranker = Reranker::new(Arc::new(Fixed(vec![0.0, 1.0])), RerankConfig::default());
        let ranked = reranker
            .rerank("q", vec![candidate(0, 0.8), candidate(1, 0.6)])
            .await;

        // 0.7 * 0.6 + 0.3 * 1.0 = 0.72 beats 0.7 * 0.8 = 0.56
        assert_eq!(ranked[0].candidate.index, 1);
        assert_relative_eq!(ranked[0].final_score, 0.72, epsilon = 1e-6);
        assert_eq!(ranked[0].cross_score, Some(1.0));
    }

    #[tokio::test]
    async fn test_failure_keeps_original_order() {
        let input = vec![candidate(3, 0.9), candidate(1, 0.5), candidate(2, 0.1)];

        let encoders: Vec<Arc<dyn CrossEncoder>> = vec![Arc::new(Broken), Arc::new(Fixed(vec![1.0]))];
        for encoder in encoders {
            let reranker = Reranker::new(encoder, RerankConfig::default());
            let ranked = reranker.rerank("q", input.clone()).await;

            let order: Vec<usize> = ranked.iter().map(|r| r.candidate.index).collect();
            assert_eq!(order, vec![3, 1, 2]);
            assert!(ranked.iter().all(|r| r.cross_score.is_none()));
            assert!(ranked.iter().zip(&input).all(|(r, c)| r.final_score == c.score && r.candidate.text == c.text));
        }
    }

    #[test]
    fn test_parse_relevance() {
        assert_eq!(parse_relevance("0.8"), Some(0.8));
        assert_eq!(parse_relevance("Relevância: 0,75."), Some(0.75));
        assert_eq!(parse_relevance("7"), Some(1.0));
        assert_eq!(parse_relevance("não sei"), None);
    }

    struct GradingLlm;

    #[async_trait]
    impl LlmClient for GradingLlm {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(if prompt.contains("doc 1") { "0.9" } else { "0.1" }.to_string())
        }
    }

    #[tokio::test]
    async fn test_llm_cross_encoder() {
        let encoder = LlmCrossEncoder::new(Arc::new(GradingLlm));
        let scores = encoder
            .predict(&[("q".into(), "doc 0".into()), ("q".into(), "doc 1".into())])
            .await
            .unwrap();
        assert_eq!(scores, vec![0.1, 0.9]);
    }

    #[test]
    fn test_partial_config_keeps_default_weight() {
        let config: RerankConfig = serde_json::from_str(r#"{"cross_weight": 0.5}"#).unwrap();
        assert_eq!(config.cross_weight, 0.5);
        assert_eq!(config.prior_weight, 0.7);
    }
}
