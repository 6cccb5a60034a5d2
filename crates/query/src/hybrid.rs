use anyhow::{Context, Result};
use index::{Bm25Okapi, Embedder, cosine_similarity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub dense_weight: f32,
    pub sparse_weight: f32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            dense_weight: 0.6,
            sparse_weight: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Position in the candidate list passed to `retrieve`
    pub index: usize,
    pub text: String,
    pub dense_score: f32,
    pub sparse_score: f32,
    pub score: f32,
}

/// Per-query dense/sparse scores with relevance labels, for weight tuning
#[derive(Debug, Clone)]
pub struct CalibrationSample {
    pub dense: Vec<f32>,
    pub sparse: Vec<f32>,
    pub relevant: Vec<bool>,
}

pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    config: HybridConfig,
}

impl HybridRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, config: HybridConfig) -> Self {
        Self { embedder, config }
    }

    pub fn config(&self) -> HybridConfig {
        self.config
    }

    /// Top-k documents by weighted dense + sparse score. Falls back to BM25
    /// alone when dense scoring fails.
    pub async fn retrieve(&self, query: &str, documents: &[String], k: usize) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() {
            anyhow::bail!("Query must not be empty");
        }
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        // Step 1: Sparse scores over the candidate set
        let bm25 = Bm25Okapi::new(documents);
        let sparse = min_max_normalize(&bm25.get_scores(query));

        // Step 2: Dense scores, or sparse-only on failure
        let (dense, weights) = match self.dense_scores(query, documents).await {
            Ok(dense) => (dense, self.config),
            Err(e) => {
                warn!("Dense retrieval failed, using BM25 only: {:#}", e);
                let sparse_only = HybridConfig {
                    dense_weight: 0.0,
                    sparse_weight: 1.0,
                };
                (vec![0.0; documents.len()], sparse_only)
            }
        };

        // Step 3: Fuse and rank
        let mut results: Vec<RetrievalResult> = documents
            .iter()
            .enumerate()
            .map(|(i, text)| RetrievalResult {
                index: i,
                text: text.clone(),
                dense_score: dense[i],
                sparse_score: sparse[i],
                score: weights.dense_weight * dense[i] + weights.sparse_weight * sparse[i],
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
        results.truncate(k);

        debug!(query, returned = results.len(), "Hybrid retrieval done");
        Ok(results)
    }

    /// Cosine similarity mapped from [-1, 1] to [0, 1]
    async fn dense_scores(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let query_embedding = self.embedder.encode(query).await
            .context("Failed to embed query")?;
        let doc_embeddings = self.embedder.encode_batch(documents).await
            .context("Failed to embed documents")?;

        doc_embeddings
            .iter()
            .map(|emb| {
                if emb.len() != query_embedding.len() {
                    anyhow::bail!(
                        "Document embedding has dimension {}, query has {}",
                        emb.len(),
                        query_embedding.len()
                    );
                }
                Ok((cosine_similarity(&query_embedding, emb) + 1.0) / 2.0)
            })
            .collect()
    }

    /// Grid search over the dense weight (step 0.05) maximizing mean average
    /// precision. Earlier (lower) weights win ties. Returns the new weights.
    pub fn calibrate_weights(&mut self, samples: &[CalibrationSample]) -> HybridConfig {
        let labelled: Vec<&CalibrationSample> = samples
            .iter()
            .filter(|s| s.relevant.iter().any(|&r| r))
            .collect();
        if labelled.is_empty() {
            return self.config;
        }

        let mut best = (self.config, f32::MIN);
        for step in 0..=20 {
            let dense_weight = step as f32 * 0.05;
            let candidate = HybridConfig {
                dense_weight,
                sparse_weight: 1.0 - dense_weight,
            };
            let map = labelled
                .iter()
                .map(|s| average_precision(s, candidate))
                .sum::<f32>()
                / labelled.len() as f32;

            if map > best.1 {
                best = (candidate, map);
            }
        }

        info!(
            dense_weight = best.0.dense_weight,
            sparse_weight = best.0.sparse_weight,
            map = best.1,
            "Calibrated hybrid weights"
        );
        self.config = best.0;
        self.config
    }
}

fn average_precision(sample: &CalibrationSample, weights: HybridConfig) -> f32 {
    let mut order: Vec<usize> = (0..sample.relevant.len()).collect();
    let score = |i: usize| {
        weights.dense_weight * sample.dense.get(i).copied().unwrap_or(0.0)
            + weights.sparse_weight * sample.sparse.get(i).copied().unwrap_or(0.0)
    };
    order.sort_by(|&a, &b| score(b).total_cmp(&score(a)).then(a.cmp(&b)));

    let total_relevant = sample.relevant.iter().filter(|&&r| r).count();
    let mut hits = 0;
    let mut precision_sum = 0.0;
    for (rank, &i) in order.iter().enumerate() {
        if sample.relevant[i] {
            hits += 1;
            precision_sum += hits as f32 / (rank + 1) as f32;
        }
    }
    precision_sum / total_relevant as f32
}

/// Scales scores to [0, 1]. Equal scores map to 1.0 when positive, else 0.0.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    scores
        .iter()
        .map(|&s| {
            if range > f32::EPSILON {
                (s - min) / range
            } else if max > 0.0 {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}
