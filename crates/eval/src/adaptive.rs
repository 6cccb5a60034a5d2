use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::evaluation::{AutomaticScores, EvaluationRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardNegativeReason {
    LowRouge,
    NegativeJudgeFeedback,
    FailureAnswer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardNegative {
    pub query: String,
    pub answer: String,
    pub context_documents: Vec<String>,
    pub automatic: Option<AutomaticScores>,
    pub judge_feedback: String,
    pub reasons: Vec<HardNegativeReason>,
}

/// Receives mined hard negatives, e.g. to queue a fine-tuning job
#[async_trait]
pub trait FineTuneTrigger: Send + Sync {
    async fn trigger(&self, examples: &[HardNegative]) -> Result<()>;
}

/// Appends one JSON line per hard negative
pub struct JsonlFineTuneQueue {
    path: PathBuf,
}

impl JsonlFineTuneQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FineTuneTrigger for JsonlFineTuneQueue {
    async fn trigger(&self, examples: &[HardNegative]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut lines = String::new();
        for example in examples {
            lines.push_str(&serde_json::to_string(example)?);
            lines.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .context(format!("Failed to open fine-tuning queue {}", self.path.display()))?;
        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub rouge_threshold: f32,
    pub judge_keywords: Vec<String>,
    pub answer_keywords: Vec<String>,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            rouge_threshold: 0.5,
            judge_keywords: ["genérica", "não encontrou", "ruim", "incorret"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            answer_keywords: ["não foi possível encontrar", "não sei", "desculpe, mas não"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationStatus {
    NoEvaluationResults,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationReport {
    pub status: AdaptationStatus,
    pub hard_negatives: Vec<HardNegative>,
}

pub struct AdaptiveRetriever {
    config: AdaptiveConfig,
    trigger: Option<Arc<dyn FineTuneTrigger>>,
}

impl AdaptiveRetriever {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self { config, trigger: None }
    }

    pub fn with_trigger(mut self, trigger: Arc<dyn FineTuneTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Every rule the record violates. Empty for well-formed good answers
    /// and for records with an empty query or answer.
    pub fn hard_negative_reasons(&self, record: &EvaluationRecord) -> Vec<HardNegativeReason> {
        let mut reasons = Vec::new();
        if record.query.trim().is_empty() || record.answer.trim().is_empty() {
            return reasons;
        }

        if record.rouge_l().is_some_and(|r| r < self.config.rouge_threshold) {
            reasons.push(HardNegativeReason::LowRouge);
        }

        let feedback = record.judge_feedback.to_lowercase();
        if self.config.judge_keywords.iter().any(|k| feedback.contains(k.as_str())) {
            reasons.push(HardNegativeReason::NegativeJudgeFeedback);
        }

        let answer = record.answer.to_lowercase();
        if self.config.answer_keywords.iter().any(|k| answer.contains(k.as_str())) {
            reasons.push(HardNegativeReason::FailureAnswer);
        }

        reasons
    }

    pub fn mine(&self, records: &[EvaluationRecord]) -> Vec<HardNegative> {
        records
            .iter()
            .filter_map(|record| {
                let reasons = self.hard_negative_reasons(record);
                if reasons.is_empty() {
                    return None;
                }
                info!(query = %record.query, ?reasons, "Hard negative identified");
                Some(HardNegative {
                    query: record.query.clone(),
                    answer: record.answer.clone(),
                    context_documents: record.context_documents.clone(),
                    automatic: record.automatic.clone(),
                    judge_feedback: record.judge_feedback.clone(),
                    reasons,
                })
            })
            .collect()
    }

    pub async fn run(&self, records: &[EvaluationRecord]) -> AdaptationReport {
        if records.is_empty() {
            info!("No evaluation results, nothing to adapt");
            return AdaptationReport {
                status: AdaptationStatus::NoEvaluationResults,
                hard_negatives: Vec::new(),
            };
        }

        let hard_negatives = self.mine(records);
        if hard_negatives.is_empty() {
            info!("No hard negatives identified, fine-tuning not triggered");
        } else {
            match &self.trigger {
                Some(trigger) => match trigger.trigger(&hard_negatives).await {
                    Ok(()) => info!(count = hard_negatives.len(), "Fine-tuning triggered"),
                    Err(e) => error!("Fine-tuning trigger failed: {:#}", e),
                },
                None => warn!(
                    count = hard_negatives.len(),
                    "Fine-tuning should be triggered but no trigger is configured"
                ),
            }
        }

        AdaptationReport {
            status: AdaptationStatus::Completed,
            hard_negatives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn record(answer: &str, rouge: Option<f32>, feedback: &str) -> EvaluationRecord {
        EvaluationRecord {
            id: Uuid::new_v4(),
            query: "O que é RAG?".to_string(),
            answer: answer.to_string(),
            reference: rouge.map(|_| "referência".to_string()),
            automatic: rouge.map(|rouge_l| AutomaticScores {
                rouge_l,
                bertscore: None,
            }),
            judge_feedback: feedback.to_string(),
            human_review: "pending".to_string(),
            context_documents: vec!["doc".to_string()],
            evaluated_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct Collecting(Mutex<Vec<HardNegative>>);

    #[async_trait]
    impl FineTuneTrigger for Collecting {
        async fn trigger(&self, examples: &[HardNegative]) -> Result<()> {
            self.0.lock().unwrap().extend_from_slice(examples);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl FineTuneTrigger for Failing {
        async fn trigger(&self, _examples: &[HardNegative]) -> Result<()> {
            anyhow::bail!("queue unavailable")
        }
    }

    #[test]
    fn test_each_rule_flags_independently() {
        let retriever = AdaptiveRetriever::new(AdaptiveConfig::default());

        assert_eq!(
            retriever.hard_negative_reasons(&record("Resposta boa.", Some(0.2), "Ótima")),
            vec![HardNegativeReason::LowRouge]
        );
        assert_eq!(
            retriever.hard_negative_reasons(&record("Resposta boa.", Some(0.9), "Resposta GENÉRICA")),
            vec![HardNegativeReason::NegativeJudgeFeedback]
        );
        assert_eq!(
            retriever.hard_negative_reasons(&record("Desculpe, mas não tenho dados.", None, "ok")),
            vec![HardNegativeReason::FailureAnswer]
        );
        assert!(retriever.hard_negative_reasons(&record("Resposta boa.", Some(0.9), "Clara")).is_empty());
        assert!(retriever.hard_negative_reasons(&record("Resposta boa.", None, "Clara")).is_empty());
    }

    #[test]
    fn test_all_reasons_recorded_and_empty_answer_ignored() {
        let retriever = AdaptiveRetriever::new(AdaptiveConfig::default());
        let reasons = retriever.hard_negative_reasons(&record("Não sei.", Some(0.1), "resposta ruim"));
        assert_eq!(reasons.len(), 3);

        assert!(retriever.hard_negative_reasons(&record("", Some(0.0), "ruim")).is_empty());
    }

    #[tokio::test]
    async fn test_run_triggers_with_hard_negatives() {
        let collected = Arc::new(Collecting::default());
        let retriever = AdaptiveRetriever::new(AdaptiveConfig::default()).with_trigger(collected.clone());

        let report = retriever
            .run(&[record("Resposta boa.", Some(0.9), "Clara"), record("Não sei.", None, "ok")])
            .await;

        assert_eq!(report.status, AdaptationStatus::Completed);
        assert_eq!(report.hard_negatives.len(), 1);
        assert_eq!(collected.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_statuses_and_trigger_failure() {
        let retriever = AdaptiveRetriever::new(AdaptiveConfig::default()).with_trigger(Arc::new(Failing));
        assert_eq!(retriever.run(&[]).await.status, AdaptationStatus::NoEvaluationResults);

        let report = retriever.run(&[record("Não sei.", None, "ok")]).await;
        assert_eq!(report.status, AdaptationStatus::Completed);
        assert_eq!(report.hard_negatives.len(), 1);
    }

    #[tokio::test]
    async fn test_jsonl_queue_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fine_tuning").join("hard_negatives.jsonl");
        let queue = JsonlFineTuneQueue::new(&path);
        let retriever = AdaptiveRetriever::new(AdaptiveConfig::default());
        let negatives = retriever.mine(&[record("Não sei.", None, "ok")]);

        queue.trigger(&negatives).await.unwrap();
        queue.trigger(&negatives).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: HardNegative = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.reasons, vec![HardNegativeReason::FailureAnswer]);
    }
}
