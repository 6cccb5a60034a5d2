use chrono::{DateTime, Utc};
use query::GeneratedAnswer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bertscore::{BertScore, BertScorer};
use crate::judge::LlmJudge;
use crate::rouge::rouge_l;

pub const HUMAN_REVIEW_PENDING: &str = "pending";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomaticScores {
    /// ROUGE-L F-measure
    pub rouge_l: f32,
    pub bertscore: Option<BertScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: Uuid,
    pub query: String,
    pub answer: String,
    pub reference: Option<String>,
    pub automatic: Option<AutomaticScores>,
    pub judge_feedback: String,
    pub human_review: String,
    pub context_documents: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn rouge_l(&self) -> Option<f32> {
        self.automatic.as_ref().map(|a| a.rouge_l)
    }
}

pub struct ContinuousEvaluator {
    judge: LlmJudge,
    bert_scorer: Option<BertScorer>,
}

impl ContinuousEvaluator {
    pub fn new(judge: LlmJudge) -> Self {
        Self {
            judge,
            bert_scorer: None,
        }
    }

    pub fn with_bert_scorer(mut self, embedder: Arc<dyn index::Embedder>) -> Self {
        self.bert_scorer = Some(BertScorer::new(embedder));
        self
    }

    async fn automatic_scores(&self, reference: &str, answer: &str) -> AutomaticScores {
        let rouge = rouge_l(reference, answer);
        let bertscore = match &self.bert_scorer {
            Some(scorer) => match scorer.score(reference, answer).await {
                Ok(score) => Some(score),
                Err(e) => {
                    warn!("BERTScore failed: {:#}", e);
                    None
                }
            },
            None => None,
        };

        AutomaticScores {
            rouge_l: rouge.fmeasure,
            bertscore,
        }
    }

    /// Evaluates one answer. `None` when the query or answer is empty.
    pub async fn evaluate_one(&self, item: &GeneratedAnswer, reference: Option<&str>) -> Option<EvaluationRecord> {
        if item.query.trim().is_empty() || item.answer.trim().is_empty() {
            warn!(query = %item.query, "Skipping malformed item with empty query or answer");
            return None;
        }

        let reference = reference.filter(|r| !r.trim().is_empty());
        let automatic = match reference {
            Some(r) => Some(self.automatic_scores(r, &item.answer).await),
            None => None,
        };
        let judge_feedback = self.judge.judge(reference.unwrap_or_default(), &item.answer).await;

        info!(query = %item.query, "Evaluation generated");
        Some(EvaluationRecord {
            id: Uuid::new_v4(),
            query: item.query.clone(),
            answer: item.answer.clone(),
            reference: reference.map(str::to_string),
            automatic,
            judge_feedback,
            human_review: HUMAN_REVIEW_PENDING.to_string(),
            context_documents: item.context_documents.clone(),
            evaluated_at: Utc::now(),
        })
    }

    /// Answers are paired with references by position
    pub async fn run(&self, answers: &[GeneratedAnswer], references: &[Option<String>]) -> Vec<EvaluationRecord> {
        let mut records = Vec::with_capacity(answers.len());
        for (i, item) in answers.iter().enumerate() {
            let reference = references.get(i).and_then(|r| r.as_deref());
            if let Some(record) = self.evaluate_one(item, reference).await {
                records.push(record);
            }
        }
        records
    }
}
