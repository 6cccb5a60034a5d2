use extract::LlmClient;
use query::GeneratedAnswer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::evaluation::{ContinuousEvaluator, EvaluationRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    pub prompt_a: String,
    pub prompt_b: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            prompt_a: "Contexto:\n{context}\n\nPergunta: {query}\nResposta concisa:".to_string(),
            prompt_b: "Com base no contexto fornecido:\n{context}\n\nResponda à seguinte pergunta:\n{query}\nResposta detalhada:"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptVariant {
    A,
    B,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AbTestReport {
    Completed {
        prompt_a_avg_score: f64,
        prompt_b_avg_score: f64,
        winner: PromptVariant,
        num_samples: usize,
    },
    Error {
        message: String,
    },
}

/// One A/B sample: a query and its retrieved context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSample {
    pub query: String,
    pub context_documents: Vec<String>,
}

pub fn render_template(template: &str, query: &str, context: &[String]) -> String {
    let context = context
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("Documento {}: {}", i + 1, doc))
        .collect::<Vec<_>>()
        .join("\n");
    template.replace("{context}", &context).replace("{query}", query)
}

/// Mean ROUGE-L; records without automatic scores count as zero
pub fn mean_rouge_l(records: &[EvaluationRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let scores: Vec<f64> = records
        .iter()
        .map(|r| r.rouge_l().unwrap_or(0.0) as f64)
        .collect();
    statistical::mean(&scores)
}

pub struct PromptOptimizer {
    llm: Arc<dyn LlmClient>,
    evaluator: Arc<ContinuousEvaluator>,
}

impl PromptOptimizer {
    pub fn new(llm: Arc<dyn LlmClient>, evaluator: Arc<ContinuousEvaluator>) -> Self {
        Self { llm, evaluator }
    }

    async fn answer_with(&self, template: &str, samples: &[PromptSample]) -> Vec<GeneratedAnswer> {
        let mut answers = Vec::with_capacity(samples.len());
        for sample in samples {
            let prompt = render_template(template, &sample.query, &sample.context_documents);
            let (answer, failed) = match self.llm.generate(&prompt).await {
                Ok(text) => (text.trim().to_string(), false),
                Err(e) => {
                    warn!(query = %sample.query, "Prompt variant generation failed: {:#}", e);
                    (format!("Erro ao gerar resposta: {}", e), true)
                }
            };
            answers.push(GeneratedAnswer {
                query: sample.query.clone(),
                answer,
                prompt,
                few_shots: Vec::new(),
                context_documents: sample.context_documents.clone(),
                failed,
            });
        }
        answers
    }

    /// Generates answers with both templates and keeps the one with the
    /// higher mean ROUGE-L. A wins ties.
    pub async fn run_ab_test(
        &self,
        samples: &[PromptSample],
        references: &[Option<String>],
        templates: &PromptTemplates,
    ) -> AbTestReport {
        if !references.iter().flatten().any(|r| !r.trim().is_empty()) {
            error!("References are required for the A/B test");
            return AbTestReport::Error {
                message: "Referências não fornecidas.".to_string(),
            };
        }

        // Step 1: Answers per variant
        let answers_a = self.answer_with(&templates.prompt_a, samples).await;
        let answers_b = self.answer_with(&templates.prompt_b, samples).await;

        // Step 2: Evaluate both against the same references
        let evaluated_a = self.evaluator.run(&answers_a, references).await;
        let evaluated_b = self.evaluator.run(&answers_b, references).await;

        let score_a = mean_rouge_l(&evaluated_a);
        let score_b = mean_rouge_l(&evaluated_b);
        let winner = if score_a >= score_b { PromptVariant::A } else { PromptVariant::B };

        info!(score_a, score_b, ?winner, "A/B prompt test finished");
        AbTestReport::Completed {
            prompt_a_avg_score: score_a,
            prompt_b_avg_score: score_b,
            winner,
            num_samples: samples.len(),
        }
    }
}
