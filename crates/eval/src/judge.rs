use extract::LlmClient;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_CRITERIA: &str = "clareza, factualidade, completude";

/// LLM-as-a-judge critique of a model answer
pub struct LlmJudge {
    llm: Arc<dyn LlmClient>,
    criteria: String,
}

impl LlmJudge {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self::with_criteria(llm, DEFAULT_CRITERIA)
    }

    pub fn with_criteria(llm: Arc<dyn LlmClient>, criteria: &str) -> Self {
        Self {
            llm,
            criteria: criteria.to_string(),
        }
    }

    pub fn build_prompt(&self, reference: &str, answer: &str) -> String {
        format!(
            "Referência: {}\nResposta do modelo: {}\nCriterios de avaliação: {}\nAvalie a resposta do modelo segundo os critérios acima, de forma objetiva.",
            reference, answer, self.criteria
        )
    }

    /// Free-text critique. Judge failures degrade to an explanatory string.
    pub async fn judge(&self, reference: &str, answer: &str) -> String {
        match self.llm.generate(&self.build_prompt(reference, answer)).await {
            Ok(feedback) => feedback.trim().to_string(),
            Err(e) => {
                warn!("LLM judge failed: {:#}", e);
                format!("Avaliação indisponível: {}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl LlmClient for Echo {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!(" {} ", prompt.lines().next().unwrap_or_default()))
        }
    }

    struct Down;

    #[async_trait]
    impl LlmClient for Down {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    #[test]
    fn test_prompt_names_criteria() {
        let judge = LlmJudge::with_criteria(Arc::new(Echo), "concisão");
        let prompt = judge.build_prompt("ref", "resp");

        assert!(prompt.starts_with("Referência: ref\nResposta do modelo: resp\n"));
        assert!(prompt.contains("Criterios de avaliação: concisão\n"));
    }

    #[tokio::test]
    async fn test_judge_feedback_and_degradation() {
        assert_eq!(LlmJudge::new(Arc::new(Echo)).judge("ref", "resp").await, "Referência: ref");
        assert_eq!(
            LlmJudge::new(Arc::new(Down)).judge("ref", "resp").await,
            "Avaliação indisponível: connection refused"
        );
    }
}
