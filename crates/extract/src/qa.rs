use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::llm::LlmClient;
use crate::prompt;
use crate::schema::Triple;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    pub triple: Triple,
    /// Ground-truth statement the answer is scored against
    pub reference: Option<String>,
}

pub struct QaGenerator {
    llm: Arc<dyn LlmClient>,
    examples: Vec<(String, String)>,
    max_questions: usize,
}

impl QaGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, max_questions: usize) -> Self {
        Self {
            llm,
            examples: vec![
                (
                    "O que é Python?".to_string(),
                    "Python é uma linguagem de programação.".to_string(),
                ),
                (
                    "Para que serve o FAISS?".to_string(),
                    "FAISS é usado para busca vetorial eficiente.".to_string(),
                ),
            ],
            max_questions,
        }
    }

    pub fn with_examples(mut self, examples: Vec<(String, String)>) -> Self {
        self.examples = examples;
        self
    }

    pub async fn generate_for_triple(&self, triple: &Triple) -> anyhow::Result<QaPair> {
        let prompt = prompt::build_qa_prompt(&self.examples, triple);
        let reply = self.llm.generate(&prompt).await?;
        let (question, answer) = parse_reply(&reply, triple);

        Ok(QaPair {
            question,
            answer,
            triple: triple.clone(),
            reference: Some(triple.statement()),
        })
    }

    /// QA pairs for the first `max_questions` complete triples
    pub async fn run(&self, triples: &[Triple]) -> Vec<QaPair> {
        let mut pairs = Vec::new();

        let complete = triples.iter().filter(|t| {
            let ok = t.is_complete();
            if !ok {
                warn!(?t, "Incomplete triple skipped");
            }
            ok
        });

        for triple in complete.take(self.max_questions) {
            match self.generate_for_triple(triple).await {
                Ok(pair) => {
                    info!(subject = %triple.subject, "QA generated");
                    pairs.push(pair);
                }
                Err(e) => warn!(subject = %triple.subject, "QA generation failed: {:#}", e),
            }
        }

        pairs
    }
}

/// The prompt ends with an open "Q:", so the reply starts with the question
/// and carries the answer after "A:".
fn parse_reply(reply: &str, triple: &Triple) -> (String, String) {
    let body = reply.trim();
    let body = body.strip_prefix("Q:").unwrap_or(body);

    match body.split_once("A:") {
        Some((question, rest)) if !question.trim().is_empty() => {
            let answer = rest.split("\nQ:").next().unwrap_or(rest);
            (question.trim().to_string(), answer.trim().to_string())
        }
        _ => (
            format!("Qual é a relação entre {} e {}?", triple.subject, triple.object),
            body.trim().to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl LlmClient for Canned {
        async fn generate(&self, prompt: &str) -> Result<String> {
            assert!(prompt.ends_with("\nQ:"));
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_generates_up_to_max_questions() {
        let generator = QaGenerator::new(
            Arc::new(Canned(" O que é Rust?\nA: Rust é uma linguagem.\nQ: extra")),
            2,
        );
        let triples = vec![
            Triple::new("Rust", "é_um", "linguagem"),
            Triple::new("", "é_um", "nada"),
            Triple::new("Go", "é_um", "linguagem"),
            Triple::new("C", "é_um", "linguagem"),
        ];
        let pairs = generator.run(&triples).await;

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].question, "O que é Rust?");
        assert_eq!(pairs[0].answer, "Rust é uma linguagem.");
        assert_eq!(pairs[1].triple.subject, "Go");
        assert_eq!(pairs[1].reference.as_deref(), Some("Go é_um linguagem"));
    }

    #[test]
    fn test_reply_without_answer_marker() {
        let triple = Triple::new("FAISS", "usado_para", "busca");
        let (q, a) = parse_reply("Serve para busca vetorial.", &triple);
        assert_eq!(q, "Qual é a relação entre FAISS e busca?");
        assert_eq!(a, "Serve para busca vetorial.");
    }
}
