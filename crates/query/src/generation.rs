use anyhow::Result;
use extract::LlmClient;
use index::{Embedder, cosine_similarity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub question: String,
    pub answer: String,
}

impl FewShotExample {
    pub fn new(question: &str, answer: &str) -> Self {
        Self {
            question: question.to_string(),
            answer: answer.to_string(),
        }
    }
}

/// Generic examples used when nothing closer to the query is available
pub fn default_examples() -> Vec<FewShotExample> {
    vec![
        FewShotExample::new(
            "O que é Python?",
            "Python é uma linguagem de programação de alto nível, interpretada e de propósito geral.",
        ),
        FewShotExample::new(
            "Para que serve o FAISS?",
            "FAISS é uma biblioteca para busca eficiente de similaridade entre vetores densos.",
        ),
        FewShotExample::new(
            "O que é RAG?",
            "RAG (Retrieval-Augmented Generation) combina recuperação de documentos com geração de texto por um modelo de linguagem.",
        ),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub few_shot_k: usize,
    pub similarity_threshold: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            few_shot_k: 3,
            similarity_threshold: 0.65,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub query: String,
    pub answer: String,
    pub prompt: String,
    pub few_shots: Vec<FewShotExample>,
    pub context_documents: Vec<String>,
    /// The LLM call failed and `answer` holds the error message
    pub failed: bool,
}

pub struct AnswerGenerator {
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn Embedder>,
    examples: Vec<FewShotExample>,
    example_embeddings: OnceCell<Vec<Vec<f32>>>,
    config: GenerationConfig,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, embedder: Arc<dyn Embedder>, config: GenerationConfig) -> Self {
        Self::with_examples(llm, embedder, default_examples(), config)
    }

    pub fn with_examples(
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn Embedder>,
        examples: Vec<FewShotExample>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            llm,
            embedder,
            examples,
            example_embeddings: OnceCell::new(),
            config,
        }
    }

    fn generic_examples(&self) -> Vec<FewShotExample> {
        self.examples.iter().take(self.config.few_shot_k).cloned().collect()
    }

    /// Examples most similar to the query above the threshold, or the
    /// first generic ones when none qualify.
    pub async fn select_few_shots(&self, query: &str) -> Vec<FewShotExample> {
        match self.similar_examples(query).await {
            Ok(selected) if !selected.is_empty() => selected,
            Ok(_) => self.generic_examples(),
            Err(e) => {
                warn!("Few-shot selection failed, using generic examples: {:#}", e);
                self.generic_examples()
            }
        }
    }

    async fn similar_examples(&self, query: &str) -> Result<Vec<FewShotExample>> {
        let example_embeddings = self
            .example_embeddings
            .get_or_try_init(|| async {
                let questions: Vec<String> = self.examples.iter().map(|e| e.question.clone()).collect();
                self.embedder.encode_batch(&questions).await
            })
            .await?;
        let query_embedding = self.embedder.encode(query).await?;

        let mut scored: Vec<(usize, f32)> = example_embeddings
            .iter()
            .enumerate()
            .filter(|(_, emb)| emb.len() == query_embedding.len())
            .map(|(i, emb)| (i, cosine_similarity(&query_embedding, emb)))
            .filter(|(_, sim)| *sim >= self.config.similarity_threshold)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(scored
            .into_iter()
            .take(self.config.few_shot_k)
            .map(|(i, _)| self.examples[i].clone())
            .collect())
    }

    pub fn build_prompt(query: &str, few_shots: &[FewShotExample], context_documents: &[String]) -> String {
        let shots = few_shots
            .iter()
            .map(|e| format!("Q: {}\nA: {}", e.question, e.answer))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "{}\n\nContexto:\n{}\n\nQ: {}\nA:",
            shots,
            context_documents.join("\n"),
            query
        )
    }

    /// Never fails: LLM errors become the answer text with `failed` set
    pub async fn answer(&self, query: &str, context_documents: &[String]) -> GeneratedAnswer {
        let few_shots = self.select_few_shots(query).await;
        let prompt = Self::build_prompt(query, &few_shots, context_documents);

        let (answer, failed) = match self.llm.generate(&prompt).await {
            Ok(text) => (text.trim().to_string(), false),
            Err(e) => {
                warn!(query, "Answer generation failed: {:#}", e);
                (format!("Erro ao gerar resposta: {}", e), true)
            }
        };
        debug!(query, shots = few_shots.len(), failed, "Generated answer");

        GeneratedAnswer {
            query: query.to_string(),
            answer,
            prompt,
            few_shots,
            context_documents: context_documents.to_vec(),
            failed,
        }
    }

    /// Answers each `(query, context)` item in order, skipping empty queries
    pub async fn answer_batch(&self, items: &[(String, Vec<String>)]) -> Vec<GeneratedAnswer> {
        let mut answers = Vec::with_capacity(items.len());
        for (position, (query, context)) in items.iter().enumerate() {
            if query.trim().is_empty() {
                warn!(position, "Skipping item with empty query");
                continue;
            }
            answers.push(self.answer(query, context).await);
        }
        answers
    }
}
