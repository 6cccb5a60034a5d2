pub mod generation;
pub mod hybrid;
pub mod rerank;

pub use generation::{AnswerGenerator, FewShotExample, GeneratedAnswer, GenerationConfig, default_examples};
pub use hybrid::{CalibrationSample, HybridConfig, HybridRetriever, RetrievalResult, min_max_normalize};
pub use rerank::{CrossEncoder, LlmCrossEncoder, RankedCandidate, RerankConfig, Reranker, parse_relevance};
