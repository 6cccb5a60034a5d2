pub mod classify;
pub mod graph;
pub mod llm;
pub mod metadata;
pub mod normalizer;
pub mod prompt;
pub mod qa;
pub mod schema;
pub mod triples;

pub use classify::{ChunkClassifier, ChunkTagger, ClassifiedChunk, KeywordClassifier, REVIEW_TAG};
pub use graph::{DEFAULT_NAMESPACE, KnowledgeGraph};
pub use llm::{LlmClient, OllamaClient, generate_json_with_retry};
pub use metadata::{CapitalizedSpanRecognizer, EnrichedText, EntityMention, EntityRecognizer, MetadataEnricher};
pub use normalizer::EntityNormalizer;
pub use qa::{QaGenerator, QaPair};
pub use schema::{Entity, ExtractionResult, Relation, Triple};
pub use triples::{LlmTripleExtractor, PatternExtractor, TripleExtractor, populate_graph};
