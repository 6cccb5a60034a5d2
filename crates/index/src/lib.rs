pub mod bm25;
pub mod cache;
pub mod embeddings;
pub mod flat;
pub mod incremental;
pub mod npy;
pub mod store;
pub mod vector;

pub use bm25::{Bm25Okapi, Bm25Params, tokenize};
pub use cache::{CacheStats, CachedEmbedder};
pub use embeddings::{Embedder, EmbeddingClient, HashingEmbedder};
pub use flat::{FlatL2Index, recall_at_k};
pub use incremental::{
    IncrementalConfig, IncrementalUpdater, RecallCheck, Snapshot, UpdateReport, UpdateState, UpdateStatus,
};
pub use store::{EmbeddedRecord, IndexHit, VectorIndexStore, VersionedIndex};
pub use vector::{Matrix, cosine_similarity};

use tracing::warn;

/// Embeds `(reference, text)` pairs. Failed items are logged and skipped.
pub async fn embed_records(embedder: &dyn Embedder, items: &[(String, String)]) -> Vec<EmbeddedRecord> {
    let mut records = Vec::with_capacity(items.len());
    for (reference, text) in items {
        match embedder.encode(text).await {
            Ok(embedding) => records.push(EmbeddedRecord {
                reference: reference.clone(),
                embedding,
            }),
            Err(e) => warn!(reference = %reference, "Embedding failed: {:#}", e),
        }
    }
    records
}
