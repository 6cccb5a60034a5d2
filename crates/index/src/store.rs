use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::flat::FlatL2Index;
use crate::npy;
use crate::vector::Matrix;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedRecord {
    pub reference: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHit {
    pub reference: String,
    pub distance: f32,
    /// Row of the hit in the index
    pub position: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexMeta {
    version: u32,
    dimension: usize,
    references: Vec<String>,
}

/// A flat L2 index plus the reference text of every row
#[derive(Debug, Clone)]
pub struct VersionedIndex {
    pub version: u32,
    index: FlatL2Index,
    references: Vec<String>,
}

impl VersionedIndex {
    pub fn new(version: u32, vectors: Matrix, references: Vec<String>) -> Result<Self> {
        if vectors.rows() != references.len() {
            anyhow::bail!(
                "Index has {} vectors but {} references",
                vectors.rows(),
                references.len()
            );
        }
        Ok(Self {
            version,
            index: FlatL2Index::from_matrix(vectors),
            references,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn references(&self) -> &[String] {
        &self.references
    }

    pub fn vectors(&self) -> &Matrix {
        self.index.vectors()
    }

    /// Nearest references to `query`; a wrong-sized query is logged and yields nothing
    pub fn search(&self, query: &[f32], k: usize) -> Vec<IndexHit> {
        match self.index.search(query, k) {
            Ok(hits) => hits
                .into_iter()
                .map(|(position, distance)| IndexHit {
                    reference: self.references[position].clone(),
                    distance,
                    position,
                })
                .collect(),
            Err(e) => {
                error!(version = self.version, "Index search failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Builds, persists and reloads versioned indices under one directory
pub struct VectorIndexStore {
    dir: PathBuf,
    dimension: Option<usize>,
}

impl VectorIndexStore {
    pub fn new(dir: impl Into<PathBuf>, dimension: Option<usize>) -> Self {
        Self {
            dir: dir.into(),
            dimension,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self, version: u32) -> PathBuf {
        self.dir.join(format!("index_v{}.npy", version))
    }

    pub fn meta_path(&self, version: u32) -> PathBuf {
        self.dir.join(format!("index_v{}_meta.json", version))
    }

    /// Records with an empty or wrong-sized embedding are skipped. The
    /// dimension comes from the store or, failing that, the first usable record.
    /// Returns None when nothing is left to index.
    pub fn build(&self, records: &[EmbeddedRecord], version: u32) -> Option<VersionedIndex> {
        let dimension = self
            .dimension
            .or_else(|| records.iter().map(|r| r.embedding.len()).find(|&d| d > 0))?;

        let mut vectors = Matrix::default();
        let mut references = Vec::new();
        for record in records {
            if record.embedding.len() != dimension {
                warn!(
                    reference = %record.reference,
                    got = record.embedding.len(),
                    expected = dimension,
                    "Skipping record with unexpected embedding size"
                );
                continue;
            }
            // Sizes were checked above
            if vectors.push_row(&record.embedding).is_ok() {
                references.push(record.reference.clone());
            }
        }

        if references.is_empty() {
            warn!("No valid embeddings to index");
            return None;
        }

        info!(version, rows = references.len(), dimension, "Built vector index");
        VersionedIndex::new(version, vectors, references).ok()
    }

    pub async fn save(&self, index: &VersionedIndex) -> Result<()> {
        npy::save(&self.index_path(index.version), index.vectors()).await?;

        let meta = IndexMeta {
            version: index.version,
            dimension: index.dimension(),
            references: index.references.clone(),
        };
        let json = serde_json::to_string_pretty(&meta)?;
        let meta_path = self.meta_path(index.version);
        tokio::fs::write(&meta_path, json)
            .await
            .context(format!("Failed to write index metadata: {:?}", meta_path))?;

        info!(version = index.version, dir = %self.dir.display(), "Saved vector index");
        Ok(())
    }

    pub async fn load(&self, version: u32) -> Result<VersionedIndex> {
        let vectors = npy::load(&self.index_path(version)).await?;
        let meta_path = self.meta_path(version);
        let meta_json = tokio::fs::read_to_string(&meta_path)
            .await
            .context(format!("Failed to read index metadata: {:?}", meta_path))?;
        let meta: IndexMeta = serde_json::from_str(&meta_json)
            .context("Failed to parse index metadata")?;

        VersionedIndex::new(version, vectors, meta.references)
            .context(format!("Index v{} is inconsistent with its metadata", version))
    }

    /// Highest version with an index file on disk
    pub async fn latest_version(&self) -> Result<Option<u32>> {
        if !self.dir.exists() {
            return Ok(None);
        }

        let mut latest = None;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let version = name
                .strip_prefix("index_v")
                .and_then(|rest| rest.strip_suffix(".npy"))
                .and_then(|v| v.parse::<u32>().ok());
            if let Some(v) = version {
                latest = latest.max(Some(v));
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(reference: &str, embedding: Vec<f32>) -> EmbeddedRecord {
        EmbeddedRecord {
            reference: reference.to_string(),
            embedding,
        }
    }

    #[test]
    fn test_build_skips_mismatched_records() {
        let store = VectorIndexStore::new("unused", None);
        let records = vec![
            record("a", vec![1.0, 0.0]),
            record("b", vec![]),
            record("c", vec![0.0, 1.0, 0.0]),
            record("d", vec![0.0, 1.0]),
        ];
        let index = store.build(&records, 1).unwrap();

        assert_eq!(index.references(), &["a".to_string(), "d".to_string()]);
        let hits = index.search(&[0.0, 0.9], 1);
        assert_eq!(hits[0].reference, "d");
        assert_eq!(hits[0].position, 1);
        assert!(index.search(&[1.0, 2.0, 3.0], 1).is_empty());
    }

    #[test]
    fn test_build_with_nothing_valid() {
        let store = VectorIndexStore::new("unused", Some(3));
        assert!(store.build(&[record("a", vec![1.0])], 1).is_none());
        assert!(store.build(&[], 1).is_none());
    }

    #[tokio::test]
    async fn test_save_load_and_latest_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorIndexStore::new(dir.path(), None);
        let index = store
            .build(&[record("x", vec![0.5, 0.5]), record("y", vec![1.0, 0.0])], 3)
            .unwrap();
        store.save(&index).await.unwrap();

        let loaded = store.load(3).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.references()[1], "y");
        assert_eq!(store.latest_version().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_load_rejects_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorIndexStore::new(dir.path(), None);
        let index = store.build(&[record("x", vec![0.5, 0.5])], 1).unwrap();
        store.save(&index).await.unwrap();

        std::fs::write(
            store.meta_path(1),
            r#"{"version":1,"dimension":2,"references":["x","extra"]}"#,
        )
        .unwrap();
        assert!(store.load(1).await.is_err());
    }
}
