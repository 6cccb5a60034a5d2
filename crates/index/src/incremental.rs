use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::flat::recall_at_k;
use crate::npy;
use crate::store::{EmbeddedRecord, VectorIndexStore, VersionedIndex};
use crate::vector::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    Loaded,
    DeltaMerged,
    Evaluated,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReport {
    pub status: UpdateStatus,
    /// Authoritative version after the cycle
    pub version: Option<u32>,
    pub rows: usize,
    pub old_recall: Option<f32>,
    pub new_recall: Option<f32>,
    pub states: Vec<UpdateState>,
}

/// Query vectors with the row each one is expected to retrieve
#[derive(Debug, Clone)]
pub struct RecallCheck {
    pub queries: Matrix,
    pub ground_truth: Vec<usize>,
}

/// Embeddings currently in service
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub version: Option<u32>,
    pub vectors: Matrix,
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalConfig {
    pub recall_k: usize,
    /// Maximum tolerated recall drop
    pub rollback_threshold: f32,
    pub normalize: bool,
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self {
            recall_k: 5,
            rollback_threshold: 0.05,
            normalize: true,
        }
    }
}

pub struct IncrementalUpdater {
    embeddings_dir: PathBuf,
    index_store: VectorIndexStore,
    config: IncrementalConfig,
}

impl IncrementalUpdater {
    pub fn new(embeddings_dir: impl Into<PathBuf>, index_store: VectorIndexStore, config: IncrementalConfig) -> Self {
        Self {
            embeddings_dir: embeddings_dir.into(),
            index_store,
            config,
        }
    }

    pub fn snapshot_path(&self, version: u32) -> PathBuf {
        self.embeddings_dir.join(format!("embeddings_v{}.npy", version))
    }

    /// Loads `embeddings_v{version}.npy`, with row references from the
    /// matching index metadata when it exists.
    pub async fn load_snapshot(&self, version: u32) -> Result<Snapshot> {
        let vectors = npy::load(&self.snapshot_path(version))
            .await
            .context(format!("Failed to load embeddings snapshot v{}", version))?;

        let references = match self.index_store.load(version).await {
            Ok(index) if index.len() == vectors.rows() => index.references().to_vec(),
            _ => (0..vectors.rows()).map(|i| format!("row-{}", i)).collect(),
        };

        Ok(Snapshot {
            version: Some(version),
            vectors,
            references,
        })
    }

    /// Latest committed snapshot, or an empty one when nothing was committed yet
    pub async fn current_snapshot(&self) -> Result<Snapshot> {
        match self.index_store.latest_version().await? {
            Some(version) if self.snapshot_path(version).exists() => self.load_snapshot(version).await,
            _ => Ok(Snapshot::default()),
        }
    }

    /// Appends `delta` to the snapshot, re-measures recall and only writes
    /// the new version when recall did not drop by more than the threshold.
    pub async fn update(
        &self,
        base: &Snapshot,
        delta: &[EmbeddedRecord],
        check: Option<&RecallCheck>,
    ) -> Result<UpdateReport> {
        let mut states = vec![UpdateState::Loaded];

        let delta_vectors = Matrix::from_rows(
            &delta.iter().map(|r| r.embedding.clone()).collect::<Vec<_>>(),
        )?;
        let mut merged = base.vectors.vstack(&delta_vectors)?;
        if self.config.normalize {
            merged.normalize_rows(1e-8);
        }
        let mut references = base.references.clone();
        references.extend(delta.iter().map(|r| r.reference.clone()));
        states.push(UpdateState::DeltaMerged);
        debug!(rows = merged.rows(), "Merged embedding delta");

        let (old_recall, new_recall) = match check {
            Some(check) => {
                let k = self.config.recall_k;
                let old = recall_at_k(&base.vectors, &check.queries, &check.ground_truth, k)?;
                let new = recall_at_k(&merged, &check.queries, &check.ground_truth, k)?;
                states.push(UpdateState::Evaluated);
                (Some(old), Some(new))
            }
            None => (None, None),
        };

        if let (Some(old), Some(new)) = (old_recall, new_recall) {
            if old - new > self.config.rollback_threshold {
                warn!(
                    old_recall = old,
                    new_recall = new,
                    version = ?base.version,
                    "Recall dropped after update, rolling back"
                );
                states.push(UpdateState::RolledBack);
                return Ok(UpdateReport {
                    status: UpdateStatus::RolledBack,
                    version: base.version,
                    rows: base.vectors.rows(),
                    old_recall,
                    new_recall,
                    states,
                });
            }
        }

        let version = base.version.map_or(1, |v| v + 1);
        npy::save(&self.snapshot_path(version), &merged).await?;
        let index = VersionedIndex::new(version, merged, references)?;
        self.index_store.save(&index).await?;
        states.push(UpdateState::Committed);

        info!(version, rows = index.len(), ?old_recall, ?new_recall, "Committed embedding update");
        Ok(UpdateReport {
            status: UpdateStatus::Committed,
            version: Some(version),
            rows: index.len(),
            old_recall,
            new_recall,
            states,
        })
    }
}
