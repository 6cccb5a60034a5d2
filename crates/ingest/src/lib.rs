pub mod chunk;
pub mod chunker;
pub mod clean;
pub mod document;
pub mod reader;
pub mod segment;

pub use chunk::{Chunk, ChunkTag};
pub use chunker::{Chunker, ChunkerConfig, ConfidenceModel, UniformConfidence};
pub use clean::{CleanOutcome, CleanerConfig, JunkDetector, TextCleaner};
pub use document::{Document, DocumentMetadata};
pub use reader::{FileReader, TextEncoding, SUPPORTED_FORMATS};
pub use segment::{Segment, SegmentMethod, Segmenter, SegmenterConfig};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Generate a stable document ID from file path
pub fn generate_doc_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub max_workers: usize,
    /// Lowercase extensions without the dot
    pub allowed_extensions: Vec<String>,
    pub min_size_bytes: u64,
    /// When set, every document is mirrored there as `<stem>.md`
    pub markdown_dir: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            allowed_extensions: SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
            min_size_bytes: 0,
            markdown_dir: None,
        }
    }
}

pub struct Ingestor {
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    /// Files directly inside `dir` that pass the extension and size filters
    pub fn list_files(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let ext = reader::extension_of(entry.path());
                self.config.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext))
            })
            .filter(|entry| {
                entry
                    .metadata()
                    .map(|m| m.len() >= self.config.min_size_bytes)
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect();

        files.sort();
        files
    }

    pub async fn ingest_file(&self, path: &Path) -> Result<Document> {
        let extracted = FileReader::read_file(path).await?;
        Ok(Document::from_extracted(path, extracted))
    }

    /// Ingest every supported file of a directory on a bounded worker pool.
    /// Files that fail are logged and skipped.
    pub async fn ingest_directory(&self, dir: &Path) -> Result<Vec<Document>> {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Input directory does not exist");
            return Ok(Vec::new());
        }

        let files = self.list_files(dir);
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let mut workers = JoinSet::new();

        for path in files {
            let semaphore = semaphore.clone();
            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (path, Err(anyhow::Error::from(e))),
                };
                let result = FileReader::read_file(&path)
                    .await
                    .map(|extracted| Document::from_extracted(&path, extracted));
                (path, result)
            });
        }

        let mut documents = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok(doc))) => documents.push(doc),
                Ok((path, Err(e))) => warn!(file = %path.display(), "Skipping file: {:#}", e),
                Err(e) => error!("Ingestion worker failed: {}", e),
            }
        }

        documents.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        info!(dir = %dir.display(), count = documents.len(), "Ingested documents");

        if let Some(markdown_dir) = &self.config.markdown_dir {
            write_markdown_mirror(markdown_dir, &documents).await?;
        }

        Ok(documents)
    }
}

/// Writes `<stem>.md` for every document, returns how many were written
pub async fn write_markdown_mirror(dir: &Path, documents: &[Document]) -> Result<usize> {
    tokio::fs::create_dir_all(dir)
        .await
        .context(format!("Failed to create markdown dir: {:?}", dir))?;

    for doc in documents {
        let target = dir.join(format!("{}.md", doc.stem()));
        tokio::fs::write(&target, &doc.content)
            .await
            .context(format!("Failed to write markdown mirror: {:?}", target))?;
    }

    Ok(documents.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ingest_directory_skips_bad_files() {
        let input = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("b.md"), "# Título\nConteúdo").unwrap();
        std::fs::write(input.path().join("a.txt"), [0x6F, 0x6C, 0xE1]).unwrap();
        std::fs::write(input.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(input.path().join("ignored.pdf"), "%PDF").unwrap();

        let ingestor = Ingestor::new(IngestConfig {
            max_workers: 2,
            markdown_dir: Some(mirror.path().to_path_buf()),
            ..Default::default()
        });
        let docs = ingestor.ingest_directory(input.path()).await.unwrap();

        let names: Vec<&str> = docs.iter().map(|d| d.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.md"]);
        assert_eq!(docs[0].content, "olá");
        assert_eq!(docs[0].metadata.encoding, TextEncoding::Latin1);
        assert_eq!(docs[1].metadata.markdown_lines, 2);
        assert!(mirror.path().join("a.md").exists());
        assert!(mirror.path().join("b.md").exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let ingestor = Ingestor::new(IngestConfig::default());
        let docs = ingestor
            .ingest_directory(Path::new("/definitely/not/here"))
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_doc_id_is_stable() {
        assert_eq!(generate_doc_id("a/b.txt"), generate_doc_id("a/b.txt"));
        assert_eq!(generate_doc_id("a/b.txt").len(), 32);
    }
}
