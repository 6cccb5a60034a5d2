use anyhow::{Context, Result};
use eval::AdaptiveConfig;
use index::IncrementalConfig;
use ingest::{ChunkerConfig, CleanerConfig, IngestConfig, SegmenterConfig};
use query::{GenerationConfig, HybridConfig, RerankConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub log_format: LogFormat,
    pub output_dir: PathBuf,
    pub ingest: IngestConfig,
    pub cleaning: CleanerConfig,
    pub segmentation: SegmenterConfig,
    pub chunking: ChunkerConfig,
    pub classification: ClassificationConfig,
    pub extraction: ExtractionConfig,
    pub llm: LlmConfig,
    pub embeddings: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub rerank: RerankConfig,
    pub generation: GenerationConfig,
    pub adaptation: AdaptiveConfig,
    pub incremental: IncrementalConfig,
    pub alerts: AlertConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub threshold: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TripleSource {
    /// Copula patterns, no LLM needed
    Pattern,
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub triples: TripleSource,
    pub namespace: String,
    pub max_questions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Offline feature hashing
    Hashing,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub weights: HybridConfig,
    /// Re-tune `weights` on the generated questions before answering
    pub calibrate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub recall_floor: f32,
    pub anomaly_threshold: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Jsonl,
    Supabase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            output_dir: PathBuf::from("./output"),
            ingest: IngestConfig::default(),
            cleaning: CleanerConfig::default(),
            segmentation: SegmenterConfig::default(),
            chunking: ChunkerConfig::default(),
            classification: ClassificationConfig::default(),
            extraction: ExtractionConfig::default(),
            llm: LlmConfig::default(),
            embeddings: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            rerank: RerankConfig::default(),
            generation: GenerationConfig::default(),
            adaptation: AdaptiveConfig::default(),
            incremental: IncrementalConfig::default(),
            alerts: AlertConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self { threshold: 0.7 }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            triples: TripleSource::Pattern,
            namespace: extract::DEFAULT_NAMESPACE.to_string(),
            max_questions: 3,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 384,
            cache: CacheConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 24 * 60 * 60,
            max_entries: 10_000,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            weights: HybridConfig::default(),
            calibrate: false,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            recall_floor: 0.7,
            anomaly_threshold: 0.1,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Jsonl,
            supabase_url: None,
            supabase_key: None,
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON config file; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .context(format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw).context(format!("Failed to parse config file {}", path.display()))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Supabase credentials from `SUPABASE_URL` / `SUPABASE_KEY` override the file
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SUPABASE_URL").filter(|v| !v.is_empty()) {
            self.store.supabase_url = Some(url);
        }
        if let Some(key) = lookup("SUPABASE_KEY").filter(|v| !v.is_empty()) {
            self.store.supabase_key = Some(key);
        }
    }

    pub fn markdown_dir(&self) -> PathBuf {
        self.output_dir.join("markdown")
    }

    pub fn graph_path(&self) -> PathBuf {
        self.output_dir.join("grafo.rdf")
    }

    pub fn embeddings_dir(&self) -> PathBuf {
        self.output_dir.join("embeddings")
    }

    pub fn indices_dir(&self) -> PathBuf {
        self.output_dir.join("indices")
    }

    pub fn dashboard_dir(&self) -> PathBuf {
        self.output_dir.join("dashboard")
    }

    pub fn hard_negatives_path(&self) -> PathBuf {
        self.output_dir.join("fine_tuning").join("hard_negatives.jsonl")
    }

    pub fn store_dir(&self) -> PathBuf {
        self.output_dir.join("store")
    }
}
