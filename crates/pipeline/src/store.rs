use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub const TRIPLES_TABLE: &str = "triplas_grafo";
pub const METADATA_TABLE: &str = "metadados_enriquecidos";
pub const QA_TABLE: &str = "qa_gerado";
pub const EMBEDDINGS_TABLE: &str = "embeddings";
pub const EVALUATIONS_TABLE: &str = "avaliacoes";

pub const TABLE_DDL: [&str; 5] = [
    "create table if not exists triplas_grafo (\n    id serial primary key,\n    sujeito text,\n    predicado text,\n    objeto text,\n    data timestamp with time zone default now()\n);",
    "create table if not exists metadados_enriquecidos (\n    id serial primary key,\n    entidade text,\n    tipo text,\n    documento_id text,\n    data timestamp with time zone default now()\n);",
    "create table if not exists qa_gerado (\n    id serial primary key,\n    pergunta text,\n    resposta text,\n    tripla_relacionada jsonb,\n    data timestamp with time zone default now()\n);",
    "create table if not exists embeddings (\n    id serial primary key,\n    embedding float8[],\n    referencia text,\n    data timestamp with time zone default now()\n);",
    "create table if not exists avaliacoes (\n    id serial primary key,\n    pergunta text,\n    resposta text,\n    score float8,\n    feedback text,\n    avaliacao_automatica jsonb,\n    avaliacao_llm_judge text,\n    avaliacao_humana text,\n    data timestamp with time zone default now()\n);",
];

/// Row-oriented persistence of pipeline results
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_table(&self, sql: &str) -> Result<()>;
    async fn insert(&self, table: &str, record: &Value) -> Result<()>;
}

/// Runs every table DDL; failures are logged
pub async fn init_schema(store: &dyn RecordStore) {
    for sql in TABLE_DDL {
        if let Err(e) = store.create_table(sql).await {
            warn!("Failed to create table: {:#}", e);
        }
    }
}

/// Appends records to `<dir>/<table>.jsonl`, DDL to `<dir>/schema.sql`
pub struct JsonlStore {
    dir: PathBuf,
}

impl JsonlStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", table))
    }

    async fn append(&self, path: PathBuf, text: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context(format!("Failed to create store dir: {:?}", self.dir))?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context(format!("Failed to open {:?}", path))?;
        file.write_all(text.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonlStore {
    async fn create_table(&self, sql: &str) -> Result<()> {
        let schema_path = self.dir.join("schema.sql");
        let existing = tokio::fs::read_to_string(&schema_path).await.unwrap_or_default();
        if existing.contains(sql.trim()) {
            return Ok(());
        }
        self.append(schema_path, &format!("{}\n\n", sql.trim())).await
    }

    async fn insert(&self, table: &str, record: &Value) -> Result<()> {
        let mut record = record.clone();
        if let Value::Object(fields) = &mut record {
            fields
                .entry("data")
                .or_insert_with(|| Value::String(chrono::Utc::now().to_rfc3339()));
        }
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        self.append(self.table_path(table), &line).await?;
        debug!(table, "Record stored");
        Ok(())
    }
}

/// PostgREST endpoints of a Supabase project
pub struct SupabaseStore {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SupabaseStore {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<()> {
        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await
            .context("Failed to send request to Supabase")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Supabase request failed: {} {}", status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SupabaseStore {
    async fn create_table(&self, sql: &str) -> Result<()> {
        self.post(&self.rpc_url("execute_sql"), &serde_json::json!({ "sql": sql }))
            .await
    }

    async fn insert(&self, table: &str, record: &Value) -> Result<()> {
        self.post(&self.table_url(table), record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_jsonl_store_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::new(dir.path().join("store"));

        store
            .insert(TRIPLES_TABLE, &json!({"sujeito": "Python", "predicado": "é_um", "objeto": "linguagem"}))
            .await
            .unwrap();
        store
            .insert(TRIPLES_TABLE, &json!({"sujeito": "Rust", "predicado": "is_a", "objeto": "language"}))
            .await
            .unwrap();

        let content = std::fs::read_to_string(store.table_path(TRIPLES_TABLE)).unwrap();
        let rows: Vec<Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["sujeito"], "Rust");
        assert!(rows[0]["data"].is_string());
    }

    #[tokio::test]
    async fn test_schema_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::new(dir.path());

        init_schema(&store).await;
        init_schema(&store).await;

        let schema = std::fs::read_to_string(dir.path().join("schema.sql")).unwrap();
        assert_eq!(schema.matches("create table if not exists").count(), 5);
        assert!(schema.contains("avaliacao_humana text"));
    }

    #[test]
    fn test_supabase_urls() {
        let store = SupabaseStore::new("https://proj.supabase.co/".to_string(), "key".to_string());
        assert_eq!(store.table_url(QA_TABLE), "https://proj.supabase.co/rest/v1/qa_gerado");
        assert_eq!(store.rpc_url("execute_sql"), "https://proj.supabase.co/rest/v1/rpc/execute_sql");
    }
}
