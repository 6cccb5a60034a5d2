use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::prompt;

/// Text-completion capability shared by every LLM-backed stage
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Like `generate`, but asks the backend for JSON output when it supports it
    async fn generate_json(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>, // "json" for structured output
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn default() -> Self {
        Self::new(
            "http://localhost:11434".to_string(),
            "llama3".to_string(),
        )
    }

    async fn request(&self, prompt: &str, format: Option<&str>) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            format: format.map(str::to_string),
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.request(prompt, None).await
    }

    async fn generate_json(&self, prompt: &str) -> Result<String> {
        self.request(prompt, Some("json")).await
    }
}

/// Removes a surrounding markdown code fence, if any
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Generate with retry for invalid JSON
pub async fn generate_json_with_retry(
    llm: &dyn LlmClient,
    prompt: &str,
    max_retries: usize,
) -> Result<String> {
    for attempt in 0..max_retries {
        let response = llm.generate_json(prompt).await?;
        let candidate = strip_code_fences(&response);

        if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
            return Ok(candidate.to_string());
        }

        // If invalid, retry with correction prompt
        if attempt + 1 < max_retries {
            debug!(attempt, "LLM returned invalid JSON, asking for a fix");
            let corrected = llm.generate_json(&prompt::build_retry_prompt(candidate)).await?;
            let corrected = strip_code_fences(&corrected);
            if serde_json::from_str::<serde_json::Value>(corrected).is_ok() {
                return Ok(corrected.to_string());
            }
        }
    }

    anyhow::bail!("Failed to get valid JSON after {} retries", max_retries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned responses in order
    struct Scripted(Mutex<Vec<String>>);

    #[async_trait]
    impl LlmClient for Scripted {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            let mut replies = self.0.lock().unwrap();
            if replies.is_empty() {
                anyhow::bail!("no more replies");
            }
            Ok(replies.remove(0))
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn test_json_retry_uses_correction() {
        let llm = Scripted(Mutex::new(vec![
            "not json".to_string(),
            "{\"ok\": true}".to_string(),
        ]));
        let json = generate_json_with_retry(&llm, "prompt", 3).await.unwrap();
        assert_eq!(json, "{\"ok\": true}");
    }

    #[tokio::test]
    async fn test_json_retry_gives_up() {
        let llm = Scripted(Mutex::new(vec!["nope".to_string(), "still nope".to_string()]));
        assert!(generate_json_with_retry(&llm, "prompt", 1).await.is_err());
    }
}
