use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Extensions the reader knows how to turn into markdown.
pub const SUPPORTED_FORMATS: &[&str] = &["txt", "md", "json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "latin-1")]
    Latin1,
}

/// Raw bytes of a file plus their markdown rendering
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub markdown: String,
    pub encoding: TextEncoding,
    pub raw: Vec<u8>,
}

pub struct FileReader;

impl FileReader {
    pub fn is_supported(path: &Path) -> bool {
        let extension = extension_of(path);
        SUPPORTED_FORMATS.contains(&extension.as_str())
    }

    pub async fn read_file(path: &Path) -> Result<ExtractedText> {
        let extension = extension_of(path);
        if !SUPPORTED_FORMATS.contains(&extension.as_str()) {
            anyhow::bail!("Unsupported file format: {}", extension);
        }

        let raw = fs::read(path)
            .await
            .context(format!("Failed to read file: {:?}", path))?;
        let (text, encoding) = decode_text(&raw);

        let markdown = match extension.as_str() {
            "json" => render_json(&text).context(format!("Invalid JSON in {:?}", path))?,
            _ => text,
        };

        Ok(ExtractedText {
            markdown,
            encoding,
            raw,
        })
    }
}

pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// UTF-8 first, Latin-1 when the bytes are not valid UTF-8.
/// Every byte is a valid Latin-1 code point, so the fallback never fails.
pub fn decode_text(raw: &[u8]) -> (String, TextEncoding) {
    match std::str::from_utf8(raw) {
        Ok(text) => (text.to_string(), TextEncoding::Utf8),
        Err(_) => (
            raw.iter().map(|&b| b as char).collect(),
            TextEncoding::Latin1,
        ),
    }
}

fn render_json(text: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let pretty = serde_json::to_string_pretty(&value)?;
    Ok(format!("```json\n{}\n```\n", pretty))
}
