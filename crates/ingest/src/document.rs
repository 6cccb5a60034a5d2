use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::reader::{ExtractedText, TextEncoding, extension_of};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub size_bytes: u64,
    pub sha256: String,
    pub encoding: TextEncoding,
    pub path: String,
    pub markdown_len: usize,
    pub markdown_lines: usize,
}

/// A source file converted to markdown text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub file_name: String,
    pub format: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn from_extracted(path: &Path, extracted: ExtractedText) -> Self {
        let path_str = path.to_string_lossy().to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path_str.clone());

        let mut hasher = Sha256::new();
        hasher.update(&extracted.raw);
        let sha256 = hex::encode(hasher.finalize());

        let metadata = DocumentMetadata {
            size_bytes: extracted.raw.len() as u64,
            sha256,
            encoding: extracted.encoding,
            path: path_str.clone(),
            markdown_len: extracted.markdown.chars().count(),
            markdown_lines: extracted.markdown.lines().count(),
        };

        Self {
            id: crate::generate_doc_id(&path_str),
            file_name,
            format: extension_of(path),
            content: extracted.markdown,
            metadata,
        }
    }

    /// File name without extension, used for mirror files
    pub fn stem(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.file_name,
        }
    }
}
