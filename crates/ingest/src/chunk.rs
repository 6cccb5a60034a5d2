use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChunkTag {
    /// Low-confidence chunk that needs a human look
    Review,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    pub chunk_id: String,
    pub text: String,
    pub source: String,
    pub offset: (usize, usize), // [start, end) word positions in the source text
    pub confidence: f32,
    pub valid: bool,
    pub tag: Option<ChunkTag>,
}

impl Chunk {
    pub fn new(
        doc_id: String,
        text: String,
        source: String,
        offset: (usize, usize),
    ) -> Self {
        // Generate stable chunk_id from content
        let chunk_id = Self::generate_chunk_id(&doc_id, &text, offset);

        Self {
            doc_id,
            chunk_id,
            text,
            source,
            offset,
            confidence: 1.0,
            valid: true,
            tag: None,
        }
    }

    fn generate_chunk_id(doc_id: &str, text: &str, offset: (usize, usize)) -> String {
        let mut hasher = Sha256::new();
        hasher.update(doc_id.as_bytes());
        hasher.update(text.as_bytes());
        hasher.update(offset.0.to_string().as_bytes());
        hasher.update(offset.1.to_string().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16]) // Use first 16 bytes (32 hex chars)
    }

    /// Records the confidence score and flags the chunk for review below `threshold`
    pub fn apply_confidence(&mut self, confidence: f32, threshold: f32) {
        self.confidence = confidence;
        self.valid = confidence >= threshold;
        self.tag = if self.valid { None } else { Some(ChunkTag::Review) };
    }

    pub fn word_count(&self) -> usize {
        self.offset.1 - self.offset.0
    }
}
