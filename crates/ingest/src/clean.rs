use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::document::Document;

/// Pluggable junk classifier. When it fails, the heuristics decide.
pub trait JunkDetector: Send + Sync {
    fn is_junk(&self, text: &str) -> Result<bool>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Edge lines shorter than this are treated as header/footer noise
    pub min_line_chars: usize,
    pub header_footer_pattern: String,
    pub min_text_chars: usize,
    /// Texts with a URL and fewer characters than this are junk
    pub url_max_chars: usize,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            min_line_chars: 10,
            header_footer_pattern: r"(?i)^\s*(Página|Page|Copyright|Confidencial)".to_string(),
            min_text_chars: 30,
            url_max_chars: 60,
        }
    }
}

#[derive(Debug, Default)]
pub struct CleanOutcome {
    pub kept: Vec<Document>,
    pub discarded: Vec<Document>,
}

pub struct TextCleaner {
    config: CleanerConfig,
    header_footer: Regex,
    inline_space: Regex,
    line_edges: Regex,
    blank_runs: Regex,
    glyph_blocks: Regex,
    url: Regex,
    symbols_only: Regex,
    detector: Option<Arc<dyn JunkDetector>>,
}

impl TextCleaner {
    pub fn new(config: CleanerConfig) -> Result<Self> {
        Ok(Self {
            header_footer: Regex::new(&config.header_footer_pattern)?,
            inline_space: Regex::new(r"[ \t]+")?,
            line_edges: Regex::new(r"[ \t]*\n[ \t]*")?,
            blank_runs: Regex::new(r"\n{3,}")?,
            glyph_blocks: Regex::new(r"[\x{25A0}-\x{25FF}]{3,}")?,
            url: Regex::new(r"https?://\S+")?,
            symbols_only: Regex::new(r"^[\W_]{10,}$")?,
            config,
            detector: None,
        })
    }

    pub fn with_detector(mut self, detector: Arc<dyn JunkDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Drop control characters, fold compatibility spaces and collapse whitespace
    pub fn normalize(&self, text: &str) -> String {
        let folded: String = text
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .map(|c| match c {
                '\u{00A0}' | '\u{2007}' | '\u{202F}' => ' ',
                other => other,
            })
            .collect();
        let folded = folded.replace('\u{FB01}', "fi").replace('\u{FB02}', "fl");

        let text = self.inline_space.replace_all(&folded, " ");
        let text = self.line_edges.replace_all(&text, "\n");
        let text = self.blank_runs.replace_all(&text, "\n\n");
        text.trim().to_string()
    }

    pub fn strip_headers_footers(&self, text: &str) -> String {
        let mut lines: Vec<&str> = text.lines().collect();

        while lines.first().is_some_and(|l| self.is_edge_noise(l)) {
            lines.remove(0);
        }
        while lines.last().is_some_and(|l| self.is_edge_noise(l)) {
            lines.pop();
        }

        lines.join("\n")
    }

    fn is_edge_noise(&self, line: &str) -> bool {
        line.trim().chars().count() < self.config.min_line_chars || self.header_footer.is_match(line)
    }

    pub fn is_junk(&self, text: &str) -> bool {
        if let Some(detector) = &self.detector {
            match detector.is_junk(text) {
                Ok(verdict) => return verdict,
                Err(e) => warn!("Junk detector failed, using heuristics: {}", e),
            }
        }

        let trimmed = text.trim();
        let len = trimmed.chars().count();

        if len < self.config.min_text_chars {
            return true;
        }
        if self.glyph_blocks.is_match(text) {
            return true;
        }
        if self.url.is_match(text) && len < self.config.url_max_chars {
            return true;
        }
        self.symbols_only.is_match(trimmed)
    }

    pub fn clean_text(&self, text: &str) -> String {
        let normalized = self.normalize(text);
        self.strip_headers_footers(&normalized)
    }

    pub fn clean_documents(&self, documents: Vec<Document>) -> CleanOutcome {
        let mut outcome = CleanOutcome::default();

        for mut doc in documents {
            doc.content = self.clean_text(&doc.content);
            if self.is_junk(&doc.content) {
                debug!(file = %doc.file_name, "Discarding junk document");
                outcome.discarded.push(doc);
            } else {
                outcome.kept.push(doc);
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> TextCleaner {
        TextCleaner::new(CleanerConfig::default()).unwrap()
    }

    #[test]
    fn test_normalize_whitespace() {
        let text = "Linha   um\t\tcom espaços\u{0007}\n\n\n\n  Linha dois  ";
        assert_eq!(cleaner().normalize(text), "Linha um com espaços\n\nLinha dois");
    }

    #[test]
    fn test_strip_headers_footers() {
        let text = "Página 1 de 10\nConteúdo principal do documento aqui.\nOutra linha relevante do texto.\n12";
        let stripped = cleaner().strip_headers_footers(text);
        assert_eq!(
            stripped,
            "Conteúdo principal do documento aqui.\nOutra linha relevante do texto."
        );
    }

    #[test]
    fn test_junk_heuristics() {
        let c = cleaner();
        assert!(c.is_junk("curto"));
        assert!(c.is_junk("veja https://exemplo.com/pagina agora mesmo"));
        assert!(c.is_junk("■■■■ texto com blocos gráficos estranhos aqui ■■■"));
        assert!(c.is_junk("=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-"));
        assert!(!c.is_junk("Redes neurais são modelos inspirados no cérebro humano."));
    }

    struct AlwaysFails;

    impl JunkDetector for AlwaysFails {
        fn is_junk(&self, _text: &str) -> Result<bool> {
            anyhow::bail!("model unavailable")
        }
    }

    #[test]
    fn test_detector_failure_falls_back() {
        let c = cleaner().with_detector(Arc::new(AlwaysFails));
        assert!(c.is_junk("curto"));
        assert!(!c.is_junk("Um parágrafo suficientemente longo para ser mantido."));
    }
}
