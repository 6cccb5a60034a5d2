use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentMethod {
    Auto,
    Fixed,
    Sentences,
    Hierarchical,
    Paragraphs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    /// Byte offsets into the segmented text
    pub start: usize,
    pub end: usize,
    pub method: SegmentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    pub method: SegmentMethod,
    pub fixed_size: usize,
    pub fixed_overlap: usize,
    pub sentence_max_chars: usize,
    pub section_max_chars: usize,
    pub min_section_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            method: SegmentMethod::Auto,
            fixed_size: 1000,
            fixed_overlap: 200,
            sentence_max_chars: 1500,
            section_max_chars: 2000,
            min_section_chars: 50,
        }
    }
}

pub struct Segmenter {
    config: SegmenterConfig,
    heading: Regex,
    paragraph_break: Regex,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self> {
        // Markdown headings, ALL-CAPS titles, horizontal rules, and the usual
        // legal/scientific section markers
        let heading = Regex::new(
            r"(?m)^(#{1,6}\s+\S.*|[A-ZÀ-Ý][A-ZÀ-Ý0-9 ,.:;()\-]{3,}|-{3,}|_{3,}|(Art\.|Artigo|CAPÍTULO|Seção)\s.*|(Abstract|Resumo|Introdução|Introduction|Metodologia|Methods|Resultados|Results|Conclusão|Conclusion|Referências|References)\b.*)[ \t]*$",
        )?;

        Ok(Self {
            config,
            heading,
            paragraph_break: Regex::new(r"\n[ \t]*\n")?,
        })
    }

    /// Picks a method from the text length when the configured method is `Auto`
    pub fn resolve_method(&self, text: &str) -> SegmentMethod {
        if self.config.method != SegmentMethod::Auto {
            return self.config.method;
        }

        let len = text.chars().count();
        if len <= 1500 {
            SegmentMethod::Fixed
        } else if len > 10_000 {
            SegmentMethod::Hierarchical
        } else if len > 3000 {
            SegmentMethod::Sentences
        } else {
            SegmentMethod::Fixed
        }
    }

    pub fn segment(&self, text: &str) -> Vec<Segment> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        match self.resolve_method(text) {
            SegmentMethod::Fixed | SegmentMethod::Auto => self.fixed(text),
            SegmentMethod::Sentences => self.sentences(text, 0),
            SegmentMethod::Hierarchical => self.hierarchical(text),
            SegmentMethod::Paragraphs => self.paragraphs(text),
        }
    }

    fn fixed(&self, text: &str) -> Vec<Segment> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let n = chars.len();
        let size = self.config.fixed_size.max(1);
        let overlap = self.config.fixed_overlap.min(size - 1);

        let mut segments = Vec::new();
        let mut start = 0;

        while start < n {
            let mut end = (start + size).min(n);

            // Cut at whitespace so words stay intact
            if end < n {
                if let Some(ws) = (start + size / 2..end).rev().find(|&i| chars[i].1.is_whitespace()) {
                    end = ws;
                }
            }

            let byte_start = chars[start].0;
            let byte_end = if end < n { chars[end].0 } else { text.len() };
            push_segment(&mut segments, text, byte_start, byte_end, SegmentMethod::Fixed);

            if end >= n {
                break;
            }
            let next = end.saturating_sub(overlap);
            start = if next > start { next } else { end };
        }

        segments
    }

    /// Groups Unicode sentences until the next one would exceed the limit
    fn sentences(&self, text: &str, base: usize) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut current: Option<usize> = None;
        let mut current_end = 0;

        for (idx, sentence) in text.split_sentence_bound_indices() {
            let sentence_end = idx + sentence.len();

            match current {
                Some(start)
                    if text[start..sentence_end].chars().count() > self.config.sentence_max_chars =>
                {
                    push_segment(&mut segments, text, start, current_end, SegmentMethod::Sentences);
                    current = Some(idx);
                }
                Some(_) => {}
                None => current = Some(idx),
            }
            current_end = sentence_end;
        }

        if let Some(start) = current {
            push_segment(&mut segments, text, start, current_end, SegmentMethod::Sentences);
        }

        for seg in &mut segments {
            seg.start += base;
            seg.end += base;
        }
        segments
    }

    fn hierarchical(&self, text: &str) -> Vec<Segment> {
        let mut bounds: Vec<usize> = self.heading.find_iter(text).map(|m| m.start()).collect();
        if bounds.first() != Some(&0) {
            bounds.insert(0, 0);
        }
        bounds.push(text.len());

        let mut segments = Vec::new();
        for window in bounds.windows(2) {
            let (start, end) = (window[0], window[1]);
            let section = &text[start..end];
            let len = section.trim().chars().count();

            if len <= self.config.min_section_chars {
                continue;
            }

            if len > self.config.section_max_chars {
                segments.extend(self.sentences(section, start).into_iter().map(|mut s| {
                    s.method = SegmentMethod::Hierarchical;
                    s
                }));
            } else {
                push_segment(&mut segments, text, start, end, SegmentMethod::Hierarchical);
            }
        }

        segments
    }

    fn paragraphs(&self, text: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut start = 0;

        for m in self.paragraph_break.find_iter(text) {
            push_segment(&mut segments, text, start, m.start(), SegmentMethod::Paragraphs);
            start = m.end();
        }
        push_segment(&mut segments, text, start, text.len(), SegmentMethod::Paragraphs);

        segments
    }
}

fn push_segment(
    segments: &mut Vec<Segment>,
    text: &str,
    start: usize,
    end: usize,
    method: SegmentMethod,
) {
    let slice = text[start..end].trim();
    if !slice.is_empty() {
        segments.push(Segment {
            text: slice.to_string(),
            start,
            end,
            method,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter(method: SegmentMethod) -> Segmenter {
        Segmenter::new(SegmenterConfig {
            method,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_auto_method_selection() {
        let s = segmenter(SegmentMethod::Auto);
        assert_eq!(s.resolve_method(&"a".repeat(1200)), SegmentMethod::Fixed);
        assert_eq!(s.resolve_method(&"a".repeat(2500)), SegmentMethod::Fixed);
        assert_eq!(s.resolve_method(&"a".repeat(5000)), SegmentMethod::Sentences);
        assert_eq!(s.resolve_method(&"a".repeat(12_000)), SegmentMethod::Hierarchical);
    }

    #[test]
    fn test_fixed_windows_overlap() {
        let s = Segmenter::new(SegmenterConfig {
            method: SegmentMethod::Fixed,
            fixed_size: 20,
            fixed_overlap: 5,
            ..Default::default()
        })
        .unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let segments = s.segment(text);

        assert!(segments.len() > 1);
        for pair in segments.windows(2) {
            assert!(pair[1].start < pair[0].end, "windows should overlap");
        }
        assert!(text.ends_with(segments.last().unwrap().text.as_str()));
    }

    #[test]
    fn test_hierarchical_splits_on_headings() {
        let body = "Este parágrafo descreve o conteúdo da seção com detalhes suficientes.";
        let text = format!("# Introdução\n{}\n\n# Métodos\n{}\n", body, body);
        let segments = segmenter(SegmentMethod::Hierarchical).segment(&text);

        assert_eq!(segments.len(), 2);
        assert!(segments[0].text.starts_with("# Introdução"));
        assert!(segments[1].text.starts_with("# Métodos"));
    }

    #[test]
    fn test_paragraphs_and_empty_text() {
        let segments = segmenter(SegmentMethod::Paragraphs).segment("um\n\ndois\n  \ntrês");
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["um", "dois", "três"]);

        assert!(segmenter(SegmentMethod::Auto).segment("   ").is_empty());
    }
}
