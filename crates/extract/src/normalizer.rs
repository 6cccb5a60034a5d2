use std::collections::HashMap;

/// Canonicalizes entity names so the same entity maps to one graph node.
/// The first surface form seen for an entity becomes its canonical name.
#[derive(Debug, Default)]
pub struct EntityNormalizer {
    /// Maps lowercase key -> canonical name
    aliases: HashMap<String, String>,
}

impl EntityNormalizer {
    pub fn new() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Trim punctuation, collapse whitespace and split a glued version number
    /// ("Python3" -> "Python 3"). Does not touch the alias table.
    pub fn clean(name: &str) -> String {
        let trimmed = name.trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '\'' | '"' | '(' | ')')
        });
        let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
        split_version_suffix(&collapsed)
    }

    pub fn normalize(&mut self, name: &str) -> String {
        let surface = Self::clean(name);
        let key = surface.to_lowercase();

        // Check if we've seen a similar entity
        if let Some(canonical) = self.aliases.get(&key) {
            return canonical.clone();
        }

        let found_canonical = self
            .aliases
            .iter()
            .find(|(existing, _)| are_similar(&key, existing))
            .map(|(_, canonical)| canonical.clone());

        let canonical = found_canonical.unwrap_or_else(|| surface.clone());
        self.aliases.insert(key, canonical.clone());
        canonical
    }

    /// Canonical name for an already-seen entity
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.aliases.get(&Self::clean(name).to_lowercase()).map(String::as_str)
    }

    /// Get the mapping of all aliases
    pub fn get_aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }
}

fn split_version_suffix(name: &str) -> String {
    let digits = name.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits == name.chars().count() {
        return name.to_string();
    }

    let split_at = name.len() - digits; // ASCII digits are one byte each
    let (head, tail) = name.split_at(split_at);
    if head.chars().last().is_some_and(char::is_alphabetic) {
        format!("{} {}", head, tail)
    } else {
        name.to_string()
    }
}

/// Word-level similarity between lowercase keys
fn are_similar(a: &str, b: &str) -> bool {
    let words_a: Vec<&str> = a.split_whitespace().collect();
    let words_b: Vec<&str> = b.split_whitespace().collect();
    let (short, long) = if words_a.len() <= words_b.len() {
        (&words_a, &words_b)
    } else {
        (&words_b, &words_a)
    };

    // "openai" vs "openai inc": one extra qualifier word
    if short.join(" ").chars().count() >= 4
        && long.len() == short.len() + 1
        && short.iter().all(|w| long.contains(w))
    {
        return true;
    }

    // Multi-word entities sharing most of their words
    if short.len() > 1 {
        let common = short.iter().filter(|w| long.contains(w)).count();
        return common as f64 / long.len() as f64 > 0.7;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let mut normalizer = EntityNormalizer::new();

        assert_eq!(normalizer.normalize("  GraphRAG!  "), "GraphRAG");
        assert_eq!(normalizer.normalize("graphrag"), "GraphRAG");
        assert_eq!(EntityNormalizer::clean("Python3"), "Python 3");
        assert_eq!(EntityNormalizer::clean("redes   neurais."), "redes neurais");
        assert_eq!(EntityNormalizer::clean("2024"), "2024");
    }

    #[test]
    fn test_alias_resolution() {
        let mut normalizer = EntityNormalizer::new();

        let n1 = normalizer.normalize("OpenAI");
        let n2 = normalizer.normalize("OpenAI Inc");

        // Should resolve to the same canonical form
        assert_eq!(n1, n2);
        assert_eq!(normalizer.lookup("openai inc."), Some("OpenAI"));
    }

    #[test]
    fn test_distinct_entities_stay_apart() {
        let mut normalizer = EntityNormalizer::new();

        assert_eq!(normalizer.normalize("Rust"), "Rust");
        assert_eq!(normalizer.normalize("Go"), "Go");
        assert_eq!(normalizer.normalize("linguagem de programação"), "linguagem de programação");
    }
}
