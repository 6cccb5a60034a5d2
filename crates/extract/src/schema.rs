use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub entity_type: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub source: String,
    pub target: String,
    pub relation: String,
    #[serde(default)]
    pub evidence: String,
}

/// LLM extraction output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl ExtractionResult {
    /// Resolves relation endpoints through entity ids; unknown ids are used verbatim
    pub fn into_triples(self) -> Vec<Triple> {
        let names: HashMap<&str, &str> = self
            .entities
            .iter()
            .map(|e| (e.id.as_str(), e.name.as_str()))
            .collect();

        self.relations
            .iter()
            .map(|r| Triple {
                subject: names.get(r.source.as_str()).copied().unwrap_or(r.source.as_str()).to_string(),
                predicate: r.relation.trim().replace(' ', "_"),
                object: names.get(r.target.as_str()).copied().unwrap_or(r.target.as_str()).to_string(),
            })
            .filter(Triple::is_complete)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.subject.trim().is_empty()
            && !self.predicate.trim().is_empty()
            && !self.object.trim().is_empty()
    }

    /// Plain-text statement, e.g. "Python é_um linguagem"
    pub fn statement(&self) -> String {
        format!("{} {} {}", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_triples_resolves_ids() {
        let json = r#"{
            "entities": [
                {"id": "E1", "name": "Rust", "type": "TECHNOLOGY", "description": ""},
                {"id": "E2", "name": "Mozilla", "type": "ORGANIZATION", "description": ""}
            ],
            "relations": [
                {"source": "E2", "target": "E1", "relation": "created by", "evidence": ""},
                {"source": "E1", "target": "", "relation": "uses", "evidence": ""}
            ]
        }"#;
        let result: ExtractionResult = serde_json::from_str(json).unwrap();
        let triples = result.into_triples();

        assert_eq!(triples, vec![Triple::new("Mozilla", "created_by", "Rust")]);
    }
}
