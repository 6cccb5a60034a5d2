use anyhow::{Context, Result};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::normalizer::EntityNormalizer;
use crate::schema::Triple;

pub const DEFAULT_NAMESPACE: &str = "http://example.org/";
const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// Directed multigraph of entities with set semantics over triples
pub struct KnowledgeGraph {
    graph: DiGraph<String, String>,
    nodes: HashMap<String, NodeIndex>,
    triples: Vec<Triple>,
    seen: HashSet<Triple>,
    normalizer: EntityNormalizer,
    namespace: String,
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl KnowledgeGraph {
    pub fn new(namespace: &str) -> Self {
        Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            triples: Vec::new(),
            seen: HashSet::new(),
            normalizer: EntityNormalizer::new(),
            namespace: namespace.to_string(),
        }
    }

    /// Normalizes and inserts a triple. Returns false for incomplete or duplicate triples.
    pub fn add_triple(&mut self, triple: &Triple) -> bool {
        if !triple.is_complete() {
            return false;
        }

        let normalized = Triple {
            subject: self.normalizer.normalize(&triple.subject),
            predicate: triple.predicate.trim().replace(char::is_whitespace, "_"),
            object: self.normalizer.normalize(&triple.object),
        };
        if !normalized.is_complete() || !self.seen.insert(normalized.clone()) {
            return false;
        }

        let s = self.node(&normalized.subject);
        let o = self.node(&normalized.object);
        self.graph.add_edge(s, o, normalized.predicate.clone());
        self.triples.push(normalized);
        true
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }

    /// Triples in insertion order
    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn entities(&self) -> Vec<&str> {
        self.graph.node_weights().map(String::as_str).collect()
    }

    pub fn contains_entity(&self, name: &str) -> bool {
        self.normalizer
            .lookup(name)
            .is_some_and(|canonical| self.nodes.contains_key(canonical))
    }

    /// Outgoing (predicate, object) pairs of an entity
    pub fn neighbors(&self, entity: &str) -> Vec<(&str, &str)> {
        let Some(&idx) = self.normalizer.lookup(entity).and_then(|c| self.nodes.get(c)) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| (edge.weight().as_str(), self.graph[edge.target()].as_str()))
            .collect()
    }

    pub fn to_rdf_xml(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        out.push_str("<rdf:RDF\n");
        out.push_str(&format!("   xmlns:ns1=\"{}\"\n", escape_xml(&self.namespace)));
        out.push_str(&format!("   xmlns:rdf=\"{}\"\n", RDF_NS));
        out.push_str(">\n");

        // One Description per subject, subjects in first-seen order
        let mut order: Vec<&str> = Vec::new();
        let mut by_subject: HashMap<&str, Vec<&Triple>> = HashMap::new();
        for triple in &self.triples {
            let entry = by_subject.entry(triple.subject.as_str()).or_default();
            if entry.is_empty() {
                order.push(triple.subject.as_str());
            }
            entry.push(triple);
        }

        for subject in order {
            out.push_str(&format!(
                "  <rdf:Description rdf:about=\"{}\">\n",
                escape_xml(&self.iri(subject))
            ));
            for triple in &by_subject[subject] {
                out.push_str(&format!(
                    "    <ns1:{} rdf:resource=\"{}\"/>\n",
                    xml_name(&triple.predicate),
                    escape_xml(&self.iri(&triple.object))
                ));
            }
            out.push_str("  </rdf:Description>\n");
        }

        out.push_str("</rdf:RDF>\n");
        out
    }

    pub async fn export_rdf(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_rdf_xml())
            .await
            .context(format!("Failed to write RDF graph: {:?}", path))
    }

    fn iri(&self, name: &str) -> String {
        format!("{}{}", self.namespace, name.replace(' ', "%20"))
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Predicate as an XML element local name
fn xml_name(predicate: &str) -> String {
    let mut name: String = predicate
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}
