use serde_json::{Map, Value};

use crate::error::HarvestError;

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Graph assembly service: maps a canonical JSON document plus a schema URI
/// to a serializable triple graph.
pub trait GraphAssembler: Send + Sync {
    fn assemble(&self, document: &Value, schema_uri: &str) -> Result<Graph, HarvestError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Iri(String),
    Blank(String),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: Node,
    pub predicate: String,
    pub object: Node,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    triples: Vec<Triple>,
}

impl Graph {
    pub fn push(&mut self, subject: Node, predicate: &str, object: Node) {
        self.triples.push(Triple {
            subject,
            predicate: predicate.to_string(),
            object,
        });
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    /// Turtle rendering, one triple per line in insertion order. Insertion
    /// order is deterministic for a given document, so serialized output is
    /// byte-stable across runs.
    pub fn serialize_turtle(&self) -> Vec<u8> {
        let mut out = String::new();
        for triple in &self.triples {
            out.push_str(&render_node(&triple.subject));
            if triple.predicate == RDF_TYPE {
                out.push_str(" a ");
            } else {
                out.push_str(&format!(" <{}> ", triple.predicate));
            }
            out.push_str(&render_node(&triple.object));
            out.push_str(" .\n");
        }
        out.into_bytes()
    }
}

fn render_node(node: &Node) -> String {
    match node {
        Node::Iri(iri) => format!("<{iri}>"),
        Node::Blank(label) => format!("_:{label}"),
        Node::Literal(text) => format!("\"{}\"", escape_literal(text)),
    }
}

fn escape_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Assembles a graph from a canonical document: the subject is the first
/// `identifierInfo` identifier (a blank node when absent), predicates are
/// minted under the schema URI, nested objects become blank nodes and
/// arrays expand to one triple per element.
pub struct JsonLdAssembler;

impl GraphAssembler for JsonLdAssembler {
    fn assemble(&self, document: &Value, schema_uri: &str) -> Result<Graph, HarvestError> {
        let Some(map) = document.as_object() else {
            return Err(HarvestError::MalformedDocument(
                "top-level document is not an object".to_string(),
            ));
        };

        let base = normalize_base(schema_uri);
        let mut graph = Graph::default();
        let mut counter = 0usize;
        let subject = match document
            .pointer("/identifierInfo/0/identifier")
            .and_then(Value::as_str)
        {
            Some(identifier) => Node::Iri(identifier.to_string()),
            None => fresh_blank(&mut counter),
        };
        emit_object(&mut graph, &subject, map, &base, &mut counter);
        Ok(graph)
    }
}

fn normalize_base(schema_uri: &str) -> String {
    if schema_uri.ends_with('/') || schema_uri.ends_with('#') {
        schema_uri.to_string()
    } else {
        format!("{schema_uri}#")
    }
}

fn fresh_blank(counter: &mut usize) -> Node {
    let node = Node::Blank(format!("b{counter}"));
    *counter += 1;
    node
}

fn emit_object(
    graph: &mut Graph,
    subject: &Node,
    map: &Map<String, Value>,
    base: &str,
    counter: &mut usize,
) {
    for (key, value) in map {
        if key == "@type" {
            if let Some(kind) = value.as_str() {
                graph.push(subject.clone(), RDF_TYPE, Node::Iri(format!("{base}{kind}")));
            }
            continue;
        }
        let predicate = format!("{base}{key}");
        emit_value(graph, subject, &predicate, value, base, counter);
    }
}

fn emit_value(
    graph: &mut Graph,
    subject: &Node,
    predicate: &str,
    value: &Value,
    base: &str,
    counter: &mut usize,
) {
    match value {
        Value::Null => {}
        Value::String(text) => {
            graph.push(subject.clone(), predicate, Node::Literal(text.clone()));
        }
        Value::Bool(flag) => {
            graph.push(subject.clone(), predicate, Node::Literal(flag.to_string()));
        }
        Value::Number(number) => {
            graph.push(
                subject.clone(),
                predicate,
                Node::Literal(number.to_string()),
            );
        }
        Value::Array(items) => {
            for item in items {
                emit_value(graph, subject, predicate, item, base, counter);
            }
        }
        Value::Object(nested) => {
            let node = fresh_blank(counter);
            graph.push(subject.clone(), predicate, node.clone());
            emit_object(graph, &node, nested, base, counter);
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    const SCHEMA: &str = "https://schema.example.org/dats";

    #[test]
    fn subject_comes_from_identifier_info() {
        let document = json!({
            "@type": "Study",
            "identifierInfo": [{"identifier": "https://identifiers.org/dbgap/phs000774.v1.p1"}],
            "title": "CIDR: Pancreatic Cancer",
        });
        let graph = JsonLdAssembler.assemble(&document, SCHEMA).unwrap();
        let turtle = String::from_utf8(graph.serialize_turtle()).unwrap();
        assert!(turtle.contains(
            "<https://identifiers.org/dbgap/phs000774.v1.p1> a <https://schema.example.org/dats#Study> ."
        ));
        assert!(turtle.contains(
            "<https://schema.example.org/dats#title> \"CIDR: Pancreatic Cancer\" ."
        ));
    }

    #[test]
    fn arrays_expand_and_objects_become_blank_nodes() {
        let document = json!({
            "tags": ["a", "b"],
            "nested": {"inner": "x"},
        });
        let graph = JsonLdAssembler.assemble(&document, SCHEMA).unwrap();
        let turtle = String::from_utf8(graph.serialize_turtle()).unwrap();
        assert!(turtle.contains("\"a\""));
        assert!(turtle.contains("\"b\""));
        assert!(turtle.contains("_:b1"));
        assert!(turtle.contains("<https://schema.example.org/dats#inner> \"x\""));
    }

    #[test]
    fn literals_are_escaped() {
        let document = json!({"note": "line\nwith \"quotes\" and \\slash"});
        let graph = JsonLdAssembler.assemble(&document, SCHEMA).unwrap();
        let turtle = String::from_utf8(graph.serialize_turtle()).unwrap();
        assert!(turtle.contains(r#""line\nwith \"quotes\" and \\slash""#));
    }

    #[test]
    fn non_object_document_is_rejected() {
        let err = JsonLdAssembler.assemble(&json!([1, 2]), SCHEMA).unwrap_err();
        assert_matches!(err, HarvestError::MalformedDocument(_));
    }

    #[test]
    fn trailing_hash_or_slash_is_preserved() {
        assert_eq!(normalize_base("http://x/ns#"), "http://x/ns#");
        assert_eq!(normalize_base("http://x/ns/"), "http://x/ns/");
        assert_eq!(normalize_base("http://x/ns"), "http://x/ns#");
    }
}
