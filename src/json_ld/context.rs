use std::collections::BTreeMap;

use anyhow::{Context as AnyhowContext, Result, bail};
use serde_json::{Map, Value as JsonValue, json};

use super::{ID, TYPE};

/// Mapping from local property names to vocabulary terms. Attached to
/// documents on read as their `@context`, and consulted when translating
/// queries and expanding documents into triples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    term_map: BTreeMap<String, ContextTerm>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextTerm {
    pub iri: String,
    /// A reference term holds the identifier of another entity, not a
    /// literal (`"@type": "@id"` in JSON-LD).
    pub is_ref: bool,
}

impl Context {
    pub fn insert(&mut self, term: &str, definition: ContextTerm) {
        self.term_map.insert(term.to_owned(), definition);
    }
    pub fn has_term(&self, term: &str) -> bool {
        self.get_term(term).is_some()
    }
    pub fn get_term(&self, term: &str) -> Option<&ContextTerm> {
        self.term_map.get(term)
    }
    /// Inverse lookup, used when reassembling a document from triples.
    pub fn term_for_iri(&self, iri: &str) -> Option<(&str, &ContextTerm)> {
        self.term_map
            .iter()
            .find(|(_, term)| term.iri == iri)
            .map(|(name, term)| (name.as_str(), term))
    }
    /// Render as a JSON-LD `@context` value.
    pub fn to_value(&self) -> JsonValue {
        let mut map = Map::new();
        for (name, term) in &self.term_map {
            if term.is_ref {
                map.insert(name.clone(), json!({ ID: term.iri, TYPE: ID }));
            } else {
                map.insert(name.clone(), JsonValue::String(term.iri.clone()));
            }
        }
        JsonValue::Object(map)
    }
}

impl TryFrom<&JsonValue> for Context {
    type Error = anyhow::Error;

    /// Convert a node's `@context` value into an active context.
    ///
    /// Note - only local context objects are processed, just enough to map
    /// term definitions produced by [`Context::to_value`]. Remote context
    /// fetching will never be implemented here.
    fn try_from(value: &JsonValue) -> Result<Context> {
        let node = value
            .as_object()
            .context("@context should be a local JSON object")?;
        let mut result = Context::default();
        for (name, definition) in node {
            if name.starts_with('@') {
                continue;
            }
            match definition {
                JsonValue::String(iri) => {
                    result.insert(name, ContextTerm { iri: iri.clone(), is_ref: false });
                }
                JsonValue::Object(map) => {
                    let iri = map
                        .get(ID)
                        .and_then(JsonValue::as_str)
                        .with_context(|| format!("term {name} has no @id"))?;
                    let is_ref = map.get(TYPE).and_then(JsonValue::as_str) == Some(ID);
                    result.insert(name, ContextTerm { iri: iri.to_owned(), is_ref });
                }
                _ => {
                    bail!("invalid term definition for {name} (not a string or map)");
                }
            }
        }
        Ok(result)
    }
}
