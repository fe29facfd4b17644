//! In-memory triple store, the crate's reference [`TripleStore`].

use std::sync::RwLock;

use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;
use serde_json::map::Entry;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::json_ld::{CONTEXT, Context, Document, ID, RDF_TYPE, TYPE, decode_object, encode_object};
use crate::query::{Pattern, TriplePattern};
use crate::store::{Binding, TripleStore};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Triple {
    subject: String,
    predicate: String,
    object: String,
}

/// A naive triple store held behind a `RwLock`. Good enough for tests and
/// single-process embedding; it makes no attempt at indexing.
#[derive(Default)]
pub struct MemoryStore {
    triples: RwLock<Vec<Triple>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.triples.read().expect("triple store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand a document into triples using its own `@context`. Properties
    /// without a term definition are not stored.
    fn expand(doc: &Document<'_>) -> Result<Vec<Triple>> {
        let subject = doc.id().context("document has no @id")?;
        let context = match doc.context() {
            Some(value) => Context::try_from(value)?,
            None => Context::default(),
        };
        let mut triples = vec![];
        let map = doc
            .as_ref()
            .as_object()
            .context("document is not a JSON object")?;
        for (name, value) in map {
            if name == ID || name == CONTEXT {
                continue;
            }
            if name == TYPE {
                for ty in values_of(value) {
                    let ty = ty
                        .as_str()
                        .with_context(|| format!("type tag {ty} is not a string"))?;
                    triples.push(Triple {
                        subject: subject.to_owned(),
                        predicate: RDF_TYPE.to_owned(),
                        object: ty.to_owned(),
                    });
                }
                continue;
            }
            let Some(term) = context.get_term(name) else {
                debug!(property = name, "skipping property without context term");
                continue;
            };
            for value in values_of(value) {
                let object = if term.is_ref {
                    // relation targets are stored as bare identifiers, even
                    // when the caller passed an embedded node
                    reference_id(value)
                        .with_context(|| format!("relation {name} has no identifier"))?
                } else {
                    encode_object(value)?
                };
                triples.push(Triple {
                    subject: subject.to_owned(),
                    predicate: term.iri.clone(),
                    object,
                });
            }
        }
        Ok(triples)
    }
}

fn values_of(value: &JsonValue) -> impl Iterator<Item = &JsonValue> {
    match value {
        JsonValue::Array(values) => values.iter(),
        other => std::slice::from_ref(other).iter(),
    }
}

fn reference_id(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(id) => Some(id.clone()),
        JsonValue::Object(map) => map.get(ID).and_then(JsonValue::as_str).map(str::to_owned),
        _ => None,
    }
}

fn match_pattern(pattern: &Pattern, term: &str, binding: &Binding) -> Option<Option<(String, String)>> {
    match pattern {
        Pattern::Term(expected) => (expected == term).then_some(None),
        Pattern::Var(name) => match binding.get(name) {
            Some(bound) => (bound == term).then_some(None),
            None => Some(Some((name.clone(), term.to_owned()))),
        },
    }
}

fn match_triple(pattern: &TriplePattern, triple: &Triple, binding: &Binding) -> Option<Binding> {
    let mut extended = binding.clone();
    for (position, term) in [
        (&pattern.subject, triple.subject.as_str()),
        (&pattern.predicate, triple.predicate.as_str()),
        (&pattern.object, triple.object.as_str()),
    ] {
        match match_pattern(position, term, &extended)? {
            Some((name, value)) => {
                extended.insert(name, value);
            }
            None => {}
        }
    }
    Some(extended)
}

#[async_trait]
impl TripleStore for MemoryStore {
    async fn put_document(&self, doc: &Document<'_>) -> Result<()> {
        let new = Self::expand(doc)?;
        let subject = doc.id().context("document has no @id")?;
        let mut triples = self.triples.write().expect("triple store lock poisoned");
        triples.retain(|t| t.subject != subject);
        triples.extend(new);
        Ok(())
    }

    async fn get_document(&self, id: &str, context: &Context) -> Result<Vec<Document<'static>>> {
        let triples = self.triples.read().expect("triple store lock poisoned");
        let mut map = Map::new();
        let mut types = vec![];
        let mut found = false;
        for triple in triples.iter().filter(|t| t.subject == id) {
            found = true;
            if triple.predicate == RDF_TYPE {
                types.push(JsonValue::String(triple.object.clone()));
                continue;
            }
            // the context narrows which properties come back
            let Some((name, term)) = context.term_for_iri(&triple.predicate) else {
                continue;
            };
            let value = if term.is_ref {
                JsonValue::String(triple.object.clone())
            } else {
                decode_object(&triple.object)
            };
            match map.entry(name.to_owned()) {
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
                Entry::Occupied(mut entry) => match entry.get_mut() {
                    JsonValue::Array(values) => values.push(value),
                    existing => {
                        let first = existing.take();
                        *existing = JsonValue::Array(vec![first, value]);
                    }
                },
            }
        }
        if !found {
            return Ok(vec![]);
        }
        map.insert(ID.to_owned(), JsonValue::String(id.to_owned()));
        match types.len() {
            0 => {}
            1 => {
                map.insert(TYPE.to_owned(), types.remove(0));
            }
            _ => {
                map.insert(TYPE.to_owned(), JsonValue::Array(types));
            }
        }
        Ok(vec![Document::from(JsonValue::Object(map))])
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        let mut triples = self.triples.write().expect("triple store lock poisoned");
        triples.retain(|t| t.subject != id);
        Ok(())
    }

    async fn run_query(&self, patterns: &[TriplePattern]) -> Result<Vec<Binding>> {
        let triples = self.triples.read().expect("triple store lock poisoned");
        let mut bindings = vec![Binding::new()];
        for pattern in patterns {
            let mut next = vec![];
            for binding in &bindings {
                for triple in triples.iter() {
                    if let Some(extended) = match_triple(pattern, triple, binding) {
                        next.push(extended);
                    }
                }
            }
            bindings = next;
        }
        Ok(bindings)
    }
}
