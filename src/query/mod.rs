//! Translation of structured property-value queries into triple patterns.

use anyhow::{Context as AnyhowContext, Result};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::json_ld::{CONTEXT, Context, ContextTerm, ID, RDF_TYPE, TYPE, encode_object};

/// One position of a triple pattern: either a concrete term or an unbound
/// variable to be filled in by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Var(String),
    Term(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: Pattern,
    pub predicate: Pattern,
    pub object: Pattern,
}

/// Translate a property-value query into store-native triple patterns.
///
/// Property names resolve through `context`; an unresolvable name is a
/// caller configuration error. A query without an explicit `@id` binds the
/// subject to the implicit `@id` variable so that it matches all subjects.
/// String values with a leading `?` are unbound variables, not literals.
pub fn translate(query: &Map<String, JsonValue>, context: &Context) -> Result<Vec<TriplePattern>> {
    let subject = match query.get(ID).and_then(JsonValue::as_str) {
        Some(id) => Pattern::Term(id.to_owned()),
        None => Pattern::Var(ID.to_owned()),
    };
    let mut patterns = vec![];
    for (name, value) in query {
        if name == ID || name == CONTEXT {
            continue;
        }
        if name == TYPE {
            for ty in values_of(value) {
                let ty = ty
                    .as_str()
                    .with_context(|| format!("type filter {ty} is not a string"))?;
                patterns.push(TriplePattern {
                    subject: subject.clone(),
                    predicate: Pattern::Term(RDF_TYPE.to_owned()),
                    object: Pattern::Term(ty.to_owned()),
                });
            }
            continue;
        }
        let term = context
            .get_term(name)
            .with_context(|| format!("cannot expand query property {name}"))?;
        for value in values_of(value) {
            patterns.push(TriplePattern {
                subject: subject.clone(),
                predicate: Pattern::Term(term.iri.clone()),
                object: object_pattern(value, term)?,
            });
        }
    }
    debug!(patterns = patterns.len(), "translated query");
    Ok(patterns)
}

fn values_of(value: &JsonValue) -> impl Iterator<Item = &JsonValue> {
    match value {
        JsonValue::Array(values) => values.iter(),
        other => std::slice::from_ref(other).iter(),
    }
}

fn object_pattern(value: &JsonValue, term: &ContextTerm) -> Result<Pattern> {
    if let Some(s) = value.as_str() {
        if let Some(var) = s.strip_prefix('?') {
            return Ok(Pattern::Var(var.to_owned()));
        }
        if term.is_ref {
            // reference terms hold identifiers, not literals
            return Ok(Pattern::Term(s.to_owned()));
        }
    }
    Ok(Pattern::Term(encode_object(value)?))
}
