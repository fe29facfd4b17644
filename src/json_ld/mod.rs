//! Just enough JSON-LD for a triple-backed object mapper.

use anyhow::{Result, bail};
use serde_json::{Value as JsonValue, json};

mod context;
mod document;

pub use context::{Context, ContextTerm};
pub use document::Document;

pub(crate) const ID: &str = "@id";
pub(crate) const TYPE: &str = "@type";
pub(crate) const CONTEXT: &str = "@context";
pub(crate) const VALUE: &str = "@value";
pub(crate) const LANGUAGE: &str = "@language";

pub(crate) const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub(crate) const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub(crate) const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub(crate) const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub(crate) const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";

/// Encode a JSON value as an RDF object term.
///
/// Literals are double quoted. A plain string keeps no datatype suffix, other
/// XSD literals carry `^^<datatype>`, and a language-tagged string (expressed
/// as an `{"@value": .., "@language": ..}` node) carries `@lang` instead.
pub fn encode_object(value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::String(s) => Ok(format!("\"{s}\"")),
        JsonValue::Bool(b) => Ok(format!("\"{b}\"^^<{XSD_BOOLEAN}>")),
        JsonValue::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Ok(format!("\"{n}\"^^<{XSD_INTEGER}>"))
            } else {
                Ok(format!("\"{n}\"^^<{XSD_DOUBLE}>"))
            }
        }
        JsonValue::Object(map) => {
            let Some(JsonValue::String(text)) = map.get(VALUE) else {
                bail!("value node is missing a string @value");
            };
            if let Some(JsonValue::String(lang)) = map.get(LANGUAGE) {
                return Ok(format!("\"{text}\"@{lang}"));
            }
            match map.get(TYPE) {
                Some(JsonValue::String(datatype)) if datatype != XSD_STRING => {
                    Ok(format!("\"{text}\"^^<{datatype}>"))
                }
                _ => Ok(format!("\"{text}\"")),
            }
        }
        other => bail!("cannot encode {other} as an RDF term"),
    }
}

/// Decode an RDF object term back into a JSON value. Unquoted terms are IRIs
/// or bare identifiers and pass through as strings.
pub fn decode_object(term: &str) -> JsonValue {
    let Some(rest) = term.strip_prefix('"') else {
        return JsonValue::String(term.to_owned());
    };
    let Some(close) = rest.rfind('"') else {
        return JsonValue::String(term.to_owned());
    };
    let text = &rest[..close];
    let suffix = &rest[close + 1..];
    if suffix.is_empty() {
        return JsonValue::String(text.to_owned());
    }
    if let Some(lang) = suffix.strip_prefix('@') {
        return json!({ VALUE: text, LANGUAGE: lang });
    }
    if let Some(datatype) = suffix.strip_prefix("^^<").and_then(|s| s.strip_suffix('>')) {
        return match datatype {
            XSD_BOOLEAN => match text.parse::<bool>() {
                Ok(b) => JsonValue::Bool(b),
                Err(_) => JsonValue::String(text.to_owned()),
            },
            XSD_INTEGER => match text.parse::<i64>() {
                Ok(n) => JsonValue::Number(n.into()),
                Err(_) => JsonValue::String(text.to_owned()),
            },
            XSD_DOUBLE => match text.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Some(n) => JsonValue::Number(n),
                None => JsonValue::String(text.to_owned()),
            },
            _ => json!({ VALUE: text, TYPE: datatype }),
        };
    }
    JsonValue::String(term.to_owned())
}
