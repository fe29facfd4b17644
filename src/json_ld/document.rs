//! Storage friendly presentation of a linked-data entity.

use std::borrow::Cow;
use std::fmt::Display;

use serde_json::{Map, Value, json};

use super::{CONTEXT, ID, TYPE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document<'a>(Cow<'a, Value>);

impl Document<'_> {
    /// Coerce heterogeneous call input into a document: a bare string is an
    /// identifier, anything else is taken over as-is. Total over any input;
    /// the caller's value is consumed, so later mutation on either side
    /// cannot leak through.
    pub fn normalize(input: Value) -> Document<'static> {
        match input {
            Value::String(id) => Document(Cow::Owned(json!({ ID: id }))),
            other => Document::from(other),
        }
    }
    pub fn id(&self) -> Option<&str> {
        self.get_str(ID).or_else(|| self.get_str("id"))
    }
    pub fn type_is(&self, ty: &str) -> bool {
        for prop in ["type", TYPE] {
            if let Some(Value::String(document_type)) = self.0.get(prop) {
                return document_type == ty;
            }
            if let Some(Value::Array(type_array)) = self.0.get(prop) {
                return type_array.iter().any(|v| {
                    if let Some(s) = v.as_str() {
                        s == ty
                    } else {
                        false
                    }
                });
            }
        }
        false
    }
    pub fn has_prop(&self, prop: &str) -> bool {
        if let Some(map) = self.0.as_object() {
            return map.contains_key(prop);
        }
        false
    }
    pub fn get_str(&self, prop: &str) -> Option<&str> {
        self.0.get(prop).and_then(Value::as_str)
    }
    pub fn get_value(&self, prop: &str) -> Option<Value> {
        self.0.get(prop).cloned()
    }
    pub fn into_owned(self) -> Document<'static> {
        Document(Cow::Owned(self.0.into_owned()))
    }
    pub fn to_value(&self) -> Value {
        self.0.clone().into_owned()
    }
    pub fn context(&self) -> Option<&Value> {
        self.0.get(CONTEXT)
    }
    pub fn with_context(self, context: Value) -> Document<'static> {
        self.replace(CONTEXT, context)
    }
    pub fn ensure_id(self, id: impl Into<String>) -> Document<'static> {
        let mut doc = self.0.into_owned();
        let doc_map = doc.as_object_mut().unwrap();
        // either spelling counts as an identifier, matching Document::id
        if !doc_map.contains_key(ID) && !doc_map.contains_key("id") {
            doc_map.insert(ID.to_string(), Value::String(id.into()));
        }
        Document(Cow::Owned(doc))
    }
    /// Stamp the owning type onto the type tag, merging with any tag already
    /// present rather than overwriting. Idempotent.
    pub fn ensure_type(self, type_name: &str) -> Document<'static> {
        let mut doc = self.0.into_owned();
        let doc_map = doc.as_object_mut().unwrap();
        match doc_map.get(TYPE).cloned() {
            None => {
                doc_map.insert(TYPE.to_string(), Value::String(type_name.to_owned()));
            }
            Some(Value::String(existing)) => {
                if existing != type_name {
                    doc_map.insert(TYPE.to_string(), json!([existing, type_name]));
                }
            }
            Some(Value::Array(mut types)) => {
                if !types.iter().any(|v| v.as_str() == Some(type_name)) {
                    types.push(Value::String(type_name.to_owned()));
                    doc_map.insert(TYPE.to_string(), Value::Array(types));
                }
            }
            Some(_) => {}
        }
        Document(Cow::Owned(doc))
    }
    pub fn replace(self, property: &str, value: Value) -> Document<'static> {
        let mut doc = self.0.into_owned();
        let doc_map = doc.as_object_mut().unwrap();
        doc_map.insert(property.to_string(), value);
        Document(Cow::Owned(doc))
    }
}

impl From<Value> for Document<'static> {
    fn from(value: Value) -> Self {
        if !value.is_object() {
            // XXX: it is an error to create a Document from anything but a
            // JSON object. It should be validated by upper layers. In case
            // some slip through, we will just replace them with an empty
            // object.
            Document(Cow::Owned(Value::Object(Map::new())))
        } else {
            Document(Cow::Owned(value))
        }
    }
}

impl<'a> From<&'a Value> for Document<'a> {
    fn from(value: &'a Value) -> Self {
        if !value.is_object() {
            Document(Cow::Owned(Value::Object(Map::new())))
        } else {
            Document(Cow::Borrowed(value))
        }
    }
}

impl From<Document<'_>> for Value {
    fn from(value: Document) -> Self {
        value.0.into_owned()
    }
}

impl AsRef<Value> for Document<'_> {
    fn as_ref(&self) -> &Value {
        &self.0
    }
}

impl Display for Document<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
