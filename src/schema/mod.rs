//! Type schemas: declarative descriptions of entity shapes and relations.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tracing::debug;

use crate::json_ld::{Context, ContextTerm};

fn default_vocab() -> String {
    "http://example.org/vocab#".to_string()
}

/// Declarative type definition, usually deserialized from configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct TypeDef {
    pub name: String,
    /// Base IRI for properties without an explicit `iri`.
    #[serde(default = "default_vocab")]
    pub vocab: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDef>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PropertyDef {
    /// Scalar value space ("string", "number", "boolean"). Informational;
    /// nothing at this layer validates values against it.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Explicit vocabulary IRI, overriding `vocab` + property name.
    pub iri: Option<String>,
    /// Target type name. Present iff the property is a relation.
    pub target: Option<String>,
    /// Foreign property on the target holding our id. A relation with a
    /// reverse name is computed by query, never stored on the owner.
    pub reverse: Option<String>,
}

/// Relation metadata for one declared property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    pub target: String,
    pub reverse: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TypeSchema {
    def: Arc<TypeDef>,
}

impl TypeSchema {
    pub fn name(&self) -> &str {
        &self.def.name
    }
    /// Build the type's context, leaving out the named properties. Reverse
    /// relations never appear: keeping them out of the context is what keeps
    /// them off the stored document.
    pub fn context(&self, exclude: &[String]) -> Context {
        let mut context = Context::default();
        for (name, prop) in &self.def.properties {
            if exclude.iter().any(|p| p == name) {
                continue;
            }
            if prop.reverse.is_some() {
                continue;
            }
            let iri = prop
                .iri
                .clone()
                .unwrap_or_else(|| format!("{}{}", self.def.vocab, name));
            context.insert(name, ContextTerm { iri, is_ref: prop.target.is_some() });
        }
        context
    }
    pub fn relation(&self, name: &str) -> Option<Relation> {
        let prop = self.def.properties.get(name)?;
        let target = prop.target.clone()?;
        Some(Relation { target, reverse: prop.reverse.clone() })
    }
    pub fn relations(&self) -> impl Iterator<Item = (&str, Relation)> {
        self.def.properties.iter().filter_map(|(name, prop)| {
            let target = prop.target.clone()?;
            Some((
                name.as_str(),
                Relation { target, reverse: prop.reverse.clone() },
            ))
        })
    }
}

impl From<TypeDef> for TypeSchema {
    fn from(def: TypeDef) -> Self {
        TypeSchema { def: Arc::new(def) }
    }
}

/// Shared registry of type schemas, keyed by type name.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    inner: Arc<RwLock<BTreeMap<String, TypeSchema>>>,
}

impl TypeRegistry {
    pub fn new() -> TypeRegistry {
        TypeRegistry::default()
    }
    pub fn get(&self, name: &str) -> Option<TypeSchema> {
        let types = self.inner.read().expect("type registry lock poisoned");
        types.get(name).cloned()
    }
    /// Idempotent upsert of a schema definition.
    pub fn register(&self, def: TypeDef) -> TypeSchema {
        debug!(name = %def.name, "register type");
        let schema = TypeSchema::from(def);
        let mut types = self.inner.write().expect("type registry lock poisoned");
        types.insert(schema.name().to_owned(), schema.clone());
        schema
    }
}
