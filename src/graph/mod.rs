//! The graph mapper: type-bound CRUD with relation resolution.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result, bail};
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use serde_json::{Map, Value as JsonValue, json};
use tracing::debug;
use uuid::Uuid;

use crate::json_ld::{Document, ID, TYPE};
use crate::query;
use crate::schema::{Relation, TypeDef, TypeRegistry, TypeSchema};
use crate::store::TripleStore;

mod registry;

pub use registry::Registry;

/// Hard bound on nested relation expansion. Mutually including relations
/// would otherwise recurse without limit; past this depth the whole
/// operation fails.
pub const MAX_INCLUDE_DEPTH: usize = 8;

/// Per-call parameters shared by `find` and `get`.
#[derive(Clone, Debug, Default)]
pub struct Params {
    /// Property-value query (`find` only).
    pub query: Map<String, JsonValue>,
    /// Relation properties to resolve into full representations.
    pub include: Vec<String>,
    /// Properties to drop before the store fetch.
    pub exclude: Vec<String>,
}

/// The owning type, either by name (looked up in the type registry) or as a
/// full definition (registered on construction).
pub enum TypeRef {
    Name(String),
    Def(TypeDef),
}

pub struct GraphOptions {
    pub name: String,
    pub store: Arc<dyn TripleStore>,
    pub types: TypeRegistry,
    pub kind: TypeRef,
    pub registry: Option<Registry>,
}

/// A mapper bound to one type and one store connection. Cheap to clone; the
/// store is shared by reference across all graphs.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    schema: TypeSchema,
    store: Arc<dyn TripleStore>,
    registry: Option<Registry>,
}

fn uuidgen() -> String {
    Uuid::now_v7().to_string()
}

impl Graph {
    pub fn new(options: GraphOptions) -> Result<Graph> {
        let GraphOptions { name, store, types, kind, registry } = options;
        let schema = match kind {
            TypeRef::Name(type_name) => types
                .get(&type_name)
                .with_context(|| format!("unknown type {type_name}"))?,
            TypeRef::Def(def) => types.register(def),
        };
        debug!(name = %name, type_name = %schema.name(), "new graph");
        let graph = Graph {
            inner: Arc::new(Inner { name, schema, store, registry }),
        };
        if let Some(registry) = &graph.inner.registry {
            registry.set(graph.inner.schema.name(), graph.clone());
        }
        Ok(graph)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn type_name(&self) -> &str {
        self.inner.schema.name()
    }

    /// Query for documents of this graph's type. A query without an explicit
    /// type filter still only matches this type. No matches is an empty
    /// sequence, never an error; result order follows the store's match
    /// order.
    pub async fn find(&self, params: &Params) -> Result<Vec<Document<'static>>> {
        self.find_at(params, 0).await
    }

    /// Fetch one document by id (`data` is a bare identifier or a document
    /// carrying one). Declared relations come back as `{"@id": ..}` stubs
    /// unless named in `params.include`, in which case they are resolved
    /// into full representations. An absent id resolves to `None`.
    pub async fn get(&self, data: JsonValue, params: &Params) -> Result<Option<Document<'static>>> {
        let doc = Document::normalize(data);
        let id = doc.id().context("get requires an @id")?;
        self.get_at(id, params, 0).await
    }

    /// Upsert a document, minting an id and stamping the owning type when
    /// absent. Embedded relation targets are stored as bare identifiers,
    /// never recursively created.
    pub async fn create(&self, data: JsonValue, _params: &Params) -> Result<Document<'static>> {
        let doc = Document::normalize(data)
            .ensure_id(uuidgen())
            .ensure_type(self.inner.schema.name())
            .with_context(self.inner.schema.context(&[]).to_value());
        debug!(name = %self.inner.name, id = ?doc.id(), "create");
        self.inner.store.put_document(&doc).await?;
        Ok(doc)
    }

    /// Same contract as [`Graph::create`]: a whole-document upsert. A
    /// partial document overwrites whatever was stored under the same id;
    /// there is no field-merge patch semantics.
    pub async fn update(&self, data: JsonValue, params: &Params) -> Result<Document<'static>> {
        debug!(name = %self.inner.name, "update");
        self.create(data, params).await
    }

    /// Delete by id. Succeeds whether or not the id existed.
    pub async fn remove(&self, data: JsonValue, _params: &Params) -> Result<()> {
        let doc = Document::normalize(data);
        let id = doc.id().context("remove requires an @id")?;
        debug!(name = %self.inner.name, id, "remove");
        self.inner.store.delete_document(id).await?;
        Ok(())
    }

    fn find_at<'a>(
        &'a self,
        params: &'a Params,
        depth: usize,
    ) -> BoxFuture<'a, Result<Vec<Document<'static>>>> {
        async move {
            let mut query = params.query.clone();
            if !query.contains_key(TYPE) {
                query.insert(
                    TYPE.to_owned(),
                    JsonValue::String(self.inner.schema.name().to_owned()),
                );
            }
            let context = self.inner.schema.context(&params.exclude);
            let patterns = query::translate(&query, &context)?;
            let bindings = self.inner.store.run_query(&patterns).await?;
            debug!(name = %self.inner.name, matches = bindings.len(), "find");

            // one id per distinct subject, in match order
            let explicit = query.get(ID).and_then(JsonValue::as_str);
            let mut seen = BTreeSet::new();
            let mut ids = vec![];
            for binding in &bindings {
                let Some(id) = binding.get(ID).map(String::as_str).or(explicit) else {
                    continue;
                };
                if seen.insert(id.to_owned()) {
                    ids.push(id.to_owned());
                }
            }

            let gets = ids.iter().map(|id| self.get_at(id, params, depth));
            let docs = try_join_all(gets).await?;
            Ok(docs.into_iter().flatten().collect())
        }
        .boxed()
    }

    fn get_at<'a>(
        &'a self,
        id: &'a str,
        params: &'a Params,
        depth: usize,
    ) -> BoxFuture<'a, Result<Option<Document<'static>>>> {
        async move {
            if depth > MAX_INCLUDE_DEPTH {
                bail!("relation expansion exceeded depth {MAX_INCLUDE_DEPTH} at {id}");
            }
            // excluded properties never reach the store fetch
            let context = self.inner.schema.context(&params.exclude);
            let results = self.inner.store.get_document(id, &context).await?;
            // a single subject may come back as a one-element container
            let Some(doc) = results.into_iter().next() else {
                return Ok(None);
            };
            let mut doc = doc.into_owned();

            // stored identifiers become reference stubs, so callers can tell
            // an unexpanded relation from an absent one. Forward relations
            // are never expanded, so the stub is their final representation
            // whether or not they were asked for.
            for (name, relation) in self.inner.schema.relations() {
                if relation.reverse.is_some() {
                    continue;
                }
                match doc.get_value(name) {
                    Some(JsonValue::String(target_id)) => {
                        doc = doc.replace(name, json!({ ID: target_id }));
                    }
                    Some(JsonValue::Array(targets)) => {
                        let stubs = targets
                            .into_iter()
                            .map(|target| match target {
                                JsonValue::String(target_id) => json!({ ID: target_id }),
                                other => other,
                            })
                            .collect();
                        doc = doc.replace(name, JsonValue::Array(stubs));
                    }
                    _ => {}
                }
            }

            // resolve included relations concurrently; the first failure
            // aborts the whole get
            let mut names = vec![];
            let mut lookups = vec![];
            for name in &params.include {
                let Some(relation) = self.inner.schema.relation(name) else {
                    continue;
                };
                names.push(name.as_str());
                lookups.push(self.relation(id, name, relation, params, depth));
            }
            let resolved = try_join_all(lookups).await?;
            for (name, related) in names.into_iter().zip(resolved) {
                if let Some(related) = related {
                    let values = related.into_iter().map(JsonValue::from).collect();
                    doc = doc.replace(name, JsonValue::Array(values));
                }
            }

            Ok(Some(doc.with_context(context.to_value())))
        }
        .boxed()
    }

    /// Resolve one declared relation for the document `id`. Only reverse
    /// relations are computed, by querying the target type's graph for
    /// documents whose foreign property holds our id; a forward relation
    /// yields `None` and its reference stub stands.
    async fn relation(
        &self,
        id: &str,
        name: &str,
        relation: Relation,
        params: &Params,
        depth: usize,
    ) -> Result<Option<Vec<Document<'static>>>> {
        let Some(reverse) = relation.reverse else {
            return Ok(None);
        };
        let registry = self
            .inner
            .registry
            .as_ref()
            .with_context(|| format!("no graph registry to resolve relation {name}"))?;
        let target = registry.get(&relation.target).with_context(|| {
            format!("no graph registered for type {}", relation.target)
        })?;
        debug!(name = %self.inner.name, relation = name, target = %relation.target, "resolve relation");
        let mut query = Map::new();
        query.insert(reverse, JsonValue::String(id.to_owned()));
        let nested = Params {
            query,
            include: params.include.clone(),
            exclude: vec![],
        };
        let docs = target.find_at(&nested, depth + 1).await?;
        Ok(Some(docs))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use serde_json::json;

    use crate::schema::{TypeDef, TypeRegistry};
    use crate::store::TripleStore;
    use crate::store::memory::MemoryStore;

    use super::{Graph, GraphOptions, Params, Registry, TypeRef};

    fn type_def(value: serde_json::Value) -> TypeDef {
        serde_json::from_value(value).unwrap()
    }

    fn person_def() -> TypeDef {
        type_def(json!({
            "name": "Person",
            "properties": {
                "name": { "type": "string" },
                "nickname": { "type": "string" },
                "resources": { "target": "Resource", "reverse": "owner" },
            },
        }))
    }

    fn resource_def() -> TypeDef {
        type_def(json!({
            "name": "Resource",
            "properties": {
                "name": { "type": "string" },
                "owner": { "target": "Person" },
            },
        }))
    }

    fn graph_pair() -> Result<(Graph, Graph)> {
        let store: Arc<dyn TripleStore> = Arc::new(MemoryStore::new());
        let types = TypeRegistry::new();
        let registry = Registry::new();
        let people = Graph::new(GraphOptions {
            name: "people".into(),
            store: store.clone(),
            types: types.clone(),
            kind: TypeRef::Def(person_def()),
            registry: Some(registry.clone()),
        })?;
        let resources = Graph::new(GraphOptions {
            name: "resources".into(),
            store,
            types,
            kind: TypeRef::Def(resource_def()),
            registry: Some(registry),
        })?;
        Ok((people, resources))
    }

    #[tokio::test]
    async fn create_stamps_the_owning_type() -> Result<()> {
        let (people, _) = graph_pair()?;
        let created = people.create(json!({ "name": "Mikey" }), &Params::default()).await?;
        let id = created.id().unwrap().to_owned();
        let fetched = people.get(json!(id), &Params::default()).await?.unwrap();
        assert!(fetched.type_is("Person"));
        Ok(())
    }

    #[tokio::test]
    async fn create_keeps_a_plain_spelled_identifier() -> Result<()> {
        let (people, _) = graph_pair()?;
        let created = people
            .create(json!({ "id": "people/mikey", "name": "Mikey" }), &Params::default())
            .await?;
        assert_eq!(created.id(), Some("people/mikey"));
        let fetched = people.get(json!("people/mikey"), &Params::default()).await?;
        assert_eq!(fetched.unwrap().get_str("name"), Some("Mikey"));
        Ok(())
    }

    #[tokio::test]
    async fn get_missing_id_is_none() -> Result<()> {
        let (people, _) = graph_pair()?;
        let fetched = people.get(json!("people/none"), &Params::default()).await?;
        assert!(fetched.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn remove_then_get_is_none() -> Result<()> {
        let (people, _) = graph_pair()?;
        let created = people.create(json!({ "name": "Mikey" }), &Params::default()).await?;
        let id = created.id().unwrap().to_owned();
        people.remove(json!(id.clone()), &Params::default()).await?;
        assert!(people.get(json!(id), &Params::default()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn remove_of_missing_id_succeeds() -> Result<()> {
        let (people, _) = graph_pair()?;
        people.remove(json!("people/none"), &Params::default()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn find_returns_only_the_owning_type() -> Result<()> {
        let (people, resources) = graph_pair()?;
        people.create(json!({ "name": "Mikey" }), &Params::default()).await?;
        resources.create(json!({ "name": "Widget" }), &Params::default()).await?;
        let found = people.find(&Params::default()).await?;
        assert_eq!(found.len(), 1);
        assert!(found[0].type_is("Person"));
        Ok(())
    }

    #[tokio::test]
    async fn find_by_property_value() -> Result<()> {
        let (people, _) = graph_pair()?;
        people.create(json!({ "name": "Mikey" }), &Params::default()).await?;
        people.create(json!({ "name": "Erin" }), &Params::default()).await?;
        let params = Params {
            query: json!({ "name": "Mikey" }).as_object().unwrap().clone(),
            ..Params::default()
        };
        let found = people.find(&params).await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("name"), Some("Mikey"));
        Ok(())
    }

    #[tokio::test]
    async fn find_without_matches_is_empty() -> Result<()> {
        let (people, _) = graph_pair()?;
        let found = people.find(&Params::default()).await?;
        assert!(found.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn reverse_relation_resolves_owned_collection() -> Result<()> {
        let (people, resources) = graph_pair()?;
        let mikey = people.create(json!({ "name": "Mikey" }), &Params::default()).await?;
        let id = mikey.id().unwrap().to_owned();
        resources
            .create(json!({ "name": "Widget", "owner": id.clone() }), &Params::default())
            .await?;
        let params = Params { include: vec!["resources".into()], ..Params::default() };
        let fetched = people.get(json!(id.clone()), &params).await?.unwrap();
        let related = fetched.get_value("resources").unwrap();
        let related = related.as_array().unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].get("name"), Some(&json!("Widget")));
        assert_eq!(related[0].get("owner"), Some(&json!({ "@id": id })));
        Ok(())
    }

    #[tokio::test]
    async fn unincluded_forward_relation_is_a_stub() -> Result<()> {
        let (people, resources) = graph_pair()?;
        let mikey = people.create(json!({ "name": "Mikey" }), &Params::default()).await?;
        let id = mikey.id().unwrap().to_owned();
        let widget = resources
            .create(json!({ "name": "Widget", "owner": id.clone() }), &Params::default())
            .await?;
        let fetched = resources
            .get(json!(widget.id().unwrap()), &Params::default())
            .await?
            .unwrap();
        assert_eq!(fetched.get_value("owner"), Some(json!({ "@id": id })));
        Ok(())
    }

    #[tokio::test]
    async fn multi_valued_forward_relation_is_stubbed_elementwise() -> Result<()> {
        let (people, resources) = graph_pair()?;
        let mikey = people.create(json!({ "name": "Mikey" }), &Params::default()).await?;
        let erin = people.create(json!({ "name": "Erin" }), &Params::default()).await?;
        let mikey_id = mikey.id().unwrap().to_owned();
        let erin_id = erin.id().unwrap().to_owned();
        let widget = resources
            .create(
                json!({ "name": "Widget", "owner": [mikey_id.clone(), erin_id.clone()] }),
                &Params::default(),
            )
            .await?;
        let fetched = resources
            .get(json!(widget.id().unwrap()), &Params::default())
            .await?
            .unwrap();
        assert_eq!(
            fetched.get_value("owner"),
            Some(json!([{ "@id": mikey_id }, { "@id": erin_id }]))
        );
        Ok(())
    }

    #[tokio::test]
    async fn included_forward_relation_stays_a_stub() -> Result<()> {
        let (people, resources) = graph_pair()?;
        let mikey = people.create(json!({ "name": "Mikey" }), &Params::default()).await?;
        let id = mikey.id().unwrap().to_owned();
        let widget = resources
            .create(json!({ "name": "Widget", "owner": id.clone() }), &Params::default())
            .await?;
        // forward relations are never expanded; the stub stands even when
        // the caller asks for the property
        let params = Params { include: vec!["owner".into()], ..Params::default() };
        let fetched = resources
            .get(json!(widget.id().unwrap()), &params)
            .await?
            .unwrap();
        assert_eq!(fetched.get_value("owner"), Some(json!({ "@id": id })));
        Ok(())
    }

    #[tokio::test]
    async fn exclude_drops_scalar_and_relation_properties() -> Result<()> {
        let (people, resources) = graph_pair()?;
        let mikey = people.create(json!({ "name": "Mikey" }), &Params::default()).await?;
        let id = mikey.id().unwrap().to_owned();
        let widget = resources
            .create(json!({ "name": "Widget", "owner": id }), &Params::default())
            .await?;
        let params = Params {
            exclude: vec!["name".into(), "owner".into()],
            ..Params::default()
        };
        let fetched = resources
            .get(json!(widget.id().unwrap()), &params)
            .await?
            .unwrap();
        assert!(!fetched.has_prop("name"));
        assert!(!fetched.has_prop("owner"));
        Ok(())
    }

    #[tokio::test]
    async fn update_overwrites_the_whole_document() -> Result<()> {
        let (people, _) = graph_pair()?;
        let created = people
            .create(json!({ "name": "Mikey", "nickname": "Mike" }), &Params::default())
            .await?;
        let id = created.id().unwrap().to_owned();
        people
            .update(json!({ "@id": id.clone(), "name": "Michael" }), &Params::default())
            .await?;
        let fetched = people.get(json!(id), &Params::default()).await?.unwrap();
        assert_eq!(fetched.get_str("name"), Some("Michael"));
        assert!(!fetched.has_prop("nickname"));
        Ok(())
    }

    #[tokio::test]
    async fn cyclic_includes_hit_the_depth_bound() -> Result<()> {
        let store: Arc<dyn TripleStore> = Arc::new(MemoryStore::new());
        let types = TypeRegistry::new();
        let registry = Registry::new();
        let nodes = Graph::new(GraphOptions {
            name: "nodes".into(),
            store,
            types,
            kind: TypeRef::Def(type_def(json!({
                "name": "Node",
                "properties": {
                    "parent": { "target": "Node" },
                    "children": { "target": "Node", "reverse": "parent" },
                },
            }))),
            registry: Some(registry),
        })?;
        let root = nodes.create(json!({}), &Params::default()).await?;
        let root_id = root.id().unwrap().to_owned();
        let mut parent = root;
        for _ in 0..12 {
            parent = nodes
                .create(json!({ "parent": parent.id().unwrap() }), &Params::default())
                .await?;
        }
        // the include set re-applies at every nested level, so expanding
        // "children" walks the whole chain
        let result = nodes
            .get(
                json!(root_id),
                &Params { include: vec!["children".into()], ..Params::default() },
            )
            .await;
        assert!(result.is_err());
        Ok(())
    }
}
