use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::Graph;

/// Shared map from type name to the [`Graph`] responsible for it, letting
/// one graph dispatch relation lookups to another. A registry is passed in
/// at construction; there is no process-wide singleton.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<BTreeMap<String, Graph>>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }
    pub fn get(&self, type_name: &str) -> Option<Graph> {
        let graphs = self.inner.read().expect("graph registry lock poisoned");
        graphs.get(type_name).cloned()
    }
    pub fn set(&self, type_name: &str, graph: Graph) {
        debug!(type_name, "register graph");
        let mut graphs = self.inner.write().expect("graph registry lock poisoned");
        graphs.insert(type_name.to_owned(), graph);
    }
}
