//! `ldgraph` maps typed entities onto JSON-LD documents in a triple store.
//!
//! A [`Graph`] binds one type schema to one store connection and exposes
//! `find`, `get`, `create`, `update`, and `remove`. Schema-declared
//! relations are left as `{"@id": ..}` reference stubs unless a call asks
//! for them, in which case reverse relations are resolved by querying the
//! target type's graph through a shared [`Registry`].
//!
//! The backing store is an external collaborator behind the [`TripleStore`]
//! trait; [`MemoryStore`] is the in-process reference implementation.

pub mod graph;
pub mod json_ld;
pub mod query;
pub mod schema;
pub mod store;

pub use graph::{Graph, GraphOptions, MAX_INCLUDE_DEPTH, Params, Registry, TypeRef};
pub use json_ld::{Context, ContextTerm, Document};
pub use query::{Pattern, TriplePattern};
pub use schema::{PropertyDef, Relation, TypeDef, TypeRegistry, TypeSchema};
pub use store::memory::MemoryStore;
pub use store::{Binding, TripleStore};
