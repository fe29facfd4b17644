//! The backing triple store boundary.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::json_ld::{Context, Document};
use crate::query::TriplePattern;

pub mod memory;

/// Variable name to bound term, one per query match.
pub type Binding = BTreeMap<String, String>;

/// Contract every backing store must supply. Each call is a suspension
/// point; the mapper adds no retry, locking, or timeout on top.
#[async_trait]
pub trait TripleStore: Send + Sync {
    /// Whole-document upsert keyed by the document's `@id`.
    async fn put_document(&self, doc: &Document<'_>) -> Result<()>;
    /// Fetch by id; `context` narrows which properties are materialized.
    /// The underlying representation may yield more than one graph for a
    /// single subject, hence the container return.
    async fn get_document(&self, id: &str, context: &Context) -> Result<Vec<Document<'static>>>;
    /// Idempotent delete by id.
    async fn delete_document(&self, id: &str) -> Result<()>;
    /// Execute translated triple patterns, returning one binding per match.
    async fn run_query(&self, patterns: &[TriplePattern]) -> Result<Vec<Binding>>;
}
