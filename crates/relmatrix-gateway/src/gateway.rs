//! The engine gateway trait.

use relmatrix_core::Result;
use serde_json::Value;

use crate::graphql::GraphqlRequest;
use crate::metadata::{MetadataCall, RunSql};

/// Everything the harness asks of the engine under test.
///
/// Calls are blocking round trips and are never retried. Implementations
/// must be shareable across the contexts of one run.
pub trait EngineGateway: Send + Sync {
    /// Run one metadata call.
    fn metadata(&self, call: &MetadataCall) -> Result<Value>;

    /// Run calls as one `bulk` request. Any failure means none of them applied.
    fn metadata_batch(&self, calls: &[MetadataCall]) -> Result<Value>;

    /// Run SQL against a source through the engine.
    fn run_sql(&self, sql: &RunSql) -> Result<Value>;

    /// Execute a GraphQL query. The response, including any `errors` array,
    /// is returned as-is.
    fn graphql(&self, request: &GraphqlRequest) -> Result<Value>;

    /// Check that the engine is up.
    fn health(&self) -> Result<()>;
}
