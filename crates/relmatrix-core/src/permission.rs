//! Select permissions and limit composition.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// A role's select permission on one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectPermission {
    pub role: String,
    /// Columns the role may see.
    pub columns: Vec<String>,
    /// Row filter as an engine boolean expression; `{}` allows every row.
    pub filter: serde_json::Value,
    /// Maximum number of rows returned per selection.
    pub limit: Option<u64>,
    /// Whether aggregate fields are exposed to the role.
    pub allow_aggregations: bool,
}

impl SelectPermission {
    /// A permission over the given columns with no row filter.
    pub fn new(role: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            role: role.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            filter: json!({}),
            limit: None,
            allow_aggregations: false,
        }
    }

    /// Set the row filter.
    pub fn filter(mut self, filter: serde_json::Value) -> Self {
        self.filter = filter;
        self
    }

    /// Set the permission row limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Allow aggregate queries.
    pub fn allow_aggregations(mut self) -> Self {
        self.allow_aggregations = true;
        self
    }

    /// The `permission` payload of a create-select-permission call.
    pub fn to_permission_json(&self) -> serde_json::Value {
        let mut permission = json!({
            "columns": self.columns,
            "filter": self.filter,
            "allow_aggregations": self.allow_aggregations,
        });
        if let Some(limit) = self.limit {
            permission["limit"] = json!(limit);
        }
        permission
    }
}

/// Rows a selection may return once the query and permission limits compose.
///
/// Both limits apply, so the effective limit is their minimum; with only one
/// present, that one wins; with neither, the selection is unbounded.
pub fn effective_limit(query_limit: Option<u64>, permission_limit: Option<u64>) -> Option<u64> {
    match (query_limit, permission_limit) {
        (Some(q), Some(p)) => Some(q.min(p)),
        (Some(q), None) => Some(q),
        (None, p) => p,
    }
}
