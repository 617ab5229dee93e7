//! Backend-agnostic table identities.
//!
//! An RHS context hands its [`TableIdentity`] to every LHS factory it is
//! combined with. The LHS only ever renders it through
//! [`TableIdentity::to_metadata_json`], so it never needs to know which
//! backend provisioned the table.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

/// How the engine expects a table reference to be spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableNaming {
    /// `{"schema": "...", "name": "..."}`
    Qualified,
    /// `["schema", "name"]` or `["name"]`
    Path,
}

/// A provisioned table, identified by the engine source that exposes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableIdentity {
    /// Engine source name the table is tracked under.
    pub source: String,
    /// Schema holding the table, when the backend has schemas.
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
    /// Engine spelling for this table reference.
    pub naming: TableNaming,
}

impl TableIdentity {
    /// A schema-qualified table (`{"schema", "name"}`).
    pub fn qualified(
        source: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            schema: Some(schema.into()),
            name: name.into(),
            naming: TableNaming::Qualified,
        }
    }

    /// A path-addressed table (`["name"]`), as used by data connectors.
    pub fn path(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            schema: None,
            name: name.into(),
            naming: TableNaming::Path,
        }
    }

    /// Render the table reference the way the engine's metadata API expects it.
    pub fn to_metadata_json(&self) -> serde_json::Value {
        match self.naming {
            TableNaming::Qualified => match &self.schema {
                Some(schema) => json!({ "schema": schema, "name": self.name }),
                None => json!({ "name": self.name }),
            },
            TableNaming::Path => {
                let mut path: Vec<&str> = Vec::with_capacity(2);
                if let Some(schema) = &self.schema {
                    path.push(schema);
                }
                path.push(&self.name);
                json!(path)
            }
        }
    }

    /// `schema.name` (or just `name`), for logging and reports.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.qualified_name())
    }
}
