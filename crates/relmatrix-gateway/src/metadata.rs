//! Metadata-management calls and their wire format.
//!
//! Every call renders to `{"type": ..., "args": {...}}`. Source-scoped calls
//! take their type prefix from the backend kind (`pg_track_table`,
//! `mssql_track_table`, `sqlite_track_table`); engine-wide calls
//! (`clear_metadata`, remote schemas) have no prefix.

use relmatrix_core::{
    BackendKind, Error, RelationshipDeclaration, RelationshipSource, Result, SelectPermission,
    TableIdentity,
};
use serde_json::{Value, json};

/// One metadata-management call.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataCall {
    /// Register a database source with the engine.
    AddSource {
        kind: BackendKind,
        name: String,
        /// Backend-specific `configuration` object
        configuration: Value,
    },
    DropSource {
        kind: BackendKind,
        name: String,
        /// Also drop metadata that depends on the source
        cascade: bool,
    },
    /// Expose a table in the GraphQL schema.
    TrackTable {
        kind: BackendKind,
        table: TableIdentity,
        /// Root field / type name override
        custom_name: Option<String>,
    },
    UntrackTable {
        kind: BackendKind,
        table: TableIdentity,
        /// Also drop dependent permissions and relationships
        cascade: bool,
    },
    CreateSelectPermission {
        kind: BackendKind,
        table: TableIdentity,
        permission: SelectPermission,
    },
    DropSelectPermission {
        kind: BackendKind,
        table: TableIdentity,
        role: String,
    },
    /// Relationship from a tracked table to a table on another source.
    CreateRemoteRelationship {
        kind: BackendKind,
        relationship: RelationshipDeclaration,
    },
    DeleteRemoteRelationship {
        kind: BackendKind,
        table: TableIdentity,
        name: String,
    },
    /// Register a remote GraphQL schema.
    AddRemoteSchema {
        name: String,
        url: String,
        timeout_seconds: u64,
    },
    RemoveRemoteSchema {
        name: String,
    },
    /// Relationship from a remote schema type to a database table.
    CreateRemoteSchemaRelationship {
        relationship: RelationshipDeclaration,
    },
    ClearMetadata,
    ReloadMetadata,
}

fn prefixed(kind: BackendKind, op: &str) -> String {
    format!("{}_{}", kind.metadata_prefix(), op)
}

impl MetadataCall {
    /// The `type` field of this call.
    pub fn call_type(&self) -> String {
        match self {
            MetadataCall::AddSource { kind, .. } => prefixed(*kind, "add_source"),
            MetadataCall::DropSource { kind, .. } => prefixed(*kind, "drop_source"),
            MetadataCall::TrackTable { kind, .. } => prefixed(*kind, "track_table"),
            MetadataCall::UntrackTable { kind, .. } => prefixed(*kind, "untrack_table"),
            MetadataCall::CreateSelectPermission { kind, .. } => {
                prefixed(*kind, "create_select_permission")
            }
            MetadataCall::DropSelectPermission { kind, .. } => {
                prefixed(*kind, "drop_select_permission")
            }
            MetadataCall::CreateRemoteRelationship { kind, .. } => {
                prefixed(*kind, "create_remote_relationship")
            }
            MetadataCall::DeleteRemoteRelationship { kind, .. } => {
                prefixed(*kind, "delete_remote_relationship")
            }
            MetadataCall::AddRemoteSchema { .. } => "add_remote_schema".to_string(),
            MetadataCall::RemoveRemoteSchema { .. } => "remove_remote_schema".to_string(),
            MetadataCall::CreateRemoteSchemaRelationship { .. } => {
                "create_remote_schema_remote_relationship".to_string()
            }
            MetadataCall::ClearMetadata => "clear_metadata".to_string(),
            MetadataCall::ReloadMetadata => "reload_metadata".to_string(),
        }
    }

    /// The `args` field of this call.
    pub fn args(&self) -> Result<Value> {
        let args = match self {
            MetadataCall::AddSource {
                name,
                configuration,
                ..
            } => json!({ "name": name, "configuration": configuration }),
            MetadataCall::DropSource { name, cascade, .. } => {
                json!({ "name": name, "cascade": cascade })
            }
            MetadataCall::TrackTable {
                table, custom_name, ..
            } => {
                let mut args = json!({
                    "source": table.source,
                    "table": table.to_metadata_json(),
                });
                if let Some(custom_name) = custom_name {
                    args["configuration"] = json!({ "custom_name": custom_name });
                }
                args
            }
            MetadataCall::UntrackTable { table, cascade, .. } => json!({
                "source": table.source,
                "table": table.to_metadata_json(),
                "cascade": cascade,
            }),
            MetadataCall::CreateSelectPermission {
                table, permission, ..
            } => json!({
                "source": table.source,
                "table": table.to_metadata_json(),
                "role": permission.role,
                "permission": permission.to_permission_json(),
            }),
            MetadataCall::DropSelectPermission { table, role, .. } => json!({
                "source": table.source,
                "table": table.to_metadata_json(),
                "role": role,
            }),
            MetadataCall::CreateRemoteRelationship { relationship, .. } => {
                let RelationshipSource::Table(table) = &relationship.source else {
                    return Err(Error::config(format!(
                        "relationship '{}' is declared on a remote schema type; use CreateRemoteSchemaRelationship",
                        relationship.name
                    )));
                };
                json!({
                    "source": table.source,
                    "table": table.to_metadata_json(),
                    "name": relationship.name,
                    "definition": relationship.to_source_definition(),
                })
            }
            MetadataCall::DeleteRemoteRelationship { table, name, .. } => json!({
                "source": table.source,
                "table": table.to_metadata_json(),
                "name": name,
            }),
            MetadataCall::AddRemoteSchema {
                name,
                url,
                timeout_seconds,
            } => json!({
                "name": name,
                "definition": {
                    "url": url,
                    "forward_client_headers": true,
                    "timeout_seconds": timeout_seconds,
                },
            }),
            MetadataCall::RemoveRemoteSchema { name } => json!({ "name": name }),
            MetadataCall::CreateRemoteSchemaRelationship { relationship } => {
                let RelationshipSource::RemoteSchemaType {
                    remote_schema,
                    type_name,
                } = &relationship.source
                else {
                    return Err(Error::config(format!(
                        "relationship '{}' is declared on a table; use CreateRemoteRelationship",
                        relationship.name
                    )));
                };
                json!({
                    "remote_schema": remote_schema,
                    "type_name": type_name,
                    "name": relationship.name,
                    "definition": relationship.to_source_definition(),
                })
            }
            MetadataCall::ClearMetadata | MetadataCall::ReloadMetadata => json!({}),
        };
        Ok(args)
    }

    /// The full request body for this call.
    pub fn to_json(&self) -> Result<Value> {
        Ok(json!({ "type": self.call_type(), "args": self.args()? }))
    }
}

/// The body of a `bulk` request running `calls` in order.
pub fn bulk_json(calls: &[MetadataCall]) -> Result<Value> {
    let args = calls
        .iter()
        .map(MetadataCall::to_json)
        .collect::<Result<Vec<_>>>()?;
    Ok(json!({ "type": "bulk", "args": args }))
}

/// A raw SQL statement run by the engine against one of its sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSql {
    pub kind: BackendKind,
    pub source: String,
    pub sql: String,
    /// Cascade metadata changes caused by the SQL
    pub cascade: bool,
}

impl RunSql {
    pub fn new(kind: BackendKind, source: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            sql: sql.into(),
            cascade: false,
        }
    }

    /// Cascade dependent metadata.
    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    /// The `type` field; only SQL backends with a `run_sql` endpoint have one.
    pub fn call_type(&self) -> Result<&'static str> {
        match self.kind {
            BackendKind::Postgres => Ok("run_sql"),
            BackendKind::SqlServer => Ok("mssql_run_sql"),
            BackendKind::Sqlite => Err(Error::config(
                "the engine has no run_sql endpoint for sqlite sources",
            )),
        }
    }

    /// The full `/v2/query` request body.
    pub fn to_json(&self) -> Result<Value> {
        Ok(json!({
            "type": self.call_type()?,
            "args": {
                "source": self.source,
                "sql": self.sql,
                "cascade": self.cascade,
            },
        }))
    }
}
