//! Cross-source relationship declarations.
//!
//! A relationship is never part of a [`Table`] fixture. It is registered with
//! the engine through metadata calls once both sides are provisioned, and it
//! only refers to the target through its [`TableIdentity`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::fixture::Table;
use crate::identity::TableIdentity;

/// The cardinality of a relationship as seen from the source side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    /// At most one related row; the field is nullable and not a list.
    Object,
    /// Any number of related rows; the field is a list.
    #[default]
    Array,
}

impl RelationshipKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::Object => "object",
            RelationshipKind::Array => "array",
        }
    }
}

/// The entity that exposes the relationship field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipSource {
    /// A tracked table on a database source.
    Table(TableIdentity),
    /// An object type served by a remote GraphQL schema.
    RemoteSchemaType {
        remote_schema: String,
        type_name: String,
    },
}

impl RelationshipSource {
    /// Engine source or remote schema name.
    pub fn owner(&self) -> &str {
        match self {
            RelationshipSource::Table(table) => &table.source,
            RelationshipSource::RemoteSchemaType { remote_schema, .. } => remote_schema,
        }
    }
}

/// A relationship from a source entity to rows in a target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDeclaration {
    /// Name of the generated relationship field.
    pub name: String,
    pub kind: RelationshipKind,
    pub source: RelationshipSource,
    /// Target table, possibly on another source.
    pub target: TableIdentity,
    /// Source column -> target column.
    pub field_mapping: BTreeMap<String, String>,
}

impl RelationshipDeclaration {
    /// Create a relationship with an empty field mapping.
    pub fn new(
        name: impl Into<String>,
        kind: RelationshipKind,
        source: RelationshipSource,
        target: TableIdentity,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            source,
            target,
            field_mapping: BTreeMap::new(),
        }
    }

    /// Map a source column to a target column.
    pub fn map(mut self, source_column: impl Into<String>, target_column: impl Into<String>) -> Self {
        self.field_mapping
            .insert(source_column.into(), target_column.into());
        self
    }

    /// Name of the aggregate companion field generated for array relationships.
    pub fn aggregate_field_name(&self) -> Option<String> {
        match self.kind {
            RelationshipKind::Array => Some(format!("{}_aggregate", self.name)),
            RelationshipKind::Object => None,
        }
    }

    /// The `definition` payload of a create-relationship metadata call.
    pub fn to_source_definition(&self) -> serde_json::Value {
        json!({
            "to_source": {
                "source": self.target.source,
                "table": self.target.to_metadata_json(),
                "relationship_type": self.kind.as_str(),
                "field_mapping": self.field_mapping,
            }
        })
    }

    /// Check the mapping against the fixtures on both sides.
    pub fn validate(&self, source: &Table, target: &Table) -> Result<()> {
        if self.field_mapping.is_empty() {
            return Err(Error::config(format!(
                "relationship '{}' has an empty field mapping",
                self.name
            )));
        }
        for (from, to) in &self.field_mapping {
            if source.find_column(from).is_none() {
                return Err(Error::config(format!(
                    "relationship '{}': source column '{}.{}' does not exist",
                    self.name, source.name, from
                )));
            }
            if target.find_column(to).is_none() {
                return Err(Error::config(format!(
                    "relationship '{}': target column '{}.{}' does not exist",
                    self.name, target.name, to
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{Column, ScalarType};

    fn albums() -> RelationshipDeclaration {
        RelationshipDeclaration::new(
            "albums",
            RelationshipKind::Array,
            RelationshipSource::Table(TableIdentity::qualified("source", "hasura", "artist")),
            TableIdentity::qualified("target", "hasura", "album"),
        )
        .map("id", "artist_id")
    }

    #[test]
    fn definition_uses_target_identity() {
        assert_eq!(
            albums().to_source_definition(),
            json!({
                "to_source": {
                    "source": "target",
                    "table": { "schema": "hasura", "name": "album" },
                    "relationship_type": "array",
                    "field_mapping": { "id": "artist_id" },
                }
            })
        );
    }

    #[test]
    fn aggregate_field_only_for_arrays() {
        assert_eq!(albums().aggregate_field_name().as_deref(), Some("albums_aggregate"));
        let mut object = albums();
        object.kind = RelationshipKind::Object;
        assert_eq!(object.aggregate_field_name(), None);
    }

    #[test]
    fn validate_checks_both_sides() {
        let artist = Table::new("artist").column(Column::new("id", ScalarType::Int).nullable());
        let album = Table::new("album").column(Column::new("id", ScalarType::Int));
        let err = albums().validate(&artist, &album).unwrap_err().to_string();
        assert!(err.contains("target column 'album.artist_id'"), "{err}");

        let empty = RelationshipDeclaration::new(
            "albums",
            RelationshipKind::Array,
            RelationshipSource::RemoteSchemaType {
                remote_schema: "source".to_string(),
                type_name: "hasura_artist".to_string(),
            },
            TableIdentity::path("target", "album"),
        );
        assert_eq!(empty.source.owner(), "source");
        assert!(empty.validate(&artist, &album).is_err());
    }
}
