//! The artist/album scenario every combination is provisioned with.
//!
//! The LHS holds `artist`, the RHS holds `album`, and the array relationship
//! `albums` maps `artist.id` to `album.artist_id`. Names are pinned with
//! `custom_name` so every backend produces the same GraphQL types.

use relmatrix_core::{
    Column, RelationshipDeclaration, RelationshipKind, RelationshipSource, ScalarType,
    SelectPermission, Table, TableIdentity, Value,
};
use serde_json::json;

/// Schema used on backends that have schemas.
pub const SCHEMA: &str = "hasura";
/// Engine source (or remote schema) name of the LHS.
pub const LHS_SOURCE: &str = "source";
/// Engine source name of the RHS.
pub const RHS_SOURCE: &str = "target";

pub const ARTIST_TYPE: &str = "hasura_artist";
pub const ALBUM_TYPE: &str = "hasura_album";
pub const ALBUM_AGGREGATE_TYPE: &str = "hasura_album_aggregate";

pub const RELATIONSHIP: &str = "albums";
pub const AGGREGATE_RELATIONSHIP: &str = "albums_aggregate";

pub const ROLE_FILTERED: &str = "role1";
pub const ROLE_LIMITED: &str = "role2";
/// Session claim role1's row filter reads.
pub const ARTIST_ID_CLAIM: &str = "artist-id";
/// Permission row limit of role2 on `album`.
pub const ROLE_LIMITED_LIMIT: u64 = 1;

/// `artist`: no primary key, nullable `id`, one row with a NULL join key.
pub fn artist_table() -> Table {
    Table::new("artist")
        .column(Column::new("id", ScalarType::Int).nullable())
        .column(Column::new("name", ScalarType::Text))
        .row(vec![1.into(), "artist1".into()])
        .row(vec![2.into(), "artist2".into()])
        .row(vec![3.into(), "artist_no_albums".into()])
        .row(vec![Value::Null, "artist_no_id".into()])
}

/// `album`: two albums for artist 1, one for artist 2.
pub fn album_table() -> Table {
    Table::new("album")
        .column(Column::new("id", ScalarType::Int))
        .column(Column::new("title", ScalarType::Text))
        .column(Column::new("artist_id", ScalarType::Int).nullable())
        .primary_key(&["id"])
        .row(vec![1.into(), "album1_artist1".into(), 1.into()])
        .row(vec![2.into(), "album2_artist1".into(), 1.into()])
        .row(vec![3.into(), "album3_artist2".into(), 2.into()])
}

/// Both roles may read every artist.
pub fn artist_permissions() -> Vec<SelectPermission> {
    [ROLE_FILTERED, ROLE_LIMITED]
        .into_iter()
        .map(|role| SelectPermission::new(role, &["id", "name"]))
        .collect()
}

/// role1: own albums only, no `id` column, no aggregates.
/// role2: everything, at most one row, aggregates allowed.
pub fn album_permissions() -> Vec<SelectPermission> {
    vec![
        SelectPermission::new(ROLE_FILTERED, &["title", "artist_id"])
            .filter(json!({ "artist_id": { "_eq": "x-hasura-artist-id" } })),
        SelectPermission::new(ROLE_LIMITED, &["id", "title", "artist_id"])
            .limit(ROLE_LIMITED_LIMIT)
            .allow_aggregations(),
    ]
}

/// `albums` from `source` to the RHS album table.
pub fn albums_relationship(source: RelationshipSource, target: &TableIdentity) -> RelationshipDeclaration {
    RelationshipDeclaration::new(
        RELATIONSHIP,
        RelationshipKind::Array,
        source,
        target.clone(),
    )
    .map("id", "artist_id")
}
