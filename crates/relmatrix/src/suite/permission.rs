//! Access control on the relationship: row and column filters, aggregate
//! visibility and the permission row limit.

use relmatrix_core::effective_limit;
use serde_json::{Value, json};

use super::execution::artists;
use super::schema::fields_query;
use super::{Failure, TestCase, TestGroup, Testbed, filtered_caller, limited_caller, title_objects};
use crate::assert::{AssertionFailure, ensure, field, find_by};
use crate::fixtures;

pub(crate) const FILTERED_ALBUMS_QUERY: &str =
    "query { hasura_artist { name albums(order_by: {title: asc}) { title } } }";

/// Query limits exercised against role2's permission limit.
pub(crate) const QUERY_LIMITS: [Option<u64>; 3] = [None, Some(1), Some(4)];

fn limit_arg(limit: Option<u64>) -> String {
    limit.map(|l| format!(", limit: {}", l)).unwrap_or_default()
}

pub(crate) fn limited_albums_query(limit: Option<u64>) -> String {
    format!(
        "query {{ hasura_artist {{ name albums(order_by: {{id: asc}}{}) {{ title }} }} }}",
        limit_arg(limit)
    )
}

pub(crate) fn limited_aggregate_query(limit: Option<u64>) -> String {
    format!(
        "query {{ hasura_artist {{ name albums_aggregate(order_by: {{id: asc}}{}) {{ aggregate {{ count }} nodes {{ title }} }} }} }}",
        limit_arg(limit)
    )
}

fn field_names(data: &Value) -> Result<Vec<String>, Failure> {
    let fields = data
        .pointer("/__type/fields")
        .and_then(Value::as_array)
        .ok_or_else(|| AssertionFailure::new("type is not visible").with_actual(data.clone()))?;
    let mut names: Vec<String> = fields
        .iter()
        .filter_map(|f| f.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    names.sort();
    Ok(names)
}

fn row_filter<L>(bed: &Testbed<'_, L>, claim: i64) -> Result<(), Failure> {
    let data = bed.data(FILTERED_ALBUMS_QUERY, Some(filtered_caller(claim)))?;
    let list = artists(&data)?;
    for (name, id) in [("artist1", 1), ("artist2", 2), ("artist_no_albums", 3)] {
        let expected = if id == claim {
            title_objects(id, None)
        } else {
            json!([])
        };
        let artist = find_by(list, "name", name)?;
        let path = format!("$.{}.albums (artist-id {})", name, claim);
        let actual = field(artist, fixtures::RELATIONSHIP, &path)?;
        bed.assert_eq(&path, &expected, actual)?;
    }
    let no_id = find_by(list, "name", "artist_no_id")?;
    let path = "$.artist_no_id.albums";
    bed.assert_eq(path, &Value::Null, field(no_id, fixtures::RELATIONSHIP, path)?)
}

fn limited_nodes<L>(bed: &Testbed<'_, L>, limit: Option<u64>) -> Result<(), Failure> {
    let data = bed.data(&limited_albums_query(limit), Some(limited_caller()))?;
    let artist = find_by(artists(&data)?, "name", "artist1")?;
    let effective = effective_limit(limit, Some(fixtures::ROLE_LIMITED_LIMIT));
    let path = format!("$.artist1.albums (limit {:?})", limit);
    let actual = field(artist, fixtures::RELATIONSHIP, &path)?;
    bed.assert_eq(&path, &title_objects(1, effective), actual)
}

fn limited_aggregate<L>(bed: &Testbed<'_, L>, limit: Option<u64>) -> Result<(), Failure> {
    let data = bed.data(&limited_aggregate_query(limit), Some(limited_caller()))?;
    let artist = find_by(artists(&data)?, "name", "artist1")?;
    let effective = effective_limit(limit, Some(fixtures::ROLE_LIMITED_LIMIT));
    let nodes = title_objects(1, effective);
    let count = nodes.as_array().map_or(0, Vec::len);
    let path = format!("$.artist1.albums_aggregate (limit {:?})", limit);
    let actual = field(artist, fixtures::AGGREGATE_RELATIONSHIP, &path)?;
    bed.assert_eq(
        &path,
        &json!({ "aggregate": { "count": count }, "nodes": nodes }),
        actual,
    )
}

pub(super) fn group<L: 'static>() -> TestGroup<L> {
    TestGroup::new("permission")
        .case(TestCase::new("row_filter", |bed| {
            row_filter(bed, 1)?;
            row_filter(bed, 2)
        }))
        .case(TestCase::new("column_filter", |bed| {
            let data = bed.data(
                &fields_query(fixtures::ALBUM_TYPE),
                Some(filtered_caller(1)),
            )?;
            bed.assert_eq(
                "$.hasura_album.fields",
                &json!(["artist_id", "title"]),
                &json!(field_names(&data)?),
            )
        }))
        .case(
            TestCase::new("aggregate_visibility", |bed| {
                let query = fields_query(fixtures::ARTIST_TYPE);
                let limited = field_names(&bed.data(&query, Some(limited_caller()))?)?;
                let filtered = field_names(&bed.data(&query, Some(filtered_caller(1)))?)?;
                let aggregate = fixtures::AGGREGATE_RELATIONSHIP.to_string();
                ensure(limited.contains(&aggregate), || {
                    format!("role2 should see {} but sees {:?}", aggregate, limited)
                })?;
                Ok(ensure(!filtered.contains(&aggregate), || {
                    format!("role1 should not see {} but sees {:?}", aggregate, filtered)
                })?)
            })
            .requires_aggregates(),
        )
        .case(TestCase::new("limit_nodes", |bed| {
            QUERY_LIMITS
                .into_iter()
                .try_for_each(|limit| limited_nodes(bed, limit))
        }))
        .case(
            TestCase::new("limit_aggregate", |bed| {
                QUERY_LIMITS
                    .into_iter()
                    .try_for_each(|limit| limited_aggregate(bed, limit))
            })
            .requires_aggregates(),
        )
}
