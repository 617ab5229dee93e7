//! Relationship resolution as admin.

use serde_json::{Value, json};

use super::{Failure, TestCase, TestGroup, Testbed, title_objects};
use crate::assert::{AssertionFailure, field, find_by};
use crate::fixtures;

pub(crate) const ARTIST_ALBUMS_QUERY: &str =
    "query { hasura_artist { name albums(order_by: {id: asc}) { title } } }";

pub(crate) const ARTIST_ALBUM_COUNT_QUERY: &str =
    "query { hasura_artist { name albums_aggregate { aggregate { count } } } }";

/// The `hasura_artist` list of a response's data.
pub(crate) fn artists(data: &Value) -> Result<&Value, Failure> {
    data.get(fixtures::ARTIST_TYPE).ok_or_else(|| {
        AssertionFailure::new("response has no hasura_artist field")
            .with_actual(data.clone())
            .into()
    })
}

/// `albums` of the artist called `name`.
fn albums_of<L>(bed: &Testbed<'_, L>, name: &str) -> Result<(), Failure> {
    let data = bed.data(ARTIST_ALBUMS_QUERY, None)?;
    let artist = find_by(artists(&data)?, "name", name)?;
    let expected = match name {
        "artist_no_id" => Value::Null,
        _ => title_objects(artist_id(name), None),
    };
    let path = format!("$.{}.albums", name);
    let actual = field(artist, fixtures::RELATIONSHIP, &path)?;
    bed.assert_eq(&path, &expected, actual)
}

/// Id of a fixture artist, looked up by name.
fn artist_id(name: &str) -> i64 {
    let artist = fixtures::artist_table();
    artist
        .rows
        .iter()
        .find(|row| row.get(1).and_then(|v| v.as_str()) == Some(name))
        .and_then(|row| row.first().and_then(|v| v.as_i64()))
        .unwrap_or(-1)
}

/// Expected `hasura_artist` list of [`ARTIST_ALBUMS_QUERY`].
pub(crate) fn expected_artists() -> Value {
    let artist = fixtures::artist_table();
    Value::Array(
        artist
            .rows
            .iter()
            .map(|row| {
                let name = row.get(1).and_then(|v| v.as_str()).unwrap_or_default();
                let albums = match row.first().and_then(|v| v.as_i64()) {
                    Some(id) => title_objects(id, None),
                    None => Value::Null,
                };
                json!({ "name": name, "albums": albums })
            })
            .collect(),
    )
}

pub(super) fn group<L: 'static>() -> TestGroup<L> {
    TestGroup::new("execution")
        .case(TestCase::new("matching_rows", |bed| albums_of(bed, "artist1")))
        .case(TestCase::new("no_matching_rows", |bed| {
            albums_of(bed, "artist_no_albums")
        }))
        .case(TestCase::new("null_join_key", |bed| {
            albums_of(bed, "artist_no_id")
        }))
        .case(TestCase::new("mixed_batch", |bed| {
            let data = bed.data(ARTIST_ALBUMS_QUERY, None)?;
            // Artist order is unspecified without order_by on the LHS.
            let options = bed.options.clone().unordered_field(fixtures::ARTIST_TYPE);
            Ok(crate::assert::assert_json_eq(
                "$.hasura_artist",
                &expected_artists(),
                artists(&data)?,
                &options,
            )?)
        }))
        .case(
            TestCase::new("aggregate_count", |bed| {
                let data = bed.data(ARTIST_ALBUM_COUNT_QUERY, None)?;
                let artist = find_by(artists(&data)?, "name", "artist1")?;
                let path = "$.artist1.albums_aggregate";
                bed.assert_eq(
                    path,
                    &json!({ "aggregate": { "count": super::album_titles(1).len() } }),
                    field(artist, fixtures::AGGREGATE_RELATIONSHIP, path)?,
                )
            })
            .requires_aggregates(),
        )
}
