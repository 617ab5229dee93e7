//! Shape of the generated relationship fields.

use serde_json::{Value, json};

use super::{Failure, TestCase, TestGroup, Testbed};
use crate::assert::{AssertionFailure, ensure, find_by};
use crate::fixtures;

/// Arguments every array relationship field takes, sorted.
pub(crate) const RELATIONSHIP_ARGUMENTS: [&str; 5] =
    ["distinct_on", "limit", "offset", "order_by", "where"];

pub(crate) fn fields_query(type_name: &str) -> String {
    format!(
        r#"query {{ __type(name: "{}") {{ fields {{ name args {{ name }} type {{ kind name ofType {{ kind name ofType {{ kind name ofType {{ kind name }} }} }} }} }} }} }}"#,
        type_name
    )
}

/// Render an introspected type reference in SDL notation (`[T!]!`).
pub(crate) fn render_type(ty: &Value) -> String {
    let inner = || render_type(ty.get("ofType").unwrap_or(&Value::Null));
    match ty.get("kind").and_then(Value::as_str) {
        Some("NON_NULL") => format!("{}!", inner()),
        Some("LIST") => format!("[{}]", inner()),
        Some(_) => ty
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string(),
        None => "?".to_string(),
    }
}

fn argument_names(field: &Value) -> Vec<String> {
    let mut names: Vec<String> = field
        .get("args")
        .and_then(Value::as_array)
        .map(|args| {
            args.iter()
                .filter_map(|arg| arg.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn artist_field<L>(bed: &Testbed<'_, L>, field: &str) -> Result<Value, Failure> {
    let data = bed.data(&fields_query(fixtures::ARTIST_TYPE), None)?;
    let fields = data
        .pointer("/__type/fields")
        .ok_or_else(|| AssertionFailure::new("hasura_artist is not in the schema").with_actual(data.clone()))?;
    Ok(find_by(fields, "name", field)?.clone())
}

fn check_field<L>(
    bed: &Testbed<'_, L>,
    field: &str,
    expected_type: &str,
) -> Result<(), Failure> {
    let field_def = artist_field(bed, field)?;
    bed.assert_eq(
        &format!("$.{}.args", field),
        &json!(RELATIONSHIP_ARGUMENTS),
        &json!(argument_names(&field_def)),
    )?;
    let actual_type = render_type(field_def.get("type").unwrap_or(&Value::Null));
    ensure(actual_type == expected_type, || {
        format!("{} has type {}, expected {}", field, actual_type, expected_type)
    })?;
    Ok(())
}

pub(super) fn group<L: 'static>() -> TestGroup<L> {
    TestGroup::new("schema")
        .case(TestCase::new("relationship_field_shape", |bed| {
            check_field(
                bed,
                fixtures::RELATIONSHIP,
                &format!("[{}!]!", fixtures::ALBUM_TYPE),
            )
        }))
        .case(
            TestCase::new("aggregate_field_shape", |bed| {
                check_field(
                    bed,
                    fixtures::AGGREGATE_RELATIONSHIP,
                    &format!("{}!", fixtures::ALBUM_AGGREGATE_TYPE),
                )
            })
            .requires_aggregates(),
        )
        .case(
            TestCase::new("argument_lists_match", |bed| {
                let plain = argument_names(&artist_field(bed, fixtures::RELATIONSHIP)?);
                let aggregate =
                    argument_names(&artist_field(bed, fixtures::AGGREGATE_RELATIONSHIP)?);
                Ok(ensure(plain == aggregate, || {
                    format!(
                        "albums takes {:?} but albums_aggregate takes {:?}",
                        plain, aggregate
                    )
                })?)
            })
            .requires_aggregates(),
        )
}
