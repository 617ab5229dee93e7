//! The relationship suite against an engine stand-in that resolves the
//! `albums` relationship from the fixtures, the way a correct engine would.

use std::sync::Arc;

use relmatrix::backends::{database_lhs, database_rhs};
use relmatrix::testing::{Call, RecordingGateway};
use relmatrix::{
    BackendKind, CaseStatus, CombinationOutcome, Driver, EngineHandle, EngineSqlProvider,
    GraphqlRequest, SqliteProvider, combinations, fixtures, relationship_suite,
};
use serde_json::{Value, json};

fn query_limit(query: &str) -> Option<usize> {
    let start = query.find("limit: ")? + "limit: ".len();
    let digits: String = query[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Titles of albums visible to the caller for `artist_id`, ordered by id.
fn visible_titles(artist_id: i64, role: Option<&str>, claim: Option<&str>, limit: Option<usize>) -> Vec<String> {
    let album = fixtures::album_table();
    let mut rows: Vec<(i64, String)> = album
        .rows
        .iter()
        .filter(|row| row[2].as_i64() == Some(artist_id))
        .filter(|row| match role {
            Some(fixtures::ROLE_FILTERED) => {
                claim.and_then(|c| c.parse::<i64>().ok()) == row[2].as_i64()
            }
            _ => true,
        })
        .map(|row| (row[0].as_i64().unwrap(), row[1].as_str().unwrap().to_string()))
        .collect();
    rows.sort();
    let permission_limit = match role {
        Some(fixtures::ROLE_LIMITED) => Some(fixtures::ROLE_LIMITED_LIMIT as usize),
        _ => None,
    };
    let limit = match (limit, permission_limit) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    rows.into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(_, title)| title)
        .collect()
}

fn field(name: &str, with_args: bool, ty: Value) -> Value {
    let args: Vec<Value> = if with_args {
        ["where", "order_by", "offset", "limit", "distinct_on"]
            .iter()
            .map(|a| json!({ "name": a }))
            .collect()
    } else {
        Vec::new()
    };
    json!({ "name": name, "args": args, "type": ty })
}

fn introspect(query: &str, role: Option<&str>) -> Value {
    let filtered = role == Some(fixtures::ROLE_FILTERED);
    if query.contains("\"hasura_album\"") {
        let names: &[&str] = if filtered {
            &["title", "artist_id"]
        } else {
            &["id", "title", "artist_id"]
        };
        let fields: Vec<Value> = names
            .iter()
            .map(|n| field(n, false, json!({ "kind": "SCALAR", "name": "Int" })))
            .collect();
        return json!({ "data": { "__type": { "fields": fields } } });
    }

    let mut fields = vec![
        field("id", false, json!({ "kind": "SCALAR", "name": "Int" })),
        field("name", false, json!({ "kind": "NON_NULL", "name": null, "ofType": { "kind": "SCALAR", "name": "String" } })),
        field(
            "albums",
            true,
            json!({ "kind": "NON_NULL", "name": null, "ofType": { "kind": "LIST", "name": null,
                "ofType": { "kind": "NON_NULL", "name": null, "ofType": { "kind": "OBJECT", "name": "hasura_album" } } } }),
        ),
    ];
    if !filtered {
        fields.push(field(
            "albums_aggregate",
            true,
            json!({ "kind": "NON_NULL", "name": null, "ofType": { "kind": "OBJECT", "name": "hasura_album_aggregate" } }),
        ));
    }
    json!({ "data": { "__type": { "fields": fields } } })
}

fn fake_engine(request: &GraphqlRequest) -> Value {
    let role = request.identity.as_ref().map(|i| i.role.as_str());
    let claim = request
        .identity
        .as_ref()
        .and_then(|i| i.claims.get("artist-id"))
        .map(String::as_str);
    let query = request.query.as_str();

    if query.contains("__type") {
        return introspect(query, role);
    }

    let limit = query_limit(query);
    let artists: Vec<Value> = fixtures::artist_table()
        .rows
        .iter()
        .rev()
        .map(|row| {
            let name = row[1].as_str().unwrap();
            let titles = row[0]
                .as_i64()
                .map(|id| visible_titles(id, role, claim, limit));
            let nodes = |titles: &[String]| -> Vec<Value> {
                titles.iter().map(|t| json!({ "title": t })).collect()
            };
            if query.contains("albums_aggregate") {
                let titles = titles.unwrap_or_default();
                let mut aggregate = json!({ "aggregate": { "count": titles.len() } });
                if query.contains("nodes") {
                    aggregate["nodes"] = json!(nodes(&titles));
                }
                json!({ "name": name, "albums_aggregate": aggregate })
            } else {
                let albums = titles.map_or(Value::Null, |t| json!(nodes(&t)));
                json!({ "name": name, "albums": albums })
            }
        })
        .collect();
    json!({ "data": { "hasura_artist": artists } })
}

#[test]
fn suite_passes_against_a_correct_engine() {
    let gateway = Arc::new(RecordingGateway::new().with_responder(fake_engine));
    let engine = EngineHandle::new(gateway.clone());
    let dir = tempfile::tempdir().unwrap();

    let lhs = vec![database_lhs(Arc::new(EngineSqlProvider::new(
        BackendKind::Postgres,
        "postgres://db",
    )))];
    let rhs = vec![
        database_rhs(Arc::new(EngineSqlProvider::new(
            BackendKind::Postgres,
            "postgres://db",
        ))),
        database_rhs(Arc::new(SqliteProvider::new(dir.path()))),
    ];
    let contexts = combinations(&lhs, &rhs).unwrap();
    let suite = relationship_suite();
    let report = Driver::new(engine).run(&contexts, &suite);

    report.assert_success();

    let pg = report.combination("from postgres to postgres").unwrap();
    assert_eq!(pg.cases.len(), suite.case_count());
    assert!(pg.cases.iter().all(|c| c.status == CaseStatus::Passed));

    // The SQLite RHS has no aggregates, so those cases are skipped.
    let sqlite = report.combination("from postgres to sqlite").unwrap();
    assert!(matches!(
        sqlite.case("execution", "aggregate_count").map(|c| &c.status),
        Some(CaseStatus::Skipped(_))
    ));
    assert_eq!(
        sqlite.case("execution", "null_join_key").map(|c| &c.status),
        Some(&CaseStatus::Passed)
    );

    // Queries ran both as admin and as each role.
    let roles: Vec<Option<String>> = gateway
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Graphql { role } => Some(role),
            _ => None,
        })
        .collect();
    assert!(roles.contains(&None));
    assert!(roles.contains(&Some("role1".to_string())));
    assert!(roles.contains(&Some("role2".to_string())));
}

#[test]
fn wrong_null_join_key_handling_is_reported_with_a_path() {
    // An engine that resolves a NULL join key to [] instead of null.
    let broken = |request: &GraphqlRequest| {
        let mut response = fake_engine(request);
        if let Some(artists) = response.pointer_mut("/data/hasura_artist").and_then(Value::as_array_mut) {
            for artist in artists {
                if artist["albums"].is_null() && artist.get("albums").is_some() {
                    artist["albums"] = json!([]);
                }
            }
        }
        response
    };
    let engine = EngineHandle::new(Arc::new(RecordingGateway::new().with_responder(broken)));
    let lhs = vec![database_lhs(Arc::new(EngineSqlProvider::new(
        BackendKind::SqlServer,
        "Server=db;",
    )))];
    let rhs = vec![database_rhs(Arc::new(EngineSqlProvider::new(
        BackendKind::SqlServer,
        "Server=db;",
    )))];
    let contexts = combinations(&lhs, &rhs).unwrap();

    let report = Driver::new(engine).run(&contexts, &relationship_suite());

    let combination = &report.combinations[0];
    match &combination.outcome {
        CombinationOutcome::CaseFailed { case, message } => {
            assert_eq!(case, "execution::null_join_key");
            assert!(message.contains("$.artist_no_id.albums: expected null, found []"));
        }
        other => panic!("unexpected outcome: {other}"),
    }
    assert!(combination.teardown_error.is_none());
}

#[test]
fn dropped_relationship_field_is_not_read_as_null() {
    // An engine that omits `albums` entirely when the join key is NULL.
    let dropping = |request: &GraphqlRequest| {
        let mut response = fake_engine(request);
        if let Some(artists) = response.pointer_mut("/data/hasura_artist").and_then(Value::as_array_mut) {
            for artist in artists {
                if artist["albums"].is_null() {
                    if let Some(object) = artist.as_object_mut() {
                        object.remove("albums");
                    }
                }
            }
        }
        response
    };
    let engine = EngineHandle::new(Arc::new(RecordingGateway::new().with_responder(dropping)));
    let lhs = vec![database_lhs(Arc::new(EngineSqlProvider::new(
        BackendKind::Postgres,
        "postgres://db",
    )))];
    let rhs = vec![database_rhs(Arc::new(EngineSqlProvider::new(
        BackendKind::Postgres,
        "postgres://db",
    )))];

    let report = Driver::new(engine).run(&combinations(&lhs, &rhs).unwrap(), &relationship_suite());
    match &report.combinations[0].outcome {
        CombinationOutcome::CaseFailed { case, message } => {
            assert_eq!(case, "execution::null_join_key");
            assert!(message.contains("$.artist_no_id.albums: field absent"), "{message}");
        }
        other => panic!("unexpected outcome: {other}"),
    }
}

#[test]
fn graphql_errors_fail_the_case() {
    let engine = EngineHandle::new(Arc::new(RecordingGateway::new().with_responder(|_| {
        json!({ "errors": [{ "message": "field 'albums' not found in type: 'hasura_artist'" }] })
    })));
    let lhs = vec![database_lhs(Arc::new(EngineSqlProvider::new(
        BackendKind::Postgres,
        "postgres://db",
    )))];
    let rhs = vec![database_rhs(Arc::new(EngineSqlProvider::new(
        BackendKind::Postgres,
        "postgres://db",
    )))];

    let report = Driver::new(engine).run(&combinations(&lhs, &rhs).unwrap(), &relationship_suite());
    match &report.combinations[0].outcome {
        CombinationOutcome::CaseFailed { case, message } => {
            assert_eq!(case, "schema::relationship_field_shape");
            assert!(message.contains("field 'albums' not found"));
        }
        other => panic!("unexpected outcome: {other}"),
    }
}
