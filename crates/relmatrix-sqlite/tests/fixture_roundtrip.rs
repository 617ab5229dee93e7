//! Provision fixtures through generated SQLite DDL and read them back.

use relmatrix_core::{Column, ScalarType, Table, Value};
use relmatrix_schema::{DdlGenerator, SqliteDdlGenerator};
use relmatrix_sqlite::SqliteConnection;

fn artist() -> Table {
    Table::new("artist")
        .column(Column::new("id", ScalarType::Int).nullable())
        .column(Column::new("name", ScalarType::Text))
        .row(vec![1.into(), "artist1".into()])
        .row(vec![2.into(), "artist2".into()])
        .row(vec![3.into(), "artist_no_albums".into()])
        .row(vec![Value::Null, "artist_no_id".into()])
}

#[test]
fn fixture_round_trips_through_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.db");
    let table = artist();
    table.validate().unwrap();

    {
        let conn = SqliteConnection::open_file(&path).unwrap();
        for statement in SqliteDdlGenerator.setup_statements(Some("hasura"), &table) {
            conn.execute_raw(&statement).unwrap();
        }
    }

    // A second connection sees the committed rows, like the engine would.
    let conn = SqliteConnection::open_file(&path).unwrap();
    let rows = conn
        .query_rows("SELECT id, name FROM artist ORDER BY name")
        .unwrap();
    assert_eq!(rows, table.rows);
}

#[test]
fn drop_table_is_idempotent() {
    let conn = SqliteConnection::open_memory().unwrap();
    let table = artist();
    let generator = SqliteDdlGenerator;

    conn.execute_raw(&generator.create_table(None, &table)).unwrap();
    assert!(conn.table_exists("artist").unwrap());

    let drop = generator.drop_table(None, &table);
    conn.execute_raw(&drop).unwrap();
    conn.execute_raw(&drop).unwrap();
    assert!(!conn.table_exists("artist").unwrap());
}

#[test]
fn not_null_columns_reject_null_rows() {
    let conn = SqliteConnection::open_memory().unwrap();
    let table = Table::new("album")
        .column(Column::new("id", ScalarType::Int))
        .column(Column::new("title", ScalarType::Text))
        .primary_key(&["id"])
        .row(vec![1.into(), Value::Null]);
    let generator = SqliteDdlGenerator;

    conn.execute_raw(&generator.create_table(None, &table)).unwrap();
    let insert = generator.insert_rows(None, &table).unwrap();
    let err = conn.execute_raw(&insert).unwrap_err();
    assert_eq!(err.sql(), Some(insert.as_str()));
}

#[test]
fn null_integer_key_is_caught_before_sqlite_sees_it() {
    // A lone INTEGER key aliases the rowid, so SQLite assigns an id to NULL.
    let table = Table::new("album")
        .column(Column::new("id", ScalarType::Int))
        .primary_key(&["id"])
        .row(vec![Value::Null]);
    let generator = SqliteDdlGenerator;

    let conn = SqliteConnection::open_memory().unwrap();
    conn.execute_raw(&generator.create_table(None, &table)).unwrap();
    conn.execute_raw(&generator.insert_rows(None, &table).unwrap())
        .unwrap();
    assert_eq!(conn.query_rows("SELECT id FROM album").unwrap(), vec![vec![Value::Int(1)]]);

    let err = table.validate().unwrap_err();
    assert!(err.to_string().contains("NULL in non-nullable 'id'"), "{err}");
}
