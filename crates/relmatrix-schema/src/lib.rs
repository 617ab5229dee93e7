//! SQL generation for relmatrix schema fixtures.
//!
//! Turns a backend-agnostic [`relmatrix_core::Table`] into the CREATE / INSERT /
//! DROP statements each backend capability provider runs.

pub mod ddl;

pub use ddl::{
    DdlGenerator, Dialect, PostgresDdlGenerator, SqlServerDdlGenerator, SqliteDdlGenerator,
    generator_for_dialect,
};

use relmatrix_core::{BackendKind, Table};

/// Setup statements for `table` on the given backend.
pub fn setup_statements(kind: BackendKind, schema: Option<&str>, table: &Table) -> Vec<String> {
    generator_for_dialect(kind.into()).setup_statements(schema, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmatrix_core::{Column, ScalarType};

    #[test]
    fn test_backend_kind_selects_dialect() {
        let table = Table::new("artist")
            .column(Column::new("id", ScalarType::Int).nullable())
            .row(vec![1.into()]);
        let pg = setup_statements(BackendKind::Postgres, Some("hasura"), &table);
        assert_eq!(pg.len(), 3);
        assert!(pg[0].starts_with("CREATE SCHEMA"));

        let sqlite = setup_statements(BackendKind::Sqlite, Some("hasura"), &table);
        assert_eq!(sqlite.len(), 2);
    }
}
