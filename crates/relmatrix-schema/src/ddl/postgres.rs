//! PostgreSQL DDL generator.

use relmatrix_core::Table;

use super::{DdlGenerator, Dialect, generate_create_table, quote_identifier};

/// DDL generator for PostgreSQL.
pub struct PostgresDdlGenerator;

impl DdlGenerator for PostgresDdlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn create_schema(&self, schema: &str) -> Option<String> {
        Some(format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_identifier(schema, Dialect::Postgres)
        ))
    }

    fn create_table(&self, schema: Option<&str>, table: &Table) -> String {
        generate_create_table(schema, table, Dialect::Postgres)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::tests::album;

    #[test]
    fn test_create_table() {
        let sql = PostgresDdlGenerator.create_table(Some("hasura"), &album());
        assert!(sql.starts_with("CREATE TABLE \"hasura\".\"album\" ("));
        assert!(sql.contains("\"id\" INTEGER NOT NULL"));
        assert!(sql.contains("\"title\" TEXT NOT NULL"));
        assert!(sql.contains("\"artist_id\" INTEGER NULL"));
        assert!(sql.contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn test_create_schema() {
        assert_eq!(
            PostgresDdlGenerator.create_schema("hasura").as_deref(),
            Some("CREATE SCHEMA IF NOT EXISTS \"hasura\"")
        );
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(
            PostgresDdlGenerator.drop_table(Some("hasura"), &album()),
            "DROP TABLE IF EXISTS \"hasura\".\"album\""
        );
    }

    #[test]
    fn test_foreign_key() {
        let table = album().reference("artist_id", "artist", "id");
        let sql = PostgresDdlGenerator.create_table(Some("hasura"), &table);
        assert!(sql.contains("FOREIGN KEY (\"artist_id\") REFERENCES \"hasura\".\"artist\"(\"id\")"));
    }
}
