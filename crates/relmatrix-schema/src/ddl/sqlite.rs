//! SQLite DDL generator.
//!
//! SQLite databases have no schemas: each engine source maps to its own
//! database file, so schema names are dropped from every statement.
//!
//! A single `INTEGER` primary key column becomes an alias of the rowid, and
//! SQLite fills in NULL keys instead of rejecting them. Fixtures are validated
//! before provisioning, which is where NULL keys are refused.

use relmatrix_core::Table;

use super::{DdlGenerator, Dialect, generate_create_table};

/// DDL generator for SQLite.
pub struct SqliteDdlGenerator;

impl DdlGenerator for SqliteDdlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn create_schema(&self, _schema: &str) -> Option<String> {
        None
    }

    fn create_table(&self, _schema: Option<&str>, table: &Table) -> String {
        generate_create_table(None, table, Dialect::Sqlite)
    }
}
