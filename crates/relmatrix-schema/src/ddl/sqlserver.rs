//! SQL Server DDL generator.
//!
//! SQL Server has no `CREATE SCHEMA IF NOT EXISTS`; the schema is created
//! through a guarded dynamic statement instead.

use relmatrix_core::Table;

use super::{DdlGenerator, Dialect, generate_create_table, quote_identifier};

/// DDL generator for SQL Server.
pub struct SqlServerDdlGenerator;

impl DdlGenerator for SqlServerDdlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn create_schema(&self, schema: &str) -> Option<String> {
        let quoted = quote_identifier(schema, Dialect::SqlServer).replace('\'', "''");
        Some(format!(
            "IF NOT EXISTS (SELECT 1 FROM sys.schemas WHERE name = N'{}') EXEC('CREATE SCHEMA {}')",
            schema.replace('\'', "''"),
            quoted
        ))
    }

    fn create_table(&self, schema: Option<&str>, table: &Table) -> String {
        generate_create_table(schema, table, Dialect::SqlServer)
    }
}
