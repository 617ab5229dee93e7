//! DDL/DML generation from schema fixtures.
//!
//! This module renders a backend-agnostic [`Table`] into executable SQL for
//! each supported dialect (PostgreSQL, SQL Server, SQLite).

mod postgres;
mod sqlite;
mod sqlserver;

pub use postgres::PostgresDdlGenerator;
pub use sqlite::SqliteDdlGenerator;
pub use sqlserver::SqlServerDdlGenerator;

use relmatrix_core::{BackendKind, Column, Reference, ScalarType, Table, Value};

/// SQL dialects the generators target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    SqlServer,
    Sqlite,
}

impl Dialect {
    pub const fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::SqlServer => "sqlserver",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl From<BackendKind> for Dialect {
    fn from(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Postgres => Dialect::Postgres,
            BackendKind::SqlServer => Dialect::SqlServer,
            BackendKind::Sqlite => Dialect::Sqlite,
        }
    }
}

/// Generates the statements a capability provider runs for a fixture.
pub trait DdlGenerator {
    /// The dialect this generator targets.
    fn dialect(&self) -> Dialect;

    /// Statement creating `schema` if it does not exist, when the dialect has schemas.
    fn create_schema(&self, schema: &str) -> Option<String>;

    /// CREATE TABLE for the fixture.
    fn create_table(&self, schema: Option<&str>, table: &Table) -> String;

    /// One multi-row INSERT for the fixture's rows; `None` when there are no rows.
    fn insert_rows(&self, schema: Option<&str>, table: &Table) -> Option<String> {
        generate_insert(schema, table, self.dialect())
    }

    /// DROP TABLE for the fixture; never fails when the table is missing.
    fn drop_table(&self, schema: Option<&str>, table: &Table) -> String {
        generate_drop_table(schema, &table.name, self.dialect())
    }

    /// Everything needed to provision the fixture, in execution order.
    fn setup_statements(&self, schema: Option<&str>, table: &Table) -> Vec<String> {
        let mut statements = Vec::new();
        if let Some(schema) = schema {
            statements.extend(self.create_schema(schema));
        }
        statements.push(self.create_table(schema, table));
        statements.extend(self.insert_rows(schema, table));
        statements
    }
}

/// Create a DDL generator for the given dialect.
pub fn generator_for_dialect(dialect: Dialect) -> Box<dyn DdlGenerator + Send + Sync> {
    match dialect {
        Dialect::Postgres => Box::new(PostgresDdlGenerator),
        Dialect::SqlServer => Box::new(SqlServerDdlGenerator),
        Dialect::Sqlite => Box::new(SqliteDdlGenerator),
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Quote an identifier (table/column name) for SQL.
///
/// - PostgreSQL/SQLite: double quotes
/// - SQL Server: square brackets
fn quote_identifier(name: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::SqlServer => format!("[{}]", name.replace(']', "]]")),
        Dialect::Sqlite | Dialect::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

/// `schema.table`, quoted; SQLite ignores the schema.
fn qualified_name(schema: Option<&str>, table: &str, dialect: Dialect) -> String {
    match (schema, dialect) {
        (Some(schema), Dialect::Postgres | Dialect::SqlServer) => format!(
            "{}.{}",
            quote_identifier(schema, dialect),
            quote_identifier(table, dialect)
        ),
        _ => quote_identifier(table, dialect),
    }
}

/// SQL type for a fixture column.
///
/// SQL Server cannot index `NVARCHAR(MAX)`, so text key columns get a bounded
/// length.
fn column_type(column: &Column, in_key: bool, dialect: Dialect) -> &'static str {
    match (column.ty, dialect) {
        (ScalarType::Int, _) => "INTEGER",
        (ScalarType::BigInt, _) => "BIGINT",
        (ScalarType::Double, Dialect::Postgres) => "DOUBLE PRECISION",
        (ScalarType::Double, Dialect::SqlServer) => "FLOAT",
        (ScalarType::Double, Dialect::Sqlite) => "REAL",
        (ScalarType::Text, Dialect::SqlServer) if in_key => "NVARCHAR(450)",
        (ScalarType::Text, Dialect::SqlServer) => "NVARCHAR(MAX)",
        (ScalarType::Text, _) => "TEXT",
        (ScalarType::Bool, Dialect::Postgres) => "BOOLEAN",
        (ScalarType::Bool, Dialect::SqlServer) => "BIT",
        (ScalarType::Bool, Dialect::Sqlite) => "INTEGER",
    }
}

/// Format a column definition for CREATE TABLE.
fn format_column_def(column: &Column, in_key: bool, dialect: Dialect) -> String {
    let mut parts = vec![
        quote_identifier(&column.name, dialect),
        column_type(column, in_key, dialect).to_string(),
    ];
    if column.nullable {
        parts.push("NULL".to_string());
    } else {
        parts.push("NOT NULL".to_string());
    }
    parts.join(" ")
}

/// Format a foreign key constraint clause.
fn format_fk_constraint(reference: &Reference, schema: Option<&str>, dialect: Dialect) -> String {
    format!(
        "FOREIGN KEY ({}) REFERENCES {}({})",
        quote_identifier(&reference.column, dialect),
        qualified_name(schema, &reference.target_table, dialect),
        quote_identifier(&reference.target_column, dialect),
    )
}

/// Render a value as a SQL literal.
fn format_literal(value: &Value, dialect: Dialect) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => match dialect {
            Dialect::Postgres => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Dialect::SqlServer | Dialect::Sqlite => if *b { "1" } else { "0" }.to_string(),
        },
        Value::Int(v) => v.to_string(),
        Value::BigInt(v) => v.to_string(),
        Value::Double(v) => {
            if v.is_finite() {
                format!("{:?}", v)
            } else {
                "NULL".to_string()
            }
        }
        Value::Text(s) => {
            let escaped = s.replace('\'', "''");
            match dialect {
                Dialect::SqlServer => format!("N'{}'", escaped),
                Dialect::Postgres | Dialect::Sqlite => format!("'{}'", escaped),
            }
        }
    }
}

/// Generate CREATE TABLE SQL.
fn generate_create_table(schema: Option<&str>, table: &Table, dialect: Dialect) -> String {
    tracing::debug!(
        dialect = dialect.name(),
        table = %table.name,
        columns = table.columns.len(),
        "Generating CREATE TABLE DDL"
    );

    let mut parts = Vec::new();

    for col in &table.columns {
        let in_key = table.primary_key.contains(&col.name);
        parts.push(format!("  {}", format_column_def(col, in_key, dialect)));
    }

    if !table.primary_key.is_empty() {
        let pk_cols: Vec<String> = table
            .primary_key
            .iter()
            .map(|c| quote_identifier(c, dialect))
            .collect();
        parts.push(format!("  PRIMARY KEY ({})", pk_cols.join(", ")));
    }

    for reference in &table.references {
        parts.push(format!("  {}", format_fk_constraint(reference, schema, dialect)));
    }

    let sql = format!(
        "CREATE TABLE {} (\n{}\n)",
        qualified_name(schema, &table.name, dialect),
        parts.join(",\n")
    );

    tracing::trace!(sql = %sql, "Generated CREATE TABLE statement");
    sql
}

/// Generate a multi-row INSERT for the fixture rows.
fn generate_insert(schema: Option<&str>, table: &Table, dialect: Dialect) -> Option<String> {
    if table.rows.is_empty() {
        return None;
    }
    tracing::debug!(
        dialect = dialect.name(),
        table = %table.name,
        rows = table.rows.len(),
        "Generating INSERT DML"
    );

    let cols: Vec<String> = table
        .columns
        .iter()
        .map(|c| quote_identifier(&c.name, dialect))
        .collect();
    let values: Vec<String> = table
        .rows
        .iter()
        .map(|row| {
            let cells: Vec<String> = row.iter().map(|v| format_literal(v, dialect)).collect();
            format!("({})", cells.join(", "))
        })
        .collect();

    Some(format!(
        "INSERT INTO {} ({}) VALUES\n  {}",
        qualified_name(schema, &table.name, dialect),
        cols.join(", "),
        values.join(",\n  ")
    ))
}

/// Generate DROP TABLE SQL.
fn generate_drop_table(schema: Option<&str>, table_name: &str, dialect: Dialect) -> String {
    tracing::debug!(table = %table_name, dialect = dialect.name(), "Generating DROP TABLE DDL");
    format!(
        "DROP TABLE IF EXISTS {}",
        qualified_name(schema, table_name, dialect)
    )
}
