//! Backend-agnostic schema fixtures.
//!
//! A [`Table`] describes columns, keys and rows once; each backend capability
//! provider realizes it as DDL/DML in its own dialect.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// Column types available to fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Int,
    BigInt,
    Double,
    Text,
    Bool,
}

impl ScalarType {
    /// Check if a value can be stored in a column of this type.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ScalarType::Int, Value::Int(_)) => true,
            (ScalarType::BigInt, Value::Int(_) | Value::BigInt(_)) => true,
            (ScalarType::Double, Value::Int(_) | Value::BigInt(_) | Value::Double(_)) => true,
            (ScalarType::Text, Value::Text(_)) => true,
            (ScalarType::Bool, Value::Bool(_)) => true,
            _ => false,
        }
    }
}

/// A fixture column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ScalarType,
    pub nullable: bool,
}

impl Column {
    /// A NOT NULL column.
    pub fn new(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
        }
    }

    /// Mark this column nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// A same-backend foreign key reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub column: String,
    pub target_table: String,
    pub target_column: String,
}

/// A table fixture: definition plus the rows it is seeded with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
    pub references: Vec<Reference>,
    pub rows: Vec<Vec<Value>>,
}

fn identifier_regex() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

/// Check that a name is a plain SQL/GraphQL identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}

impl Table {
    /// Start a new, empty table fixture.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            references: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Add a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the primary key columns.
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Add a foreign key reference to another table on the same backend.
    pub fn reference(
        mut self,
        column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        self.references.push(Reference {
            column: column.into(),
            target_table: target_table.into(),
            target_column: target_column.into(),
        });
        self
    }

    /// Append a row; cells are in column order.
    pub fn row(mut self, cells: Vec<Value>) -> Self {
        self.rows.push(cells);
        self
    }

    /// Find a column by name.
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Position of a column, by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Rows rendered as JSON objects keyed by column name.
    pub fn rows_as_json(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(col, cell)| (col.name.clone(), cell.to_json()))
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect()
    }

    /// Validate the fixture definition and its rows.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if !is_valid_identifier(&self.name) {
            problems.push(format!("invalid table name '{}'", self.name));
        }
        if self.columns.is_empty() {
            problems.push("table has no columns".to_string());
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if !is_valid_identifier(&col.name) {
                problems.push(format!("invalid column name '{}'", col.name));
            }
            if !seen.insert(col.name.as_str()) {
                problems.push(format!("duplicate column '{}'", col.name));
            }
        }

        for pk in &self.primary_key {
            match self.find_column(pk) {
                None => problems.push(format!("primary key column '{}' does not exist", pk)),
                Some(col) if col.nullable => {
                    problems.push(format!("primary key column '{}' is nullable", pk));
                }
                Some(_) => {}
            }
        }

        for reference in &self.references {
            if self.find_column(&reference.column).is_none() {
                problems.push(format!(
                    "reference column '{}' does not exist",
                    reference.column
                ));
            }
        }

        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                problems.push(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    self.columns.len()
                ));
                continue;
            }
            for (col, cell) in self.columns.iter().zip(row) {
                if cell.is_null() && !col.nullable {
                    problems.push(format!("row {} has NULL in non-nullable '{}'", i, col.name));
                } else if !col.ty.accepts(cell) {
                    problems.push(format!(
                        "row {} stores {} in {:?} column '{}'",
                        i,
                        cell.type_name(),
                        col.ty,
                        col.name
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::config(format!(
                "invalid fixture '{}': {}",
                self.name,
                problems.join("; ")
            )))
        }
    }
}
