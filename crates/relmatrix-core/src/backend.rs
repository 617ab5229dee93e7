//! Backend kinds known to the harness.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::TableNaming;

/// A database engine that can hold either side of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// PostgreSQL, provisioned through the engine's `run_sql`.
    Postgres,
    /// Microsoft SQL Server, provisioned through `mssql_run_sql`.
    SqlServer,
    /// SQLite behind a data connector, provisioned in-process.
    Sqlite,
}

impl BackendKind {
    /// Every backend kind, in registration order.
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Postgres,
        BackendKind::SqlServer,
        BackendKind::Sqlite,
    ];

    /// Prefix the engine uses for this backend's metadata call types.
    #[must_use]
    pub const fn metadata_prefix(self) -> &'static str {
        match self {
            BackendKind::Postgres => "pg",
            BackendKind::SqlServer => "mssql",
            BackendKind::Sqlite => "sqlite",
        }
    }

    /// Human readable name, used in context names and reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            BackendKind::Postgres => "postgres",
            BackendKind::SqlServer => "sqlserver",
            BackendKind::Sqlite => "sqlite",
        }
    }

    /// How the engine expects tables of this backend to be referenced.
    #[must_use]
    pub const fn table_naming(self) -> TableNaming {
        match self {
            BackendKind::Postgres | BackendKind::SqlServer => TableNaming::Qualified,
            BackendKind::Sqlite => TableNaming::Path,
        }
    }

    /// Whether tables live inside a named schema on this backend.
    #[must_use]
    pub const fn has_schemas(self) -> bool {
        !matches!(self, BackendKind::Sqlite)
    }

    /// Parse a backend kind from its name or metadata prefix (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(BackendKind::Postgres),
            "sqlserver" | "mssql" => Some(BackendKind::SqlServer),
            "sqlite" => Some(BackendKind::Sqlite),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_names_and_prefixes() {
        for kind in BackendKind::ALL {
            assert_eq!(BackendKind::parse(kind.name()), Some(kind));
            assert_eq!(BackendKind::parse(kind.metadata_prefix()), Some(kind));
        }
        assert_eq!(BackendKind::parse(" PostgreSQL "), Some(BackendKind::Postgres));
        assert_eq!(BackendKind::parse("bigquery"), None);
    }

    #[test]
    fn sqlite_uses_path_naming() {
        assert_eq!(BackendKind::Sqlite.table_naming(), TableNaming::Path);
        assert!(!BackendKind::Sqlite.has_schemas());
        assert_eq!(BackendKind::SqlServer.table_naming(), TableNaming::Qualified);
    }
}
