//! Backend capability providers.
//!
//! A provider knows how to register its database with the engine and how to
//! create, fill and drop a fixture table there. Postgres and SQL Server go
//! through the engine's `run_sql` endpoint; SQLite is written in-process to
//! the database file the engine's SQLite connector reads.

use std::path::PathBuf;

use relmatrix_core::{BackendKind, Result, Table, TableIdentity};
use relmatrix_gateway::RunSql;
use relmatrix_schema::{DdlGenerator, generator_for_dialect};
use relmatrix_sqlite::SqliteConnection;
use serde_json::{Value, json};

use crate::engine::EngineHandle;

/// Create / insert / drop for one backend kind.
pub trait BackendProvider: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// The `configuration` payload registering `source` with the engine.
    fn source_configuration(&self, source: &str) -> Value;

    /// Where a fixture table of this backend lives.
    fn identity(&self, source: &str, table: &str) -> TableIdentity {
        match self.kind().table_naming() {
            relmatrix_core::TableNaming::Qualified => {
                TableIdentity::qualified(source, crate::fixtures::SCHEMA, table)
            }
            relmatrix_core::TableNaming::Path => TableIdentity::path(source, table),
        }
    }

    fn create_table(&self, engine: &EngineHandle, target: &TableIdentity, table: &Table)
    -> Result<()>;

    fn insert_rows(&self, engine: &EngineHandle, target: &TableIdentity, table: &Table)
    -> Result<()>;

    /// Drop the table; a missing table is not an error.
    fn drop_table(&self, engine: &EngineHandle, target: &TableIdentity, table: &Table)
    -> Result<()>;
}

/// Provisions through the engine's `run_sql` endpoint.
#[derive(Debug, Clone)]
pub struct EngineSqlProvider {
    kind: BackendKind,
    /// Connection URL or string as the engine sees it
    database_url: String,
}

impl EngineSqlProvider {
    pub fn new(kind: BackendKind, database_url: impl Into<String>) -> Self {
        Self {
            kind,
            database_url: database_url.into(),
        }
    }

    fn generator(&self) -> Box<dyn DdlGenerator + Send + Sync> {
        generator_for_dialect(self.kind.into())
    }

    fn run(&self, engine: &EngineHandle, source: &str, sql: String, cascade: bool) -> Result<()> {
        tracing::debug!(backend = %self.kind, source = %source, "Running fixture SQL");
        let mut call = RunSql::new(self.kind, source, sql);
        if cascade {
            call = call.cascade();
        }
        engine.run_sql(&call)?;
        Ok(())
    }
}

impl BackendProvider for EngineSqlProvider {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn source_configuration(&self, _source: &str) -> Value {
        match self.kind {
            BackendKind::SqlServer => json!({
                "connection_info": { "connection_string": self.database_url }
            }),
            BackendKind::Postgres | BackendKind::Sqlite => json!({
                "connection_info": { "database_url": self.database_url }
            }),
        }
    }

    fn create_table(
        &self,
        engine: &EngineHandle,
        target: &TableIdentity,
        table: &Table,
    ) -> Result<()> {
        let generator = self.generator();
        let schema = target.schema.as_deref();
        if let Some(schema) = schema {
            if let Some(sql) = generator.create_schema(schema) {
                self.run(engine, &target.source, sql, false)?;
            }
        }
        self.run(
            engine,
            &target.source,
            generator.create_table(schema, table),
            false,
        )
    }

    fn insert_rows(
        &self,
        engine: &EngineHandle,
        target: &TableIdentity,
        table: &Table,
    ) -> Result<()> {
        match self.generator().insert_rows(target.schema.as_deref(), table) {
            Some(sql) => self.run(engine, &target.source, sql, false),
            None => Ok(()),
        }
    }

    fn drop_table(
        &self,
        engine: &EngineHandle,
        target: &TableIdentity,
        table: &Table,
    ) -> Result<()> {
        let sql = self.generator().drop_table(target.schema.as_deref(), table);
        self.run(engine, &target.source, sql, true)
    }
}

/// Provisions SQLite database files, one per engine source.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    /// Directory this process writes databases to
    dir: PathBuf,
    /// The same directory as the engine sees it
    engine_dir: PathBuf,
}

impl SqliteProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            engine_dir: dir.clone(),
            dir,
        }
    }

    /// Set the directory path the engine uses for the same files (when the
    /// engine runs in a container, for instance).
    pub fn engine_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.engine_dir = dir.into();
        self
    }

    /// Local path of the database backing `source`.
    pub fn database_path(&self, source: &str) -> PathBuf {
        self.dir.join(format!("{}.db", source))
    }

    fn open(&self, source: &str) -> Result<SqliteConnection> {
        SqliteConnection::open_file(self.database_path(source))
    }

    fn execute(&self, source: &str, sql: &str) -> Result<()> {
        tracing::debug!(source = %source, "Running fixture SQL on SQLite");
        self.open(source)?.execute_raw(sql)
    }
}

impl BackendProvider for SqliteProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn source_configuration(&self, source: &str) -> Value {
        let db = self.engine_dir.join(format!("{}.db", source));
        json!({ "db": db.to_string_lossy() })
    }

    fn create_table(
        &self,
        _engine: &EngineHandle,
        target: &TableIdentity,
        table: &Table,
    ) -> Result<()> {
        let generator = generator_for_dialect(BackendKind::Sqlite.into());
        self.execute(&target.source, &generator.create_table(None, table))
    }

    fn insert_rows(
        &self,
        _engine: &EngineHandle,
        target: &TableIdentity,
        table: &Table,
    ) -> Result<()> {
        let generator = generator_for_dialect(BackendKind::Sqlite.into());
        match generator.insert_rows(None, table) {
            Some(sql) => self.execute(&target.source, &sql),
            None => Ok(()),
        }
    }

    fn drop_table(
        &self,
        _engine: &EngineHandle,
        target: &TableIdentity,
        table: &Table,
    ) -> Result<()> {
        let generator = generator_for_dialect(BackendKind::Sqlite.into());
        self.execute(&target.source, &generator.drop_table(None, table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::testing::{Call, RecordingGateway};
    use std::sync::Arc;

    #[test]
    fn engine_sql_provider_runs_ddl_through_engine() {
        let gateway = Arc::new(RecordingGateway::new());
        let engine = EngineHandle::new(gateway.clone());
        let provider = EngineSqlProvider::new(BackendKind::Postgres, "postgres://db");
        let target = provider.identity("target", "album");
        let album = fixtures::album_table();

        provider.create_table(&engine, &target, &album).unwrap();
        provider.insert_rows(&engine, &target, &album).unwrap();
        provider.drop_table(&engine, &target, &album).unwrap();

        let sql: Vec<String> = gateway
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::RunSql { source, sql } => {
                    assert_eq!(source, "target");
                    Some(sql)
                }
                _ => None,
            })
            .collect();
        assert_eq!(sql.len(), 4);
        assert!(sql[0].starts_with("CREATE SCHEMA IF NOT EXISTS \"hasura\""));
        assert!(sql[1].starts_with("CREATE TABLE \"hasura\".\"album\""));
        assert!(sql[2].starts_with("INSERT INTO \"hasura\".\"album\""));
        assert_eq!(sql[3], "DROP TABLE IF EXISTS \"hasura\".\"album\"");

        // The drop cascades dependent metadata.
        assert_eq!(gateway.bodies()[3]["args"]["cascade"], true);
    }

    #[test]
    fn sqlserver_source_uses_connection_string() {
        let provider = EngineSqlProvider::new(BackendKind::SqlServer, "Server=db;");
        assert_eq!(
            provider.source_configuration("target"),
            json!({ "connection_info": { "connection_string": "Server=db;" } })
        );
        assert_eq!(
            provider.identity("target", "album"),
            TableIdentity::qualified("target", "hasura", "album")
        );
    }

    #[test]
    fn sqlite_provider_writes_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = EngineHandle::new(Arc::new(RecordingGateway::new()));
        let provider = SqliteProvider::new(dir.path()).engine_dir("/data");
        let target = provider.identity("target", "album");
        assert_eq!(target, TableIdentity::path("target", "album"));
        assert_eq!(
            provider.source_configuration("target"),
            json!({ "db": "/data/target.db" })
        );

        let album = fixtures::album_table();
        provider.create_table(&engine, &target, &album).unwrap();
        provider.insert_rows(&engine, &target, &album).unwrap();

        let conn = SqliteConnection::open_file(provider.database_path("target")).unwrap();
        let rows = conn
            .query_rows("SELECT id, title, artist_id FROM album ORDER BY id")
            .unwrap();
        assert_eq!(rows, album.rows);

        provider.drop_table(&engine, &target, &album).unwrap();
        provider.drop_table(&engine, &target, &album).unwrap();
        assert!(!conn.table_exists("album").unwrap());
    }
}
