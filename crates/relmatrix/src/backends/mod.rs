//! Backend registry: which LHS and RHS contexts a run is made of.
//!
//! Dispatch is on [`LhsKind`] and [`BackendKind`] values. A kind only takes
//! part when its configuration is present; asking for an unconfigured kind by
//! name is an error.

pub mod lhs;
pub mod remote_schema;
pub mod rhs;

use std::fmt;
use std::sync::Arc;

use relmatrix_core::{
    BackendKind, Error, Result, SelectPermission, Table, TableIdentity,
};
use relmatrix_gateway::MetadataCall;

use crate::combine::combinations;
use crate::config::{
    HarnessConfig, POSTGRES_URL_ENV, REMOTE_SCHEMA_CMD_ENV, SQLITE_DIR_ENV, SQLSERVER_URL_ENV,
};
use crate::context::{Context, LhsFactory, RhsContext};
use crate::engine::{EngineHandle, tolerate_missing};
use crate::provider::{BackendProvider, EngineSqlProvider, SqliteProvider};

pub use lhs::database_lhs;
pub use remote_schema::{AuxServer, AuxServerConfig, remote_schema_lhs};
pub use rhs::database_rhs;

/// What can sit on the left-hand side of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LhsKind {
    Database(BackendKind),
    /// A remote GraphQL schema served by an auxiliary process.
    RemoteSchema,
}

impl LhsKind {
    /// Every LHS kind, databases first.
    pub fn all() -> Vec<LhsKind> {
        BackendKind::ALL
            .into_iter()
            .map(LhsKind::Database)
            .chain(std::iter::once(LhsKind::RemoteSchema))
            .collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            LhsKind::Database(kind) => kind.name(),
            LhsKind::RemoteSchema => "remote_schema",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "remote_schema" | "remote-schema" | "remoteschema" => Some(LhsKind::RemoteSchema),
            other => BackendKind::parse(other).map(LhsKind::Database),
        }
    }

    fn config_hint(self) -> &'static str {
        match self {
            LhsKind::Database(kind) => backend_config_hint(kind),
            LhsKind::RemoteSchema => REMOTE_SCHEMA_CMD_ENV,
        }
    }
}

impl fmt::Display for LhsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn backend_config_hint(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Postgres => POSTGRES_URL_ENV,
        BackendKind::SqlServer => SQLSERVER_URL_ENV,
        BackendKind::Sqlite => SQLITE_DIR_ENV,
    }
}

/// Local state of every LHS context.
#[derive(Debug)]
pub enum LhsLocalState {
    /// Database LHS kinds own nothing outside the database.
    Database,
    /// The remote-schema LHS owns its server process.
    AuxServer(AuxServer),
}

impl LhsLocalState {
    pub fn aux_server(&self) -> Option<&AuxServer> {
        match self {
            LhsLocalState::AuxServer(server) => Some(server),
            LhsLocalState::Database => None,
        }
    }
}

/// The provider for `kind`, if the configuration has what it needs.
pub fn provider_for(kind: BackendKind, config: &HarnessConfig) -> Option<Arc<dyn BackendProvider>> {
    match kind {
        BackendKind::Postgres => config
            .postgres_url
            .as_ref()
            .map(|url| Arc::new(EngineSqlProvider::new(kind, url.clone())) as Arc<dyn BackendProvider>),
        BackendKind::SqlServer => config
            .sqlserver_url
            .as_ref()
            .map(|url| Arc::new(EngineSqlProvider::new(kind, url.clone())) as Arc<dyn BackendProvider>),
        BackendKind::Sqlite => config.sqlite_dir.as_ref().map(|dir| {
            let engine_dir = config.sqlite_engine_dir.clone().unwrap_or_else(|| dir.clone());
            Arc::new(SqliteProvider::new(dir.clone()).engine_dir(engine_dir)) as Arc<dyn BackendProvider>
        }),
    }
}

fn unconfigured(side: &str, kind: impl fmt::Display, hint: &str, filtered: bool) -> Result<()> {
    if filtered {
        return Err(Error::config(format!(
            "{} kind '{}' was requested but {} is not set",
            side, kind, hint
        )));
    }
    tracing::info!(side, kind = %kind, "Skipping unconfigured backend kind (set {})", hint);
    Ok(())
}

/// LHS factories for every configured, selected LHS kind.
pub fn lhs_factories(config: &HarnessConfig) -> Result<Vec<LhsFactory<LhsLocalState>>> {
    let mut factories = Vec::new();
    for kind in config.lhs_kinds()? {
        let factory = match kind {
            LhsKind::Database(backend) => provider_for(backend, config).map(database_lhs),
            LhsKind::RemoteSchema => config.aux_server_config().map(remote_schema_lhs),
        };
        match factory {
            Some(factory) => factories.push(factory),
            None => unconfigured("LHS", kind, kind.config_hint(), config.has_lhs_filter())?,
        }
    }
    Ok(factories)
}

/// RHS contexts for every configured, selected backend kind.
pub fn rhs_contexts(config: &HarnessConfig) -> Result<Vec<RhsContext>> {
    let mut contexts = Vec::new();
    for kind in config.rhs_kinds()? {
        match provider_for(kind, config) {
            Some(provider) => contexts.push(database_rhs(provider)),
            None => unconfigured("RHS", kind, backend_config_hint(kind), config.has_rhs_filter())?,
        }
    }
    Ok(contexts)
}

/// The full LHS x RHS matrix for `config`.
pub fn matrix(config: &HarnessConfig) -> Result<Vec<Context<LhsLocalState>>> {
    let lhs = lhs_factories(config)?;
    let rhs = rhs_contexts(config)?;
    if lhs.is_empty() || rhs.is_empty() {
        tracing::warn!(
            lhs = lhs.len(),
            rhs = rhs.len(),
            "No combinations to run; configure at least one kind per side"
        );
    }
    combinations(&lhs, &rhs)
}

/// Register `source`, create and fill `table`, track it as `type_name` and
/// grant `permissions`.
///
/// A table left behind by an aborted run is dropped first.
pub(crate) fn provision_table(
    engine: &EngineHandle,
    provider: &dyn BackendProvider,
    identity: &TableIdentity,
    table: &Table,
    type_name: &str,
    permissions: Vec<SelectPermission>,
) -> Result<()> {
    let kind = provider.kind();
    table.validate()?;

    engine.metadata(&MetadataCall::AddSource {
        kind,
        name: identity.source.clone(),
        configuration: provider.source_configuration(&identity.source),
    })?;

    tolerate_missing(provider.drop_table(engine, identity, table))?;
    provider.create_table(engine, identity, table)?;
    provider.insert_rows(engine, identity, table)?;

    engine.metadata(&MetadataCall::TrackTable {
        kind,
        table: identity.clone(),
        custom_name: Some(type_name.to_string()),
    })?;

    let grants: Vec<MetadataCall> = permissions
        .into_iter()
        .map(|permission| MetadataCall::CreateSelectPermission {
            kind,
            table: identity.clone(),
            permission,
        })
        .collect();
    if !grants.is_empty() {
        engine.metadata_batch(&grants)?;
    }
    Ok(())
}

/// Undo [`provision_table`]. Every step runs; missing objects are fine.
pub(crate) fn remove_table(
    engine: &EngineHandle,
    provider: &dyn BackendProvider,
    identity: &TableIdentity,
    table: &Table,
    before: Vec<Result<()>>,
) -> Result<()> {
    let kind = provider.kind();
    let mut results = before;
    results.push(tolerate_missing(engine.metadata(&MetadataCall::UntrackTable {
        kind,
        table: identity.clone(),
        cascade: true,
    })));
    // The table goes before the source: SQL providers reach it through the source.
    results.push(tolerate_missing(provider.drop_table(engine, identity, table)));
    results.push(tolerate_missing(engine.metadata(&MetadataCall::DropSource {
        kind,
        name: identity.source.clone(),
        cascade: true,
    })));
    crate::context::collect_teardown(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lhs_kind_names() {
        assert_eq!(LhsKind::parse("remote-schema"), Some(LhsKind::RemoteSchema));
        assert_eq!(LhsKind::parse("mssql"), Some(LhsKind::Database(BackendKind::SqlServer)));
        assert_eq!(LhsKind::parse("mongo"), None);
        assert_eq!(LhsKind::all().len(), 4);
        for kind in LhsKind::all() {
            assert_eq!(LhsKind::parse(kind.name()), Some(kind));
        }
    }

    #[test]
    fn unconfigured_kinds_are_skipped_by_default() {
        let config = HarnessConfig::new().postgres_url("postgres://db");
        let lhs = lhs_factories(&config).unwrap();
        assert_eq!(lhs.len(), 1);
        assert_eq!(lhs[0].name, "postgres");
        assert_eq!(rhs_contexts(&config).unwrap().len(), 1);
    }

    #[test]
    fn requested_but_unconfigured_kind_is_an_error() {
        let config = HarnessConfig::new().postgres_url("postgres://db").rhs(&["sqlite"]);
        let err = rhs_contexts(&config).unwrap_err();
        assert!(err.to_string().contains(SQLITE_DIR_ENV));
    }

    #[test]
    fn matrix_covers_every_pair() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::new()
            .postgres_url("postgres://db")
            .sqlserver_url("Server=db;")
            .sqlite_dir(dir.path())
            .remote_schema_cmd("true");
        let contexts = matrix(&config).unwrap();
        assert_eq!(contexts.len(), 4 * 3);
        assert_eq!(contexts[0].name, "from postgres to postgres");
        assert_eq!(contexts[11].name, "from remote_schema to sqlite");
        assert!(!contexts[2].options.has_aggregates());
        assert!(contexts[1].options.has_aggregates());
    }
}
