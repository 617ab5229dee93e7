//! Database-backed RHS holding the `album` table.

use std::sync::Arc;

use relmatrix_core::{BackendKind, Options, Result};

use super::{provision_table, remove_table};
use crate::context::{Context, RhsContext};
use crate::engine::EngineHandle;
use crate::fixtures;
use crate::provider::BackendProvider;

/// Execution hints a backend contributes when it holds the RHS table.
pub fn rhs_options(kind: BackendKind) -> Options {
    match kind {
        BackendKind::Postgres | BackendKind::SqlServer => {
            Options::default().supports_aggregates(true)
        }
        // The SQLite connector exposes no aggregate fields.
        BackendKind::Sqlite => Options::default().supports_aggregates(false),
    }
}

/// RHS context for a database provider: `album` on the `target` source,
/// tracked as `hasura_album`.
pub fn database_rhs(provider: Arc<dyn BackendProvider>) -> RhsContext {
    let kind = provider.kind();
    let identity = provider.identity(fixtures::RHS_SOURCE, "album");

    let setup_provider = Arc::clone(&provider);
    let setup_identity = identity.clone();
    let setup = move |engine: &EngineHandle, _: &()| -> Result<()> {
        provision_table(
            engine,
            setup_provider.as_ref(),
            &setup_identity,
            &fixtures::album_table(),
            fixtures::ALBUM_TYPE,
            fixtures::album_permissions(),
        )
    };

    let teardown_identity = identity.clone();
    let teardown = move |engine: &EngineHandle, _: &()| -> Result<()> {
        remove_table(
            engine,
            provider.as_ref(),
            &teardown_identity,
            &fixtures::album_table(),
            Vec::new(),
        )
    };

    RhsContext::new(
        identity,
        Context::unit(kind.name())
            .with_setup(setup)
            .with_teardown(teardown)
            .with_options(rhs_options(kind)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SqliteProvider;
    use crate::testing::RecordingGateway;
    use relmatrix_core::TableIdentity;
    use relmatrix_sqlite::SqliteConnection;

    #[test]
    fn sqlite_rhs_provisions_and_removes_album() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SqliteProvider::new(dir.path());
        let db = provider.database_path("target");
        let rhs = database_rhs(Arc::new(provider));
        assert_eq!(rhs.identity, TableIdentity::path("target", "album"));
        assert_eq!(rhs.name(), "sqlite");
        assert!(!rhs.context.options.has_aggregates());

        let gateway = Arc::new(RecordingGateway::new());
        let engine = EngineHandle::new(gateway.clone());
        rhs.context.run_setup(&engine, &()).unwrap();
        assert_eq!(
            gateway.metadata_types(),
            vec![
                "sqlite_add_source",
                "sqlite_track_table",
                "sqlite_create_select_permission",
                "sqlite_create_select_permission",
            ]
        );
        let conn = SqliteConnection::open_file(&db).unwrap();
        assert_eq!(conn.query_rows("SELECT id FROM album").unwrap().len(), 3);

        // Provisioning twice recovers from a table left behind.
        rhs.context.run_setup(&engine, &()).unwrap();
        assert_eq!(conn.query_rows("SELECT id FROM album").unwrap().len(), 3);

        rhs.context.run_teardown(&engine, &()).unwrap();
        assert!(!conn.table_exists("album").unwrap());
    }

    #[test]
    fn sql_backends_support_aggregates() {
        assert!(rhs_options(BackendKind::Postgres).has_aggregates());
        assert!(rhs_options(BackendKind::SqlServer).has_aggregates());
    }
}
