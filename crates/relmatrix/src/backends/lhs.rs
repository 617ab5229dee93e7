//! Database-backed LHS: the `artist` table plus the `albums` relationship.

use std::sync::Arc;

use relmatrix_core::{Options, RelationshipSource, Result, TableIdentity};
use relmatrix_gateway::MetadataCall;

use super::{LhsLocalState, provision_table, remove_table};
use crate::context::{Context, LhsFactory};
use crate::engine::{EngineHandle, tolerate_missing};
use crate::fixtures;
use crate::provider::BackendProvider;

/// LHS factory for a database provider.
///
/// Setup registers the `source` source, creates and fills `artist`, tracks it
/// as `hasura_artist`, grants both roles and finally creates `albums`
/// pointing at `target`.
pub fn database_lhs(provider: Arc<dyn BackendProvider>) -> LhsFactory<LhsLocalState> {
    let name = provider.kind().name();
    LhsFactory::new(name, move |target: &TableIdentity| {
        let identity = provider.identity(fixtures::LHS_SOURCE, "artist");
        let relationship = fixtures::albums_relationship(
            RelationshipSource::Table(identity.clone()),
            target,
        );
        let kind = provider.kind();

        let setup_provider = Arc::clone(&provider);
        let setup_identity = identity.clone();
        let setup = move |engine: &EngineHandle, _: &LhsLocalState| -> Result<()> {
            let artist = fixtures::artist_table();
            relationship.validate(&artist, &fixtures::album_table())?;
            provision_table(
                engine,
                setup_provider.as_ref(),
                &setup_identity,
                &artist,
                fixtures::ARTIST_TYPE,
                fixtures::artist_permissions(),
            )?;
            tracing::debug!(
                relationship = %relationship.name,
                target = %relationship.target,
                "Creating remote relationship"
            );
            engine.metadata(&MetadataCall::CreateRemoteRelationship {
                kind,
                relationship: relationship.clone(),
            })?;
            Ok(())
        };

        let teardown_provider = Arc::clone(&provider);
        let teardown = move |engine: &EngineHandle, _: &LhsLocalState| -> Result<()> {
            let relationship = tolerate_missing(engine.metadata(
                &MetadataCall::DeleteRemoteRelationship {
                    kind,
                    table: identity.clone(),
                    name: fixtures::RELATIONSHIP.to_string(),
                },
            ));
            remove_table(
                engine,
                teardown_provider.as_ref(),
                &identity,
                &fixtures::artist_table(),
                vec![relationship],
            )
        };

        Context::new(name, |_: &EngineHandle| Ok(LhsLocalState::Database))
            .with_setup(setup)
            .with_teardown(teardown)
            .with_options(Options::default())
    })
}
