//! Combining LHS and RHS contexts into the test matrix.
//!
//! A combined context:
//!
//! - clears engine metadata, then sets up the RHS, then the LHS (the LHS
//!   relationship refers to the RHS table, so the RHS must exist first);
//! - tears down the LHS, then the RHS (relationship metadata goes before the
//!   table it points at);
//! - keeps the LHS's local state;
//! - merges both option sets, rejecting conflicts up front.

use std::sync::Arc;

use relmatrix_core::{Error, OptionsConflict, Result};

use crate::context::{Context, LhsFactory, RhsContext};
use crate::engine::EngineHandle;

/// Combine one LHS factory with one RHS context.
pub fn combine<L: 'static>(
    lhs: &LhsFactory<L>,
    rhs: &RhsContext,
) -> std::result::Result<Context<L>, Vec<OptionsConflict>> {
    let lhs_context = lhs.context_for(&rhs.identity);
    let name = format!("from {} to {}", lhs_context.name, rhs.name());

    let options = lhs_context
        .options
        .merge(&rhs.context.options)
        .map_err(|conflicts| {
            conflicts
                .into_iter()
                .map(|mut conflict| {
                    conflict.context = Some(name.clone());
                    conflict
                })
                .collect::<Vec<_>>()
        })?;

    let lhs_setup = Arc::clone(&lhs_context.setup);
    let rhs_setup = Arc::clone(&rhs.context.setup);
    let setup = move |engine: &EngineHandle, local: &L| -> Result<()> {
        engine.clear_metadata()?;
        rhs_setup(engine, &())?;
        lhs_setup(engine, local)
    };

    let lhs_teardown = Arc::clone(&lhs_context.teardown);
    let rhs_teardown = Arc::clone(&rhs.context.teardown);
    let teardown = move |engine: &EngineHandle, local: &L| -> Result<()> {
        let mut errors = Vec::new();
        if let Err(err) = lhs_teardown(engine, local) {
            errors.push(err);
        }
        // Runs even when the LHS failed so RHS tables are not leaked.
        if let Err(err) = rhs_teardown(engine, &()) {
            errors.push(err);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Teardown(errors))
        }
    };

    Ok(Context {
        name,
        local_state: lhs_context.local_state,
        setup: Arc::new(setup),
        teardown: Arc::new(teardown),
        options,
    })
}

/// The full matrix, LHS-major: every RHS for the first LHS, then the next.
///
/// All option conflicts are collected before failing so one run of the
/// constructor reports every bad pairing.
pub fn combinations<L: 'static>(
    lhs: &[LhsFactory<L>],
    rhs: &[RhsContext],
) -> Result<Vec<Context<L>>> {
    let mut contexts = Vec::with_capacity(lhs.len() * rhs.len());
    let mut conflicts = Vec::new();

    for factory in lhs {
        for rhs_context in rhs {
            match combine(factory, rhs_context) {
                Ok(context) => contexts.push(context),
                Err(pair_conflicts) => conflicts.extend(pair_conflicts),
            }
        }
    }

    if !conflicts.is_empty() {
        return Err(Error::Options(conflicts));
    }

    tracing::debug!(
        lhs = lhs.len(),
        rhs = rhs.len(),
        combinations = contexts.len(),
        "Built context matrix"
    );
    Ok(contexts)
}
