//! Cross-datastore relationship test matrix for a federated GraphQL engine.
//!
//! `relmatrix` provisions an `artist` table (or remote schema) on one backend
//! and an `album` table on another, wires an `albums` relationship between
//! them through engine metadata, and runs a fixed assertion suite over every
//! LHS x RHS pairing.
//!
//! # Quick Start
//!
//! ```ignore
//! use relmatrix::prelude::*;
//!
//! relmatrix::logging::init();
//! let config = HarnessConfig::from_env()?;
//! let report = relmatrix::run_matrix(&config)?;
//! report.assert_success();
//! ```
//!
//! # Building blocks
//!
//! - [`Context`] / [`LhsFactory`] / [`RhsContext`]: setup and teardown units
//! - [`combine`] / [`combinations`]: the LHS x RHS product
//! - [`BackendProvider`]: per-backend table provisioning
//! - [`Suite`] / [`relationship_suite`]: the assertions
//! - [`Driver`]: sequential execution with guaranteed teardown

pub mod assert;
pub mod backends;
pub mod combine;
pub mod config;
pub mod context;
pub mod driver;
pub mod engine;
pub mod fixtures;
pub mod logging;
pub mod provider;
pub mod report;
pub mod suite;
pub mod testing;

pub use assert::{AssertionFailure, assert_json_eq, ensure, field, find_by, json_diff};
pub use backends::{LhsKind, LhsLocalState, lhs_factories, matrix, provider_for, rhs_contexts};
pub use combine::{combinations, combine};
pub use config::HarnessConfig;
pub use context::{Context, LhsFactory, RhsContext, collect_teardown};
pub use driver::Driver;
pub use engine::{EngineHandle, tolerate_missing};
pub use provider::{BackendProvider, EngineSqlProvider, SqliteProvider};
pub use report::{CaseReport, CaseStatus, CombinationOutcome, CombinationReport, RunReport};
pub use suite::{Failure, Suite, TestCase, TestGroup, Testbed, relationship_suite};

pub use relmatrix_core::{
    BackendKind, Error, Options, OptionsConflict, Result, Table, TableIdentity,
};
pub use relmatrix_gateway::{CallerIdentity, EngineGateway, GatewayConfig, GraphqlRequest};

/// Connect to the configured engine, run the relationship suite over the
/// configured matrix and leave the engine with empty metadata.
pub fn run_matrix(config: &HarnessConfig) -> Result<RunReport> {
    config.validate()?;
    let engine = EngineHandle::http(config.gateway_config()?)?;
    engine.start(config.startup_timeout())?;

    let contexts = matrix(config)?;
    let report = Driver::new(engine.clone())
        .max_teardown_failures(config.max_teardown_failures)
        .run(&contexts, &relationship_suite());

    if let Err(err) = engine.stop() {
        tracing::warn!(error = %err, "Could not clear engine metadata after the run");
    }
    Ok(report)
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        BackendKind, CallerIdentity, Context, Driver, EngineHandle, Error, HarnessConfig,
        LhsFactory, LhsKind, LhsLocalState, Options, Result, RhsContext, RunReport, Suite,
        TableIdentity, combinations, relationship_suite,
    };
}
