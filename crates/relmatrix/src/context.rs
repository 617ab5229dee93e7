//! Contexts: one named, self-contained setup/teardown unit.
//!
//! A [`Context`] provisions one side (or, once combined, both sides) of a
//! relationship test. Its local state is built by a factory before setup and
//! handed to both setup and teardown; `Drop` on that state releases anything
//! it owns (an auxiliary server process, for instance).

use std::sync::Arc;

use relmatrix_core::{Error, Options, Result, TableIdentity};

use crate::engine::EngineHandle;

/// Builds a context's local state.
pub type LocalStateFn<L> = Arc<dyn Fn(&EngineHandle) -> Result<L> + Send + Sync>;

/// A setup or teardown step.
pub type StepFn<L> = Arc<dyn Fn(&EngineHandle, &L) -> Result<()> + Send + Sync>;

/// A named setup/teardown unit with its execution hints.
///
/// `teardown` must undo exactly what `setup` did for the same local state and
/// must be safe to run after a `setup` that failed partway.
pub struct Context<L> {
    pub name: String,
    pub local_state: LocalStateFn<L>,
    pub setup: StepFn<L>,
    pub teardown: StepFn<L>,
    pub options: Options,
}

impl<L> Clone for Context<L> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            local_state: Arc::clone(&self.local_state),
            setup: Arc::clone(&self.setup),
            teardown: Arc::clone(&self.teardown),
            options: self.options.clone(),
        }
    }
}

impl<L> std::fmt::Debug for Context<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn no_op<L>() -> StepFn<L> {
    Arc::new(|_: &EngineHandle, _: &L| Ok(()))
}

impl<L: 'static> Context<L> {
    /// A context whose local state comes from `local_state` and whose setup
    /// and teardown do nothing yet.
    pub fn new(
        name: impl Into<String>,
        local_state: impl Fn(&EngineHandle) -> Result<L> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            local_state: Arc::new(local_state),
            setup: no_op(),
            teardown: no_op(),
            options: Options::default(),
        }
    }

    pub fn with_setup(
        mut self,
        setup: impl Fn(&EngineHandle, &L) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.setup = Arc::new(setup);
        self
    }

    pub fn with_teardown(
        mut self,
        teardown: impl Fn(&EngineHandle, &L) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.teardown = Arc::new(teardown);
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }
}

impl<L> Context<L> {
    pub fn build_local_state(&self, engine: &EngineHandle) -> Result<L> {
        (self.local_state)(engine)
    }

    pub fn run_setup(&self, engine: &EngineHandle, local: &L) -> Result<()> {
        (self.setup)(engine, local)
    }

    pub fn run_teardown(&self, engine: &EngineHandle, local: &L) -> Result<()> {
        (self.teardown)(engine, local)
    }
}

impl Context<()> {
    /// A context without local state.
    pub fn unit(name: impl Into<String>) -> Self {
        Context::new(name, |_: &EngineHandle| Ok(()))
    }
}

/// Builds the LHS context for a given RHS table.
///
/// The LHS needs nothing from the RHS except where its table lives, so the
/// factory only ever sees the [`TableIdentity`].
pub struct LhsFactory<L> {
    pub name: String,
    build: Arc<dyn Fn(&TableIdentity) -> Context<L> + Send + Sync>,
}

impl<L> Clone for LhsFactory<L> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            build: Arc::clone(&self.build),
        }
    }
}

impl<L> std::fmt::Debug for LhsFactory<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LhsFactory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<L> LhsFactory<L> {
    pub fn new(
        name: impl Into<String>,
        build: impl Fn(&TableIdentity) -> Context<L> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            build: Arc::new(build),
        }
    }

    /// The LHS context targeting `target`.
    pub fn context_for(&self, target: &TableIdentity) -> Context<L> {
        (self.build)(target)
    }
}

/// An RHS context plus the identity of the table it provisions.
///
/// RHS contexts carry no local state.
#[derive(Debug, Clone)]
pub struct RhsContext {
    pub identity: TableIdentity,
    pub context: Context<()>,
}

impl RhsContext {
    pub fn new(identity: TableIdentity, context: Context<()>) -> Self {
        Self { identity, context }
    }

    pub fn name(&self) -> &str {
        &self.context.name
    }
}

/// Fold the outcomes of independent cleanup steps into one result.
///
/// A single failure is returned as-is; several become [`Error::Teardown`].
pub fn collect_teardown(results: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    let mut errors: Vec<Error> = results.into_iter().filter_map(Result::err).collect();
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(Error::Teardown(errors)),
    }
}
