//! Test suite driver.
//!
//! Runs every combination strictly in sequence against one engine:
//!
//! 1. build local state (failure: nothing to tear down),
//! 2. setup (failure: no case runs),
//! 3. cases in order, stopping at the first failure,
//! 4. teardown, whenever setup was attempted.
//!
//! Panics in any step are caught and reported like errors. Once
//! `max_teardown_failures` teardowns have failed the engine is considered
//! polluted and the remaining combinations are skipped.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use crate::context::Context;
use crate::engine::EngineHandle;
use crate::report::{CaseReport, CaseStatus, CombinationOutcome, CombinationReport, RunReport};
use crate::suite::{Suite, Testbed};

/// Default number of failed teardowns that stops a run.
pub const DEFAULT_MAX_TEARDOWN_FAILURES: usize = 2;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Run `f`, turning both errors and panics into a message.
fn guarded<T, E: std::fmt::Display>(f: impl FnOnce() -> Result<T, E>) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Sequential driver over a set of combined contexts.
#[derive(Debug, Clone)]
pub struct Driver {
    engine: EngineHandle,
    max_teardown_failures: usize,
}

impl Driver {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            max_teardown_failures: DEFAULT_MAX_TEARDOWN_FAILURES,
        }
    }

    /// Stop the run after this many teardown failures (at least 1).
    pub fn max_teardown_failures(mut self, max: usize) -> Self {
        self.max_teardown_failures = max.max(1);
        self
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Run `suite` in every context, in order.
    pub fn run<L>(&self, contexts: &[Context<L>], suite: &Suite<L>) -> RunReport {
        let mut report = RunReport::default();
        let mut teardown_failures = 0usize;

        for (index, context) in contexts.iter().enumerate() {
            let combination = self.run_combination(context, suite);
            if combination.teardown_error.is_some() {
                teardown_failures += 1;
            }
            report.combinations.push(combination);

            if teardown_failures >= self.max_teardown_failures {
                let reason = format!(
                    "stopped after {} teardown failure(s); engine state can no longer be trusted",
                    teardown_failures
                );
                tracing::error!(
                    teardown_failures,
                    remaining = contexts.len() - index - 1,
                    "Teardown failure limit reached; stopping run"
                );
                for skipped in &contexts[index + 1..] {
                    report
                        .combinations
                        .push(CombinationReport::skipped(&skipped.name, reason.clone()));
                }
                report.fatal = Some(reason);
                break;
            }
        }

        tracing::info!(
            combinations = report.combinations.len(),
            failed = report.failures().count(),
            "Run finished"
        );
        report
    }

    fn run_combination<L>(&self, context: &Context<L>, suite: &Suite<L>) -> CombinationReport {
        let started = Instant::now();
        let name = context.name.as_str();
        tracing::info!(combination = %name, "Starting combination");

        let mut report = CombinationReport {
            name: name.to_string(),
            outcome: CombinationOutcome::Passed,
            cases: Vec::new(),
            teardown_error: None,
            duration_ms: 0,
        };

        let local = match guarded(|| context.build_local_state(&self.engine)) {
            Ok(local) => local,
            Err(message) => {
                tracing::warn!(combination = %name, error = %message, "Could not build local state");
                report.outcome = CombinationOutcome::LocalStateFailed { message };
                report.duration_ms = elapsed_ms(started);
                return report;
            }
        };

        match guarded(|| context.run_setup(&self.engine, &local)) {
            Ok(()) => {
                let bed = Testbed {
                    engine: &self.engine,
                    local: &local,
                    options: &context.options,
                    combination: name,
                };
                let (outcome, cases) = run_cases(&bed, suite);
                report.outcome = outcome;
                report.cases = cases;
            }
            Err(message) => {
                tracing::warn!(combination = %name, error = %message, "Setup failed");
                report.outcome = CombinationOutcome::SetupFailed { message };
            }
        }

        if let Err(message) = guarded(|| context.run_teardown(&self.engine, &local)) {
            tracing::warn!(combination = %name, error = %message, "Teardown failed");
            report.teardown_error = Some(message);
        }
        drop(local);

        report.duration_ms = elapsed_ms(started);
        tracing::info!(
            combination = %name,
            outcome = %report.outcome,
            duration_ms = report.duration_ms,
            "Finished combination"
        );
        report
    }
}

fn run_cases<L>(bed: &Testbed<'_, L>, suite: &Suite<L>) -> (CombinationOutcome, Vec<CaseReport>) {
    let mut outcome = CombinationOutcome::Passed;
    let mut cases = Vec::with_capacity(suite.case_count());

    for (group, case) in suite.cases() {
        let mut record = |status: CaseStatus, duration_ms: u64| {
            cases.push(CaseReport {
                group: group.name.clone(),
                name: case.name.clone(),
                status,
                duration_ms,
            });
        };

        if !outcome.is_passed() {
            record(CaseStatus::Skipped("aborted by an earlier failure".to_string()), 0);
            continue;
        }
        if !case.applies(bed.options) {
            record(
                CaseStatus::Skipped("backend has no aggregate fields".to_string()),
                0,
            );
            continue;
        }

        let started = Instant::now();
        match guarded(|| case.run(bed)) {
            Ok(()) => {
                tracing::debug!(combination = %bed.combination, group = %group.name, case = %case.name, "Case passed");
                record(CaseStatus::Passed, elapsed_ms(started));
            }
            Err(message) => {
                tracing::warn!(
                    combination = %bed.combination,
                    group = %group.name,
                    case = %case.name,
                    error = %message,
                    "Case failed"
                );
                outcome = CombinationOutcome::CaseFailed {
                    case: format!("{}::{}", group.name, case.name),
                    message: message.clone(),
                };
                record(CaseStatus::Failed(message), elapsed_ms(started));
            }
        }
    }
    (outcome, cases)
}
