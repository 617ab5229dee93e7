//! Run reports.

use std::fmt;

use serde::Serialize;

/// Result of one case in one combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed(String),
    /// Not applicable to this combination, or aborted by an earlier failure
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    pub group: String,
    pub name: String,
    pub status: CaseStatus,
    pub duration_ms: u64,
}

impl CaseReport {
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.group, self.name)
    }
}

/// How a combination ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CombinationOutcome {
    Passed,
    /// Local state could not be built; nothing was set up or torn down.
    LocalStateFailed { message: String },
    /// Setup failed; no case ran.
    SetupFailed { message: String },
    /// A case failed; later cases were skipped.
    CaseFailed { case: String, message: String },
    /// Never started because the run stopped.
    Skipped { reason: String },
}

impl CombinationOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, CombinationOutcome::Passed)
    }
}

impl fmt::Display for CombinationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombinationOutcome::Passed => write!(f, "passed"),
            CombinationOutcome::LocalStateFailed { message } => {
                write!(f, "local state failed: {}", message)
            }
            CombinationOutcome::SetupFailed { message } => write!(f, "setup failed: {}", message),
            CombinationOutcome::CaseFailed { case, message } => {
                write!(f, "{} failed: {}", case, message)
            }
            CombinationOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinationReport {
    pub name: String,
    pub outcome: CombinationOutcome,
    pub cases: Vec<CaseReport>,
    /// Set when teardown failed; reported as a warning
    pub teardown_error: Option<String>,
    pub duration_ms: u64,
}

impl CombinationReport {
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: CombinationOutcome::Skipped {
                reason: reason.into(),
            },
            cases: Vec::new(),
            teardown_error: None,
            duration_ms: 0,
        }
    }

    pub fn case(&self, group: &str, name: &str) -> Option<&CaseReport> {
        self.cases
            .iter()
            .find(|case| case.group == group && case.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub combinations: Vec<CombinationReport>,
    /// Why the run stopped early, if it did
    pub fatal: Option<String>,
}

impl RunReport {
    /// True when every combination passed and the run was not cut short.
    pub fn is_success(&self) -> bool {
        self.fatal.is_none() && self.combinations.iter().all(|c| c.outcome.is_passed())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CombinationReport> {
        self.combinations
            .iter()
            .filter(|c| !c.outcome.is_passed())
    }

    pub fn teardown_failures(&self) -> usize {
        self.combinations
            .iter()
            .filter(|c| c.teardown_error.is_some())
            .count()
    }

    pub fn combination(&self, name: &str) -> Option<&CombinationReport> {
        self.combinations.iter().find(|c| c.name == name)
    }

    pub fn to_json(&self) -> relmatrix_core::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Panic with the report unless the run succeeded.
    #[track_caller]
    pub fn assert_success(&self) {
        assert!(self.is_success(), "relationship matrix failed:\n{}", self);
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let passed = self
            .combinations
            .iter()
            .filter(|c| c.outcome.is_passed())
            .count();
        writeln!(
            f,
            "{} of {} combination(s) passed",
            passed,
            self.combinations.len()
        )?;
        for combination in &self.combinations {
            writeln!(f, "  {}: {}", combination.name, combination.outcome)?;
            if let Some(err) = &combination.teardown_error {
                writeln!(f, "    teardown: {}", err)?;
            }
        }
        if let Some(fatal) = &self.fatal {
            writeln!(f, "  run stopped: {}", fatal)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: CombinationOutcome) -> CombinationReport {
        CombinationReport {
            name: "from postgres to sqlite".to_string(),
            outcome,
            cases: vec![CaseReport {
                group: "execution".to_string(),
                name: "matching_rows".to_string(),
                status: CaseStatus::Passed,
                duration_ms: 3,
            }],
            teardown_error: None,
            duration_ms: 10,
        }
    }

    #[test]
    fn success_and_summary() {
        let run = RunReport {
            combinations: vec![report(CombinationOutcome::Passed)],
            fatal: None,
        };
        assert!(run.is_success());
        run.assert_success();
        assert!(run.to_string().starts_with("1 of 1 combination(s) passed"));
        assert_eq!(
            run.combinations[0]
                .case("execution", "matching_rows")
                .map(CaseReport::full_name)
                .as_deref(),
            Some("execution::matching_rows")
        );
    }

    #[test]
    #[should_panic(expected = "relationship matrix failed")]
    fn assert_success_panics_on_failure() {
        RunReport {
            combinations: vec![report(CombinationOutcome::SetupFailed {
                message: "pg_add_source failed".to_string(),
            })],
            fatal: None,
        }
        .assert_success();
    }

    #[test]
    fn serializes_outcomes() {
        let mut failed = report(CombinationOutcome::CaseFailed {
            case: "permission::row_filter".to_string(),
            message: "albums differ".to_string(),
        });
        failed.teardown_error = Some("pg_drop_source failed".to_string());
        let run = RunReport {
            combinations: vec![failed],
            fatal: Some("too many teardown failures".to_string()),
        };
        let json: serde_json::Value = serde_json::from_str(&run.to_json().unwrap()).unwrap();
        assert_eq!(json["combinations"][0]["outcome"]["outcome"], "case_failed");
        assert_eq!(json["combinations"][0]["cases"][0]["status"]["status"], "passed");
        assert_eq!(run.teardown_failures(), 1);
        assert!(!run.is_success());
    }
}
