//! Driver lifecycle: teardown guarantees, abort rules and the fatal threshold.

use std::sync::Arc;

use relmatrix::testing::{EventLog, RecordingGateway};
use relmatrix::{
    AssertionFailure, CaseStatus, CombinationOutcome, Context, Driver, EngineHandle, Error,
    Failure, LhsFactory, RhsContext, Suite, TableIdentity, TestCase, TestGroup, combinations,
};

fn engine() -> EngineHandle {
    EngineHandle::new(Arc::new(RecordingGateway::new()))
}

/// A context that logs its steps; `fail` picks which step errors.
fn logged(name: &'static str, log: &EventLog, fail: Option<&'static str>) -> Context<()> {
    let setup_log = log.clone();
    let teardown_log = log.clone();
    Context::unit(name)
        .with_setup(move |_, _| {
            setup_log.push(format!("{name} setup"));
            match fail {
                Some("setup") => Err(Error::Custom(format!("{name} setup failed"))),
                _ => Ok(()),
            }
        })
        .with_teardown(move |_, _| {
            teardown_log.push(format!("{name} teardown"));
            match fail {
                Some("teardown") => Err(Error::Custom(format!("{name} teardown failed"))),
                _ => Ok(()),
            }
        })
}

fn logging_suite(log: &EventLog) -> Suite<()> {
    let first = log.clone();
    let second = log.clone();
    Suite::new().group(
        TestGroup::new("group")
            .case(TestCase::new("first", move |_| {
                first.push("case first");
                Ok(())
            }))
            .case(TestCase::new("second", move |_| {
                second.push("case second");
                Ok(())
            })),
    )
}

#[test]
fn passing_combination_runs_everything_once() {
    let log = EventLog::default();
    let report = Driver::new(engine()).run(&[logged("ok", &log, None)], &logging_suite(&log));

    report.assert_success();
    assert_eq!(
        log.events(),
        vec!["ok setup", "case first", "case second", "ok teardown"]
    );
    let combination = &report.combinations[0];
    assert_eq!(combination.cases.len(), 2);
    assert!(combination.cases.iter().all(|c| c.status == CaseStatus::Passed));
}

#[test]
fn setup_failure_skips_cases_but_tears_down() {
    let log = EventLog::default();
    let report = Driver::new(engine()).run(
        &[logged("broken", &log, Some("setup"))],
        &logging_suite(&log),
    );

    assert_eq!(log.events(), vec!["broken setup", "broken teardown"]);
    assert!(matches!(
        &report.combinations[0].outcome,
        CombinationOutcome::SetupFailed { message } if message == "broken setup failed"
    ));
    assert!(report.combinations[0].cases.is_empty());
    assert!(!report.is_success());
}

#[test]
fn local_state_failure_skips_setup_and_teardown() {
    let log = EventLog::default();
    let setup_log = log.clone();
    let teardown_log = log.clone();
    let context = Context::new("no_state", |_: &EngineHandle| -> relmatrix::Result<u8> {
        Err(Error::Custom("server would not start".into()))
    })
    .with_setup(move |_, _| {
        setup_log.push("setup");
        Ok(())
    })
    .with_teardown(move |_, _| {
        teardown_log.push("teardown");
        Ok(())
    });

    let report = Driver::new(engine()).run(&[context], &Suite::new());
    assert!(log.events().is_empty());
    assert!(matches!(
        report.combinations[0].outcome,
        CombinationOutcome::LocalStateFailed { .. }
    ));
    assert!(report.combinations[0].teardown_error.is_none());
}

#[test]
fn first_failing_case_aborts_the_rest() {
    let log = EventLog::default();
    let after = log.clone();
    let suite = Suite::new()
        .group(TestGroup::new("a").case(TestCase::new("fails", |_| {
            Err(Failure::Assertion(AssertionFailure::new("albums differ")))
        })))
        .group(TestGroup::new("b").case(TestCase::new("never", move |_| {
            after.push("never ran");
            Ok(())
        })));

    let report = Driver::new(engine()).run(&[logged("ctx", &log, None)], &suite);

    assert_eq!(log.events(), vec!["ctx setup", "ctx teardown"]);
    let combination = &report.combinations[0];
    assert_eq!(
        combination.outcome,
        CombinationOutcome::CaseFailed {
            case: "a::fails".to_string(),
            message: "albums differ".to_string(),
        }
    );
    assert!(matches!(
        combination.case("b", "never").map(|c| &c.status),
        Some(CaseStatus::Skipped(_))
    ));
}

#[test]
fn panicking_case_is_a_failure_and_teardown_still_runs() {
    let log = EventLog::default();
    let suite = Suite::new().group(TestGroup::new("g").case(TestCase::new("panics", |_| {
        panic!("index out of bounds");
    })));

    let report = Driver::new(engine()).run(&[logged("ctx", &log, None)], &suite);

    assert_eq!(log.events(), vec!["ctx setup", "ctx teardown"]);
    match &report.combinations[0].outcome {
        CombinationOutcome::CaseFailed { message, .. } => {
            assert_eq!(message, "panicked: index out of bounds");
        }
        other => panic!("unexpected outcome: {other}"),
    }
}

#[test]
fn panicking_setup_still_tears_down() {
    let log = EventLog::default();
    let teardown_log = log.clone();
    let context = Context::unit("panicky")
        .with_setup(|_, _| panic!("setup exploded"))
        .with_teardown(move |_, _| {
            teardown_log.push("teardown");
            Ok(())
        });

    let report = Driver::new(engine()).run(&[context], &Suite::new());
    assert_eq!(log.events(), vec!["teardown"]);
    assert!(matches!(
        &report.combinations[0].outcome,
        CombinationOutcome::SetupFailed { message } if message.contains("setup exploded")
    ));
}

#[test]
fn teardown_failures_reach_the_fatal_threshold() {
    let log = EventLog::default();
    let contexts = vec![
        logged("one", &log, Some("teardown")),
        logged("two", &log, None),
        logged("three", &log, Some("teardown")),
        logged("four", &log, None),
        logged("five", &log, None),
    ];

    let report = Driver::new(engine()).run(&contexts, &Suite::new());

    assert_eq!(report.combinations.len(), 5);
    assert_eq!(report.teardown_failures(), 2);
    assert!(report.fatal.is_some());
    assert!(report.combinations[0].outcome.is_passed());
    assert_eq!(
        report.combinations[0].teardown_error.as_deref(),
        Some("one teardown failed")
    );
    for skipped in &report.combinations[3..] {
        assert!(matches!(skipped.outcome, CombinationOutcome::Skipped { .. }));
    }
    assert!(!log.events().iter().any(|e| e.starts_with("four")));
    assert!(!report.is_success());
}

#[test]
fn threshold_is_configurable() {
    let log = EventLog::default();
    let contexts = vec![logged("one", &log, Some("teardown")), logged("two", &log, None)];

    let report = Driver::new(engine())
        .max_teardown_failures(1)
        .run(&contexts, &Suite::new());
    assert!(report.fatal.is_some());
    assert!(matches!(
        report.combinations[1].outcome,
        CombinationOutcome::Skipped { .. }
    ));
}

#[test]
fn combined_contexts_clear_metadata_and_report_both_teardowns() {
    let log = EventLog::default();
    let gateway = Arc::new(RecordingGateway::new().with_log(log.clone()));
    let engine = EngineHandle::new(gateway);

    let lhs_log = log.clone();
    let lhs = LhsFactory::new("lhs", move |_: &TableIdentity| {
        logged("lhs", &lhs_log, Some("teardown"))
    });
    let rhs = RhsContext::new(
        TableIdentity::path("target", "album"),
        logged("rhs", &log, Some("teardown")),
    );
    let contexts = combinations(&[lhs], &[rhs]).unwrap();

    let report = Driver::new(engine)
        .max_teardown_failures(5)
        .run(&contexts, &Suite::new());

    assert_eq!(
        log.events(),
        vec![
            "metadata clear_metadata",
            "rhs setup",
            "lhs setup",
            "lhs teardown",
            "rhs teardown",
        ]
    );
    let teardown = report.combinations[0].teardown_error.as_deref().unwrap();
    assert!(teardown.starts_with("Teardown failed in 2 step(s)"));
    assert!(teardown.contains("lhs teardown failed"));
    assert!(teardown.contains("rhs teardown failed"));
}
