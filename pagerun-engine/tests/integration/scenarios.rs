// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::{timestamp, untagged_registry};
use color_eyre::eyre::Result;
use pagerun_engine::{errors::ErrorKind, ids::RunUuid};
use pretty_assertions::assert_eq;
use quick_trx::{Counters, RunOutcome, TestOutcome, TestRun};

#[test]
fn failing_test_is_reported() -> Result<()> {
    let registry = untagged_registry();
    let run_id = registry.create_run()?;

    registry.log_test_start(run_id, "t1", timestamp(0))?;
    registry.log_assert(run_id, "t1", false, "values differ", "2", "3")?;
    registry.log_test_done(run_id, "t1", 1, 1, timestamp(1))?;

    let run = registry.finalized_run(run_id)?;
    assert_eq!(run.results.len(), 1);
    let result = &run.results[0];
    assert_eq!(result.test_name, "t1");
    assert_eq!(result.outcome, TestOutcome::Failed);
    assert!(!result.error_message.is_empty());

    assert_eq!(run.result_summary.outcome, RunOutcome::Failed);
    assert_eq!(
        run.result_summary.counters,
        Counters {
            total: 1,
            executed: 1,
            completed: 1,
            failed: 1,
            ..Counters::default()
        }
    );
    Ok(())
}

#[test]
fn pages_are_handed_out_in_order() -> Result<()> {
    let registry = untagged_registry();
    let run_id = registry.create_run()?;

    assert_eq!(registry.set_pages(run_id, "a.html,b.html", None)?, 2);
    assert_eq!(registry.advance_page(run_id)?.as_deref(), Some("a.html"));
    assert_eq!(registry.advance_page(run_id)?.as_deref(), Some("b.html"));
    assert!(registry.is_in_progress(run_id)?);

    assert_eq!(registry.advance_page(run_id)?, None);
    assert!(!registry.is_in_progress(run_id)?);
    assert_eq!(registry.advance_page(run_id)?, None);

    // Finalizing replaces the completed signal with the verdict.
    let run = registry.finalized_run(run_id)?;
    assert_eq!(run.result_summary.outcome, RunOutcome::Inconclusive);
    Ok(())
}

#[test]
fn second_pass_over_the_same_run() -> Result<()> {
    let registry = untagged_registry();
    let run_id = registry.create_run()?;

    for browser in ["chrome", "firefox"] {
        registry.mark_in_progress(run_id)?;
        registry.set_name_prefix(run_id, &format!("{browser}: "))?;
        registry.set_pages(run_id, "suite.html", None)?;
        while let Some(page) = registry.advance_page(run_id)? {
            assert_eq!(page, "suite.html");
            registry.log_test_start(run_id, "math", timestamp(0))?;
            registry.log_assert(run_id, "math", true, "1 + 1 == 2", "2", "2")?;
            registry.log_test_done(run_id, "math", 0, 1, timestamp(2))?;
        }
        assert!(!registry.is_in_progress(run_id)?);
    }

    let run = registry.finalized_run(run_id)?;
    let names: Vec<_> = run.results.iter().map(|r| r.test_name.as_str()).collect();
    assert_eq!(names, vec!["chrome: math", "firefox: math"]);
    assert_eq!(run.result_summary.outcome, RunOutcome::Passed);
    assert_eq!(run.result_summary.counters.passed, 2);
    Ok(())
}

#[test]
fn unknown_run_is_not_found_everywhere() -> Result<()> {
    let registry = untagged_registry();
    let run_id = RunUuid::new_v4();

    let errors = [
        registry.set_pages(run_id, "a.html", None).map(drop),
        registry.is_in_progress(run_id).map(drop),
        registry.get_report(run_id).map(drop),
        registry.log_assert(run_id, "t", true, "m", "a", "e"),
        registry.log_test_start(run_id, "t", timestamp(0)),
        registry.log_test_done(run_id, "t", 0, 0, timestamp(0)),
        registry.mark_in_progress(run_id),
        registry.set_name_prefix(run_id, "p"),
        registry.advance_page(run_id).map(drop),
    ];
    for result in errors {
        let error = result.expect_err("run does not exist");
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
    assert!(registry.list_active()?.is_empty());
    Ok(())
}

#[test]
fn empty_run_is_inconclusive() -> Result<()> {
    let registry = untagged_registry();
    let run_id = registry.create_run()?;
    let run = registry.finalized_run(run_id)?;
    assert_eq!(run.result_summary.outcome, RunOutcome::Inconclusive);
    assert_eq!(run.result_summary.counters, Counters::default());
    Ok(())
}

#[test]
fn rendered_report_round_trips() -> Result<()> {
    let registry = untagged_registry();
    let run_id = registry.create_run()?;

    registry.log_test_start(run_id, "passes", timestamp(0))?;
    registry.log_test_done(run_id, "passes", 0, 1, timestamp(1))?;
    registry.log_test_start(run_id, "fails <badly> & loudly", timestamp(2))?;
    registry.log_assert(run_id, "fails <badly> & loudly", true, "ok so far", "", "")?;
    registry.log_assert(run_id, "fails <badly> & loudly", false, "then \"not\"", "1", "0")?;
    registry.log_test_done(run_id, "fails <badly> & loudly", 1, 2, timestamp(3))?;
    registry.log_test_start(run_id, "hangs", timestamp(4))?;

    let xml = registry.get_report(run_id)?;
    let parsed = TestRun::deserialize_from_str(&xml)?;
    let finalized = registry.finalized_run(run_id)?;

    assert_eq!(parsed.id, finalized.id);
    assert_eq!(parsed.settings, finalized.settings);
    assert_eq!(parsed.test_lists, finalized.test_lists);
    assert_eq!(parsed.test_definitions, finalized.test_definitions);
    assert_eq!(parsed.test_entries, finalized.test_entries);
    assert_eq!(parsed.results, finalized.results);
    assert_eq!(parsed.result_summary, finalized.result_summary);
    assert_eq!(parsed.result_summary.outcome, RunOutcome::Failed);
    Ok(())
}

#[test]
fn failing_assert_without_message_reaches_report() -> Result<()> {
    let registry = untagged_registry();
    let run_id = registry.create_run()?;

    registry.log_test_start(run_id, "t1", timestamp(0))?;
    registry.log_assert(run_id, "t1", false, "", "1", "2")?;
    registry.log_test_done(run_id, "t1", 1, 1, timestamp(1))?;

    let xml = registry.get_report(run_id)?;
    let parsed = TestRun::deserialize_from_str(&xml)?;
    let finalized = registry.finalized_run(run_id)?;

    assert_eq!(finalized.results[0].debug_trace, "\n");
    assert_eq!(
        finalized.results[0].error_message,
        "\nExpected: 2\nActual: 1\n"
    );
    assert_eq!(parsed.results, finalized.results);
    Ok(())
}

#[test]
fn nil_run_report_omits_run_id() -> Result<()> {
    let registry = untagged_registry();
    let run_id = RunUuid::from_u128(0);

    registry.log_test_start(run_id, "adhoc", timestamp(0))?;
    registry.log_test_done(run_id, "adhoc", 0, 1, timestamp(1))?;

    let xml = registry.get_report(run_id)?;
    let run_element = xml
        .lines()
        .find(|line| line.trim_start().starts_with("<TestRun"))
        .expect("report has a TestRun element");
    assert!(
        !run_element.contains(" id=\""),
        "nil run id is not rendered: {run_element}"
    );
    assert!(TestRun::deserialize_from_str(&xml)?.id.is_nil());
    Ok(())
}
