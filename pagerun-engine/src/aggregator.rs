// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deriving run summaries from recorded results.
//!
//! Summaries are never updated incrementally. Every finalization recomputes the counters and the
//! verdict from scratch, so finalizing an unchanged run is idempotent.

use chrono::{DateTime, FixedOffset};
use quick_trx::{Counters, ResultSummary, RunOutcome, TestOutcome, TestRun, UnitTestResult};

/// Computes the summary for a set of results.
pub fn summarize(results: &[UnitTestResult]) -> ResultSummary {
    let mut counters = Counters::default();
    for result in results {
        classify(&result.outcome, &mut counters);
    }
    counters.total = results.len();

    ResultSummary {
        outcome: verdict(&counters),
        counters,
    }
}

/// Returns the overall verdict for a set of counters.
///
/// Any failure wins. Otherwise every result must have passed, and there must be at least one.
pub fn verdict(counters: &Counters) -> RunOutcome {
    if counters.failed != 0 {
        RunOutcome::Failed
    } else if counters.total == 0 || counters.passed < counters.total {
        RunOutcome::Inconclusive
    } else {
        RunOutcome::Passed
    }
}

/// Recomputes the summary of `run` and stamps its finish time.
pub fn finalize(run: &mut TestRun, now: DateTime<FixedOffset>) {
    run.result_summary = summarize(&run.results);
    run.times.finish = now;
}

fn classify(outcome: &TestOutcome, counters: &mut Counters) {
    match outcome {
        TestOutcome::InProgress => {
            counters.executed += 1;
            counters.in_progress += 1;
        }
        TestOutcome::Failed => {
            counters.executed += 1;
            counters.completed += 1;
            counters.failed += 1;
        }
        TestOutcome::Passed => {
            counters.executed += 1;
            counters.completed += 1;
            counters.passed += 1;
        }
        // Only reachable through reports read back from elsewhere.
        TestOutcome::Other(_) => {
            counters.failed += 1;
        }
    }
}
