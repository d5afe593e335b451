// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::{timestamp, untagged_registry};
use color_eyre::eyre::Result;
use pagerun_engine::ids::RunUuid;
use pretty_assertions::assert_eq;
use quick_trx::{RunOutcome, TestOutcome};
use std::{collections::BTreeSet, thread};

const THREADS: usize = 8;
const TESTS_PER_THREAD: usize = 25;

#[test]
fn concurrent_create_run_ids_are_unique() -> Result<()> {
    let registry = untagged_registry();

    let ids: Vec<RunUuid> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    (0..TESTS_PER_THREAD)
                        .map(|_| registry.create_run().expect("registry is healthy"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("thread did not panic"))
            .collect()
    });

    let unique: BTreeSet<_> = ids.iter().copied().collect();
    assert_eq!(unique.len(), THREADS * TESTS_PER_THREAD);
    assert_eq!(registry.list_active()?.len(), unique.len());
    Ok(())
}

#[test]
fn concurrent_reporting_into_one_run() -> Result<()> {
    let registry = untagged_registry();
    let run_id = registry.create_run()?;

    thread::scope(|scope| {
        for thread_index in 0..THREADS {
            let registry = &registry;
            scope.spawn(move || {
                for test_index in 0..TESTS_PER_THREAD {
                    let name = format!("thread{thread_index}-test{test_index}");
                    let failures = u64::from(test_index % 5 == 0);
                    registry
                        .log_test_start(run_id, &name, timestamp(0))
                        .expect("run exists");
                    registry
                        .log_assert(run_id, &name, failures == 0, "checked", "x", "x")
                        .expect("test was started");
                    registry
                        .log_test_done(run_id, &name, failures, 1, timestamp(1))
                        .expect("test was started");
                }
            });
        }
    });

    let run = registry.finalized_run(run_id)?;
    let total = THREADS * TESTS_PER_THREAD;
    let failed = THREADS * TESTS_PER_THREAD.div_ceil(5);
    assert_eq!(run.results.len(), total);
    assert_eq!(run.test_definitions.len(), total);
    assert_eq!(run.result_summary.counters.total, total);
    assert_eq!(run.result_summary.counters.failed, failed);
    assert_eq!(run.result_summary.counters.passed, total - failed);
    assert_eq!(run.result_summary.outcome, RunOutcome::Failed);
    assert!(run.results.iter().all(|r| r.outcome != TestOutcome::InProgress));
    Ok(())
}

#[test]
fn runs_progress_independently() -> Result<()> {
    let registry = untagged_registry();
    let run_ids: Vec<_> = (0..THREADS)
        .map(|_| registry.create_run())
        .collect::<Result<_, _>>()?;

    thread::scope(|scope| {
        for (index, &run_id) in run_ids.iter().enumerate() {
            let registry = &registry;
            scope.spawn(move || {
                let pages: Vec<_> = (0..=index).map(|page| format!("p{page}.html")).collect();
                registry
                    .set_pages(run_id, &pages.join(","), None)
                    .expect("run exists");
                let mut handed_out = vec![];
                while let Some(page) = registry.advance_page(run_id).expect("run exists") {
                    handed_out.push(page);
                }
                assert_eq!(handed_out, pages);
            });
        }
    });

    for run_id in run_ids {
        assert!(!registry.is_in_progress(run_id)?);
    }
    Ok(())
}
