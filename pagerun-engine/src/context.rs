// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-run state and the events that mutate it.
//!
//! A [`RunContext`] is always accessed under its run's lock (see
//! [`RunHandle`](crate::registry::RunHandle)), so methods here take `&mut self` and never lock
//! anything themselves.

use crate::{
    aggregator,
    config::{EngineConfig, PagesConfig},
    errors::EngineError,
    ids::RunUuid,
    pages::tag_page,
};
use chrono::{DateTime, FixedOffset};
use newtype_uuid::GenericUuid;
use quick_trx::{
    RunOutcome, TestList, TestOutcome, TestRun, TestSettings, UnitTest, UnitTestResult, Uuid,
};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// The mutable state of one run: the report being accumulated, the pages still to be handed out,
/// and the prefix applied to logged test names.
#[derive(Clone, Debug)]
pub struct RunContext {
    run_id: RunUuid,
    run: TestRun,
    test_list_id: Uuid,
    pending_pages: VecDeque<String>,
    name_prefix: String,
}

impl RunContext {
    /// Creates the context for a new run owned by `run_user`, with a single empty test list.
    pub fn new(
        run_id: RunUuid,
        config: &EngineConfig,
        run_user: &str,
        now: DateTime<FixedOffset>,
    ) -> Self {
        let name = format!("{run_user} {}", now.format("%Y-%m-%d %H:%M:%S"));
        let test_list_id = Uuid::new_v4();

        let mut run = TestRun::new(run_id.into_untyped_uuid(), name, run_user, now);
        run.set_settings(TestSettings::new(
            Uuid::new_v4(),
            config.report.settings_name.clone(),
        ))
        .add_test_list(TestList::new(
            test_list_id,
            config.report.test_list_name.clone(),
        ));

        Self {
            run_id,
            run,
            test_list_id,
            pending_pages: VecDeque::new(),
            name_prefix: String::new(),
        }
    }

    /// Returns the identifier of this run.
    pub fn run_id(&self) -> RunUuid {
        self.run_id
    }

    /// Returns the report accumulated so far.
    ///
    /// The summary is only current as of the last call to [`Self::finalize`] or to the outcome
    /// signalling methods.
    pub fn run(&self) -> &TestRun {
        &self.run
    }

    /// Returns the prefix applied to subsequently logged test names.
    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// Returns the pages not yet handed out, in order.
    pub fn pending_pages(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.pending_pages.iter().map(String::as_str)
    }

    /// Replaces the pending pages, returning the number stored.
    ///
    /// Pages are replaced rather than appended so that a harness can safely resubmit after a
    /// partial failure.
    pub fn set_pages<I, S>(&mut self, pages: I, filter: Option<&str>, config: &PagesConfig) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.pending_pages = pages
            .into_iter()
            .map(|page| tag_page(page.as_ref(), self.run_id, filter, config))
            .collect();
        debug!(
            "run {}: stored {} pending pages",
            self.run_id,
            self.pending_pages.len()
        );
        self.pending_pages.len()
    }

    /// Replaces the name prefix. Only names logged afterwards are affected.
    pub fn set_name_prefix(&mut self, prefix: impl Into<String>) {
        self.name_prefix = prefix.into();
        debug!("run {}: name prefix set to `{}`", self.run_id, self.name_prefix);
    }

    /// Resets the run outcome to in-progress, so the same run can be used for another pass.
    pub fn mark_in_progress(&mut self) {
        self.run.result_summary.outcome = RunOutcome::InProgress;
        debug!("run {}: marked in progress", self.run_id);
    }

    /// Returns true if the run outcome is currently in-progress.
    pub fn is_in_progress(&self) -> bool {
        self.run.result_summary.outcome == RunOutcome::InProgress
    }

    /// Records the start of a test.
    ///
    /// A new definition, entry and in-progress result are appended every time, so a test that is
    /// started twice has two results. Later events for the name apply to the latest one.
    pub fn log_test_start(&mut self, name: &str, start_time: DateTime<FixedOffset>) {
        let test_name = self.prefixed(name);
        debug!("run {}: test `{test_name}` started", self.run_id);

        let definition = UnitTest::new(Uuid::new_v4(), test_name, Uuid::new_v4());
        let result = UnitTestResult::new(&definition, self.test_list_id, start_time);
        self.run
            .add_test_definition(definition, self.test_list_id)
            .add_result(result);
    }

    /// Records an assertion made by a started test.
    ///
    /// The message is always added to the debug trace. A failing assertion also adds the message
    /// and the expected and actual values to the error text.
    pub fn log_assert(
        &mut self,
        name: &str,
        pass: bool,
        message: &str,
        actual: &str,
        expected: &str,
    ) -> Result<(), EngineError> {
        let run_id = self.run_id;
        let test_name = self.prefixed(name);
        let result = Self::latest_result_mut(&mut self.run, run_id, test_name)?;

        result.append_trace(message);
        if !pass {
            result
                .append_error(message)
                .append_error(format!("Expected: {expected}"))
                .append_error(format!("Actual: {actual}"));
        }
        debug!(
            "run {run_id}: assertion in `{}` {}",
            result.test_name,
            if pass { "passed" } else { "failed" }
        );
        Ok(())
    }

    /// Records the completion of a started test.
    ///
    /// `total` is informational only.
    pub fn log_test_done(
        &mut self,
        name: &str,
        failures: u64,
        total: u64,
        end_time: DateTime<FixedOffset>,
    ) -> Result<(), EngineError> {
        let run_id = self.run_id;
        let test_name = self.prefixed(name);
        let result = Self::latest_result_mut(&mut self.run, run_id, test_name)?;

        let outcome = if failures > 0 {
            TestOutcome::Failed
        } else {
            TestOutcome::Passed
        };
        debug!(
            "run {run_id}: test `{}` done with {failures}/{total} failures => {outcome}",
            result.test_name,
        );
        result.complete(outcome, end_time);
        Ok(())
    }

    /// Hands out the next pending page.
    ///
    /// Once no pages remain, the run outcome is set to completed and `None` is returned, as many
    /// times as this is called.
    pub fn advance_page(&mut self) -> Option<String> {
        let next = self.pending_pages.pop_front();
        match &next {
            Some(page) => debug!("run {}: next page is {page}", self.run_id),
            None => {
                self.run.result_summary.outcome = RunOutcome::Completed;
                debug!("run {}: no pages remain, marked completed", self.run_id);
            }
        }
        next
    }

    /// Recomputes the summary from the current results and stamps the finish time.
    pub fn finalize(&mut self, now: DateTime<FixedOffset>) -> &TestRun {
        aggregator::finalize(&mut self.run, now);
        debug!(
            "run {}: finalized with {} results => {}",
            self.run_id, self.run.result_summary.counters.total, self.run.result_summary.outcome,
        );
        &self.run
    }

    /// Finalizes the run and renders it as a TRX document.
    pub fn render_report(&mut self, now: DateTime<FixedOffset>) -> Result<String, EngineError> {
        let run_id = self.run_id;
        self.finalize(now)
            .to_string()
            .map_err(|error| EngineError::Render { run_id, error })
    }

    // ---
    // Helper methods
    // ---

    fn prefixed(&self, name: &str) -> String {
        format!("{}{name}", self.name_prefix)
    }

    fn latest_result_mut(
        run: &mut TestRun,
        run_id: RunUuid,
        test_name: String,
    ) -> Result<&mut UnitTestResult, EngineError> {
        match run.latest_result_mut(&test_name) {
            Some(result) => Ok(result),
            None => {
                warn!("run {run_id}: test `{test_name}` was logged before it was started");
                Err(EngineError::TestNotFound { run_id, test_name })
            }
        }
    }
}
