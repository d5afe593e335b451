// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The closed set of operations a transport can invoke, and dispatch to their handlers.

use crate::{
    errors::{EngineError, UnknownOperationError},
    ids::{RunUuid, parse_run_id},
    registry::RunRegistry,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::debug;

/// The name of an [`Operation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationName {
    /// Create a new run.
    CreateRun,
    /// Replace a run's pending pages.
    SetPages,
    /// Query whether a run is in progress.
    IsInProgress,
    /// List registered runs.
    ListActive,
    /// Finalize and render a run's report.
    GetReport,
    /// Record an assertion.
    LogAssert,
    /// Record the start of a test.
    LogTestStart,
    /// Record the completion of a test.
    LogTestDone,
    /// Reset a run to in-progress.
    MarkInProgress,
    /// Replace a run's test name prefix.
    SetNamePrefix,
    /// Hand out a run's next page.
    AdvancePage,
}

impl OperationName {
    /// All operation names, in a stable order.
    pub const ALL: [OperationName; 11] = [
        OperationName::CreateRun,
        OperationName::SetPages,
        OperationName::IsInProgress,
        OperationName::ListActive,
        OperationName::GetReport,
        OperationName::LogAssert,
        OperationName::LogTestStart,
        OperationName::LogTestDone,
        OperationName::MarkInProgress,
        OperationName::SetNamePrefix,
        OperationName::AdvancePage,
    ];

    /// Returns the wire name of this operation.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationName::CreateRun => "create-run",
            OperationName::SetPages => "set-pages",
            OperationName::IsInProgress => "is-in-progress",
            OperationName::ListActive => "list-active",
            OperationName::GetReport => "get-report",
            OperationName::LogAssert => "log-assert",
            OperationName::LogTestStart => "log-test-start",
            OperationName::LogTestDone => "log-test-done",
            OperationName::MarkInProgress => "mark-in-progress",
            OperationName::SetNamePrefix => "set-name-prefix",
            OperationName::AdvancePage => "advance-page",
        }
    }

    /// Returns true if this operation changes engine state.
    ///
    /// Rendering a report counts, since it finalizes the run.
    pub fn is_mutating(self) -> bool {
        !matches!(
            self,
            OperationName::IsInProgress | OperationName::ListActive
        )
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationName {
    type Err = UnknownOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownOperationError::new(s))
    }
}

/// An operation along with its arguments, as delivered by a transport.
///
/// Run identifiers are carried as strings and parsed during dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Operation {
    /// Create a new run.
    CreateRun,

    /// Replace a run's pending pages.
    SetPages {
        /// The run.
        run_id: String,
        /// A comma-joined list of page URLs.
        pages: String,
        /// An optional test filter passed on to each page.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<String>,
    },

    /// Query whether a run is in progress.
    IsInProgress {
        /// The run.
        run_id: String,
    },

    /// List registered runs.
    ListActive,

    /// Finalize and render a run's report.
    GetReport {
        /// The run.
        run_id: String,
    },

    /// Record an assertion.
    LogAssert {
        /// The run.
        run_id: String,
        /// The unprefixed test name.
        name: String,
        /// Whether the assertion passed.
        pass: bool,
        /// The assertion message.
        message: String,
        /// The actual value.
        #[serde(default)]
        actual: String,
        /// The expected value.
        #[serde(default)]
        expected: String,
    },

    /// Record the start of a test.
    LogTestStart {
        /// The run.
        run_id: String,
        /// The unprefixed test name.
        name: String,
        /// When the test started.
        start_time: DateTime<FixedOffset>,
    },

    /// Record the completion of a test.
    LogTestDone {
        /// The run.
        run_id: String,
        /// The unprefixed test name.
        name: String,
        /// The number of failed assertions.
        failures: u64,
        /// The total number of assertions.
        total: u64,
        /// When the test ended.
        end_time: DateTime<FixedOffset>,
    },

    /// Reset a run to in-progress.
    MarkInProgress {
        /// The run.
        run_id: String,
    },

    /// Replace a run's test name prefix.
    SetNamePrefix {
        /// The run.
        run_id: String,
        /// The new prefix.
        prefix: String,
    },

    /// Hand out a run's next page.
    AdvancePage {
        /// The run.
        run_id: String,
        /// Failures reported by the page that just finished.
        #[serde(default)]
        failures: u64,
        /// Tests reported by the page that just finished.
        #[serde(default)]
        total: u64,
    },
}

impl Operation {
    /// Returns the name of this operation.
    pub fn name(&self) -> OperationName {
        match self {
            Operation::CreateRun => OperationName::CreateRun,
            Operation::SetPages { .. } => OperationName::SetPages,
            Operation::IsInProgress { .. } => OperationName::IsInProgress,
            Operation::ListActive => OperationName::ListActive,
            Operation::GetReport { .. } => OperationName::GetReport,
            Operation::LogAssert { .. } => OperationName::LogAssert,
            Operation::LogTestStart { .. } => OperationName::LogTestStart,
            Operation::LogTestDone { .. } => OperationName::LogTestDone,
            Operation::MarkInProgress { .. } => OperationName::MarkInProgress,
            Operation::SetNamePrefix { .. } => OperationName::SetNamePrefix,
            Operation::AdvancePage { .. } => OperationName::AdvancePage,
        }
    }

    /// Returns the run identifier this operation targets, if any.
    pub fn run_id(&self) -> Option<&str> {
        match self {
            Operation::CreateRun | Operation::ListActive => None,
            Operation::SetPages { run_id, .. }
            | Operation::IsInProgress { run_id }
            | Operation::GetReport { run_id }
            | Operation::LogAssert { run_id, .. }
            | Operation::LogTestStart { run_id, .. }
            | Operation::LogTestDone { run_id, .. }
            | Operation::MarkInProgress { run_id }
            | Operation::SetNamePrefix { run_id, .. }
            | Operation::AdvancePage { run_id, .. } => Some(run_id),
        }
    }

    /// Returns a mutable reference to the run identifier this operation targets, if any.
    pub fn run_id_mut(&mut self) -> Option<&mut String> {
        match self {
            Operation::CreateRun | Operation::ListActive => None,
            Operation::SetPages { run_id, .. }
            | Operation::IsInProgress { run_id }
            | Operation::GetReport { run_id }
            | Operation::LogAssert { run_id, .. }
            | Operation::LogTestStart { run_id, .. }
            | Operation::LogTestDone { run_id, .. }
            | Operation::MarkInProgress { run_id }
            | Operation::SetNamePrefix { run_id, .. }
            | Operation::AdvancePage { run_id, .. } => Some(run_id),
        }
    }
}

/// The value returned by an operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reply {
    /// The identifier of a newly created run.
    RunId(RunUuid),

    /// The number of pages stored.
    PageCount(usize),

    /// Whether the run is in progress.
    InProgress(bool),

    /// The identifiers of registered runs.
    RunIds(Vec<RunUuid>),

    /// A rendered TRX report.
    Report(String),

    /// The next page to load, or an empty string once all pages are handed out.
    NextPage(String),

    /// The operation produced no value.
    Done,
}

/// How a transport should let clients cache a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheDirective {
    /// The response must not be cached.
    NoStore,

    /// The transport's default caching applies.
    Default,
}

impl CacheDirective {
    /// Returns the directive for responses to the given operation.
    pub fn for_operation(name: OperationName) -> Self {
        if name.is_mutating() {
            CacheDirective::NoStore
        } else {
            CacheDirective::Default
        }
    }
}

/// The response to a dispatched operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Response {
    /// The operation's return value.
    pub reply: Reply,

    /// How the transport should mark the response for caching.
    pub cache: CacheDirective,
}

impl RunRegistry {
    /// Runs an operation against this registry.
    pub fn dispatch(&self, operation: Operation) -> Result<Response, EngineError> {
        let name = operation.name();
        debug!("dispatching {name}");

        let reply = match operation {
            Operation::CreateRun => Reply::RunId(self.create_run()?),
            Operation::SetPages {
                run_id,
                pages,
                filter,
            } => Reply::PageCount(self.set_pages(
                parse_run_id(&run_id)?,
                &pages,
                filter.as_deref(),
            )?),
            Operation::IsInProgress { run_id } => {
                Reply::InProgress(self.is_in_progress(parse_run_id(&run_id)?)?)
            }
            Operation::ListActive => Reply::RunIds(self.list_active()?),
            Operation::GetReport { run_id } => {
                Reply::Report(self.get_report(parse_run_id(&run_id)?)?)
            }
            Operation::LogAssert {
                run_id,
                name,
                pass,
                message,
                actual,
                expected,
            } => {
                self.log_assert(
                    parse_run_id(&run_id)?,
                    &name,
                    pass,
                    &message,
                    &actual,
                    &expected,
                )?;
                Reply::Done
            }
            Operation::LogTestStart {
                run_id,
                name,
                start_time,
            } => {
                self.log_test_start(parse_run_id(&run_id)?, &name, start_time)?;
                Reply::Done
            }
            Operation::LogTestDone {
                run_id,
                name,
                failures,
                total,
                end_time,
            } => {
                self.log_test_done(parse_run_id(&run_id)?, &name, failures, total, end_time)?;
                Reply::Done
            }
            Operation::MarkInProgress { run_id } => {
                self.mark_in_progress(parse_run_id(&run_id)?)?;
                Reply::Done
            }
            Operation::SetNamePrefix { run_id, prefix } => {
                self.set_name_prefix(parse_run_id(&run_id)?, &prefix)?;
                Reply::Done
            }
            Operation::AdvancePage {
                run_id,
                failures,
                total,
            } => {
                let run_id = parse_run_id(&run_id)?;
                debug!("run {run_id}: page finished with {failures}/{total} failures");
                Reply::NextPage(self.advance_page(run_id)?.unwrap_or_default())
            }
        };

        Ok(Response {
            reply,
            cache: CacheDirective::for_operation(name),
        })
    }
}
