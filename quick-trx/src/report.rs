// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    deserialize::deserialize_test_run, errors::DeserializeError, serialize::serialize_test_run,
    SerializeError,
};
use chrono::{DateTime, FixedOffset};
use std::{fmt, io, str::FromStr};
use uuid::Uuid;

/// The root element of a TRX report: one logical test execution session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestRun {
    /// The unique identifier of this run.
    ///
    /// The nil UUID is not rendered.
    pub id: Uuid,

    /// The display name of this run.
    pub name: String,

    /// The user that owns this run.
    pub run_user: String,

    /// Creation, queuing, start and finish timestamps.
    pub times: Times,

    /// The settings this run was executed with.
    pub settings: TestSettings,

    /// Counters and the overall outcome.
    pub result_summary: ResultSummary,

    /// One definition per test started in this run, in creation order.
    pub test_definitions: Vec<UnitTest>,

    /// The test lists that entries are grouped into.
    pub test_lists: Vec<TestList>,

    /// One entry per definition, in the same order as `test_definitions`.
    pub test_entries: Vec<TestEntry>,

    /// Every recorded execution, in the order they were started.
    pub results: Vec<UnitTestResult>,
}

impl TestRun {
    /// Creates a new, empty `TestRun`. All timestamps are set to `timestamp`.
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        run_user: impl Into<String>,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            run_user: run_user.into(),
            times: Times::new(timestamp),
            settings: TestSettings::new(Uuid::nil(), "Default Test Settings"),
            result_summary: ResultSummary::new(),
            test_definitions: vec![],
            test_lists: vec![],
            test_entries: vec![],
            results: vec![],
        }
    }

    /// Sets the test settings.
    pub fn set_settings(&mut self, settings: TestSettings) -> &mut Self {
        self.settings = settings;
        self
    }

    /// Adds a test list.
    pub fn add_test_list(&mut self, test_list: TestList) -> &mut Self {
        self.test_lists.push(test_list);
        self
    }

    /// Adds a test definition along with the entry that places it in the given list.
    ///
    /// Definitions and entries are always added in pairs, so they share positions.
    pub fn add_test_definition(&mut self, definition: UnitTest, test_list_id: Uuid) -> &mut Self {
        self.test_entries.push(TestEntry {
            test_id: definition.id,
            execution_id: definition.execution_id,
            test_list_id,
        });
        self.test_definitions.push(definition);
        self
    }

    /// Appends a result.
    pub fn add_result(&mut self, result: UnitTestResult) -> &mut Self {
        self.results.push(result);
        self
    }

    /// Returns the most recently added result with the given test name.
    ///
    /// Results are append-only and a test name may be started more than once, so the last
    /// result with a name is the authoritative one.
    pub fn latest_result(&self, test_name: &str) -> Option<&UnitTestResult> {
        self.results.iter().rev().find(|r| r.test_name == test_name)
    }

    /// Returns a mutable reference to the most recently added result with the given test name.
    pub fn latest_result_mut(&mut self, test_name: &str) -> Option<&mut UnitTestResult> {
        self.results
            .iter_mut()
            .rev()
            .find(|r| r.test_name == test_name)
    }

    /// Serialize this report to the given writer.
    pub fn serialize(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        serialize_test_run(self, writer).map_err(SerializeError::from)
    }

    /// Serialize this report to a string.
    pub fn to_string(&self) -> Result<String, SerializeError> {
        let mut buf: Vec<u8> = vec![];
        self.serialize(&mut buf)?;
        String::from_utf8(buf).map_err(|utf8_err| {
            quick_xml::Error::NonDecodable(Some(utf8_err.utf8_error())).into()
        })
    }

    /// Reads a report previously produced by [`Self::serialize`].
    pub fn deserialize_from_str(xml: &str) -> Result<Self, DeserializeError> {
        deserialize_test_run(xml)
    }
}

/// Timestamps for a [`TestRun`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Times {
    /// When the run was created.
    pub creation: DateTime<FixedOffset>,

    /// When the run was queued.
    pub queuing: DateTime<FixedOffset>,

    /// When the run started.
    pub start: DateTime<FixedOffset>,

    /// When the run was last finalized.
    pub finish: DateTime<FixedOffset>,
}

impl Times {
    /// Creates a new `Times` with every timestamp set to `timestamp`.
    pub fn new(timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            creation: timestamp,
            queuing: timestamp,
            start: timestamp,
            finish: timestamp,
        }
    }
}

/// The settings a run was executed with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestSettings {
    /// The settings identifier.
    pub id: Uuid,

    /// The settings name.
    pub name: String,
}

impl TestSettings {
    /// Creates a new `TestSettings`.
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// The summary of a run: an overall outcome plus counters.
///
/// The summary is derived from the results. It is only meant to be written while finalizing a
/// run, apart from the in-progress/completed signalling done by the dispatching side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultSummary {
    /// The overall outcome.
    pub outcome: RunOutcome,

    /// Per-category counts.
    pub counters: Counters,
}

impl ResultSummary {
    /// Creates a new summary in the [`RunOutcome::InProgress`] state with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }
}

/// The overall outcome of a [`TestRun`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RunOutcome {
    /// Tests are still being dispatched or executed.
    #[default]
    InProgress,

    /// No more pages remain to be dispatched.
    Completed,

    /// Every recorded result passed.
    Passed,

    /// At least one recorded result failed.
    Failed,

    /// Not every recorded result definitively passed, or nothing was recorded.
    Inconclusive,
}

impl RunOutcome {
    /// Returns the string used for this outcome in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::InProgress => "InProgress",
            RunOutcome::Completed => "Completed",
            RunOutcome::Passed => "Passed",
            RunOutcome::Failed => "Failed",
            RunOutcome::Inconclusive => "Inconclusive",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunOutcome {
    type Err = UnknownRunOutcome;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let outcome = match s {
            "InProgress" => RunOutcome::InProgress,
            "Completed" => RunOutcome::Completed,
            "Passed" => RunOutcome::Passed,
            "Failed" => RunOutcome::Failed,
            "Inconclusive" => RunOutcome::Inconclusive,
            other => {
                return Err(UnknownRunOutcome {
                    input: other.to_owned(),
                });
            }
        };
        Ok(outcome)
    }
}

/// Returned when parsing an unrecognized [`RunOutcome`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized run outcome: {input}")]
pub struct UnknownRunOutcome {
    input: String,
}

/// The outcome of a single [`UnitTestResult`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TestOutcome {
    /// The test has started but not completed.
    #[default]
    InProgress,

    /// The test completed without failures.
    Passed,

    /// The test completed with at least one failure.
    Failed,

    /// An outcome this crate does not model, read back from a report.
    Other(String),
}

impl TestOutcome {
    /// Returns the string used for this outcome in reports.
    pub fn as_str(&self) -> &str {
        match self {
            TestOutcome::InProgress => "InProgress",
            TestOutcome::Passed => "Passed",
            TestOutcome::Failed => "Failed",
            TestOutcome::Other(other) => other,
        }
    }

}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TestOutcome {
    fn from(s: &str) -> Self {
        match s {
            "InProgress" => TestOutcome::InProgress,
            "Passed" => TestOutcome::Passed,
            "Failed" => TestOutcome::Failed,
            other => TestOutcome::Other(other.to_owned()),
        }
    }
}

/// Per-category result counts for a [`ResultSummary`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// The total number of results.
    pub total: usize,
    /// Results that started executing.
    pub executed: usize,
    /// Results that passed.
    pub passed: usize,
    /// Results that failed.
    pub failed: usize,
    /// Results that errored.
    pub error: usize,
    /// Results that timed out.
    pub timeout: usize,
    /// Results that were aborted.
    pub aborted: usize,
    /// Results that were inconclusive.
    pub inconclusive: usize,
    /// Results that passed but whose run was aborted.
    pub passed_but_run_aborted: usize,
    /// Results that could not be run.
    pub not_runnable: usize,
    /// Results that were never executed.
    pub not_executed: usize,
    /// Results whose runner disconnected.
    pub disconnected: usize,
    /// Results that produced warnings.
    pub warning: usize,
    /// Results that reached a terminal outcome.
    pub completed: usize,
    /// Results that are still in progress.
    pub in_progress: usize,
    /// Results that are pending.
    pub pending: usize,
}

impl Counters {
    /// The counter names as they appear in reports, in serialization order.
    pub const NAMES: [&'static str; 16] = [
        "total",
        "executed",
        "passed",
        "failed",
        "error",
        "timeout",
        "aborted",
        "inconclusive",
        "passedButRunAborted",
        "notRunnable",
        "notExecuted",
        "disconnected",
        "warning",
        "completed",
        "inProgress",
        "pending",
    ];

    /// Returns `(name, value)` pairs in serialization order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        Self::NAMES
            .into_iter()
            .map(move |name| (name, self.get(name).unwrap_or_default()))
    }

    /// Returns the value of the counter with the given report name.
    pub fn get(&self, name: &str) -> Option<usize> {
        let slot = match name {
            "total" => &self.total,
            "executed" => &self.executed,
            "passed" => &self.passed,
            "failed" => &self.failed,
            "error" => &self.error,
            "timeout" => &self.timeout,
            "aborted" => &self.aborted,
            "inconclusive" => &self.inconclusive,
            "passedButRunAborted" => &self.passed_but_run_aborted,
            "notRunnable" => &self.not_runnable,
            "notExecuted" => &self.not_executed,
            "disconnected" => &self.disconnected,
            "warning" => &self.warning,
            "completed" => &self.completed,
            "inProgress" => &self.in_progress,
            "pending" => &self.pending,
            _ => return None,
        };
        Some(*slot)
    }

    /// Returns a mutable reference to the counter with the given report name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut usize> {
        let slot = match name {
            "total" => &mut self.total,
            "executed" => &mut self.executed,
            "passed" => &mut self.passed,
            "failed" => &mut self.failed,
            "error" => &mut self.error,
            "timeout" => &mut self.timeout,
            "aborted" => &mut self.aborted,
            "inconclusive" => &mut self.inconclusive,
            "passedButRunAborted" => &mut self.passed_but_run_aborted,
            "notRunnable" => &mut self.not_runnable,
            "notExecuted" => &mut self.not_executed,
            "disconnected" => &mut self.disconnected,
            "warning" => &mut self.warning,
            "completed" => &mut self.completed,
            "inProgress" => &mut self.in_progress,
            "pending" => &mut self.pending,
            _ => return None,
        };
        Some(slot)
    }
}

/// A test definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitTest {
    /// The definition identifier.
    pub id: Uuid,

    /// The (prefixed) test name.
    pub name: String,

    /// The execution this definition was created for.
    pub execution_id: Uuid,
}

impl UnitTest {
    /// Creates a new definition.
    pub fn new(id: Uuid, name: impl Into<String>, execution_id: Uuid) -> Self {
        Self {
            id,
            name: name.into(),
            execution_id,
        }
    }
}

/// A grouping container for test entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestList {
    /// The list identifier.
    pub id: Uuid,

    /// The list name.
    pub name: String,
}

impl TestList {
    /// Creates a new test list.
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Links a [`UnitTest`] definition to a [`TestList`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestEntry {
    /// The definition this entry refers to.
    pub test_id: Uuid,

    /// The execution this entry refers to.
    pub execution_id: Uuid,

    /// The list this entry belongs to.
    pub test_list_id: Uuid,
}

/// One recorded execution of a named test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitTestResult {
    /// The execution identifier, shared with the matching definition.
    pub execution_id: Uuid,

    /// The definition identifier.
    pub test_id: Uuid,

    /// The list this result belongs to.
    pub test_list_id: Uuid,

    /// The (prefixed) test name.
    pub test_name: String,

    /// When the test started.
    pub start_time: DateTime<FixedOffset>,

    /// When the test ended. Equal to `start_time` until the test completes.
    pub end_time: DateTime<FixedOffset>,

    /// The outcome of this execution.
    pub outcome: TestOutcome,

    /// Debug trace text, one newline-terminated line per append. Append-only.
    pub debug_trace: String,

    /// Error message text, populated by failing assertions. Same line format as `debug_trace`.
    pub error_message: String,
}

impl UnitTestResult {
    /// Creates a new in-progress result for the given definition.
    pub fn new(
        definition: &UnitTest,
        test_list_id: Uuid,
        start_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            execution_id: definition.execution_id,
            test_id: definition.id,
            test_list_id,
            test_name: definition.name.clone(),
            start_time,
            end_time: start_time,
            outcome: TestOutcome::InProgress,
            debug_trace: String::new(),
            error_message: String::new(),
        }
    }

    /// Appends a line to the debug trace.
    pub fn append_trace(&mut self, line: impl AsRef<str>) -> &mut Self {
        append_line(&mut self.debug_trace, line.as_ref());
        self
    }

    /// Appends a line to the error message text.
    pub fn append_error(&mut self, line: impl AsRef<str>) -> &mut Self {
        append_line(&mut self.error_message, line.as_ref());
        self
    }

    /// Moves this result to a terminal outcome and sets its end time.
    pub fn complete(&mut self, outcome: TestOutcome, end_time: DateTime<FixedOffset>) -> &mut Self {
        self.outcome = outcome;
        self.end_time = end_time;
        self
    }
}

// Every appended line is newline-terminated, so even an empty line leaves a record behind.
fn append_line(text: &mut String, line: &str) {
    text.push_str(&sanitize_text(line));
    text.push('\n');
}

/// Removes characters that can't be represented in XML 1.0.
pub(crate) fn sanitize_text(text: &str) -> String {
    text.replace(
        |c| matches!(c, '\x00'..='\x08' | '\x0b' | '\x0c' | '\x0e'..='\x1f'),
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn timestamp() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap()
    }

    #[test]
    fn latest_result_wins() {
        let mut run = TestRun::new(Uuid::new_v4(), "run", "user", timestamp());
        let list_id = Uuid::new_v4();
        for _ in 0..2 {
            let definition = UnitTest::new(Uuid::new_v4(), "t1", Uuid::new_v4());
            let result = UnitTestResult::new(&definition, list_id, timestamp());
            run.add_test_definition(definition, list_id).add_result(result);
        }

        let last_execution = run.results[1].execution_id;
        let latest = run.latest_result_mut("t1").expect("t1 was started");
        assert_eq!(latest.execution_id, last_execution);
        latest.append_trace("hello");

        assert_eq!(run.results[0].debug_trace, "");
        assert_eq!(run.results[1].debug_trace, "hello\n");
        assert!(run.latest_result("t2").is_none());
    }

    #[test]
    fn definitions_and_entries_share_positions() {
        let mut run = TestRun::new(Uuid::new_v4(), "run", "user", timestamp());
        let list_id = Uuid::new_v4();
        run.add_test_list(TestList::new(list_id, "list"));
        for name in ["a", "b", "c"] {
            run.add_test_definition(UnitTest::new(Uuid::new_v4(), name, Uuid::new_v4()), list_id);
        }

        assert_eq!(run.test_definitions.len(), run.test_entries.len());
        for (definition, entry) in run.test_definitions.iter().zip(&run.test_entries) {
            assert_eq!(definition.id, entry.test_id);
            assert_eq!(definition.execution_id, entry.execution_id);
            assert_eq!(entry.test_list_id, list_id);
        }
    }

    #[test]
    fn appended_text_is_line_separated_and_sanitized() {
        let definition = UnitTest::new(Uuid::new_v4(), "t", Uuid::new_v4());
        let mut result = UnitTestResult::new(&definition, Uuid::nil(), timestamp());
        result
            .append_trace("first")
            .append_trace("sec\x07ond")
            .append_error("boom");

        assert_eq!(result.debug_trace, "first\nsecond\n");
        assert_eq!(result.error_message, "boom\n");
    }

    #[test]
    fn empty_lines_are_recorded() {
        let definition = UnitTest::new(Uuid::new_v4(), "t", Uuid::new_v4());
        let mut result = UnitTestResult::new(&definition, Uuid::nil(), timestamp());
        result.append_trace("").append_error("\x01\x02");

        assert_eq!(result.debug_trace, "\n");
        assert_eq!(result.error_message, "\n");
    }

    #[test]
    fn counters_by_name() {
        let mut counters = Counters::default();
        *counters.get_mut("passedButRunAborted").unwrap() += 2;
        *counters.get_mut("inProgress").unwrap() += 1;
        assert_eq!(counters.passed_but_run_aborted, 2);
        assert_eq!(counters.in_progress, 1);
        assert_eq!(counters.get("bogus"), None);
        assert_eq!(counters.iter().count(), Counters::NAMES.len());
    }

    #[test]
    fn outcome_strings() {
        for outcome in [
            RunOutcome::InProgress,
            RunOutcome::Completed,
            RunOutcome::Passed,
            RunOutcome::Failed,
            RunOutcome::Inconclusive,
        ] {
            assert_eq!(outcome.as_str().parse::<RunOutcome>(), Ok(outcome));
        }
        assert!("Bogus".parse::<RunOutcome>().is_err());
        assert_eq!(
            TestOutcome::from("NotExecuted"),
            TestOutcome::Other("NotExecuted".to_owned())
        );
    }
}
