// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a `TestRun`.

use crate::{
    Counters, ResultSummary, TestEntry, TestList, TestRun, TestSettings, Times, UnitTest,
    UnitTestResult,
};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::{io, time::Duration};
use uuid::Uuid;

pub(crate) const TRX_NAMESPACE: &str = "http://microsoft.com/schemas/VisualStudio/TeamTest/2010";

pub(crate) const TEST_RUN_TAG: &str = "TestRun";
pub(crate) const TIMES_TAG: &str = "Times";
pub(crate) const TEST_SETTINGS_TAG: &str = "TestSettings";
pub(crate) const RESULT_SUMMARY_TAG: &str = "ResultSummary";
pub(crate) const COUNTERS_TAG: &str = "Counters";
pub(crate) const TEST_DEFINITIONS_TAG: &str = "TestDefinitions";
pub(crate) const UNIT_TEST_TAG: &str = "UnitTest";
pub(crate) const EXECUTION_TAG: &str = "Execution";
pub(crate) const TEST_LISTS_TAG: &str = "TestLists";
pub(crate) const TEST_LIST_TAG: &str = "TestList";
pub(crate) const TEST_ENTRIES_TAG: &str = "TestEntries";
pub(crate) const TEST_ENTRY_TAG: &str = "TestEntry";
pub(crate) const RESULTS_TAG: &str = "Results";
pub(crate) const UNIT_TEST_RESULT_TAG: &str = "UnitTestResult";
pub(crate) const OUTPUT_TAG: &str = "Output";
pub(crate) const STD_OUT_TAG: &str = "StdOut";
pub(crate) const ERROR_INFO_TAG: &str = "ErrorInfo";
pub(crate) const MESSAGE_TAG: &str = "Message";

pub(crate) fn serialize_test_run(
    test_run: &TestRun,
    writer: impl io::Write,
) -> quick_xml::Result<()> {
    let mut writer = Writer::new_with_indent(writer, b' ', 4);

    let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
    writer.write_event(Event::Decl(decl))?;

    serialize_test_run_impl(test_run, &mut writer)?;

    // Add a trailing newline.
    writer.write_indent()
}

fn serialize_test_run_impl(
    test_run: &TestRun,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    // Use the destructuring syntax to ensure that all fields are handled.
    let TestRun {
        id,
        name,
        run_user,
        times,
        settings,
        result_summary,
        test_definitions,
        test_lists,
        test_entries,
        results,
    } = test_run;

    let mut test_run_tag = BytesStart::new(TEST_RUN_TAG);
    push_id_attribute(&mut test_run_tag, "id", *id);
    test_run_tag.push_attribute(("name", name.as_str()));
    test_run_tag.push_attribute(("runUser", run_user.as_str()));
    test_run_tag.push_attribute(("xmlns", TRX_NAMESPACE));
    writer.write_event(Event::Start(test_run_tag))?;

    serialize_times(times, writer)?;
    serialize_settings(settings, writer)?;
    serialize_summary(result_summary, writer)?;

    serialize_empty_start_tag(TEST_DEFINITIONS_TAG, writer)?;
    for definition in test_definitions {
        serialize_definition(definition, writer)?;
    }
    serialize_end_tag(TEST_DEFINITIONS_TAG, writer)?;

    serialize_empty_start_tag(TEST_LISTS_TAG, writer)?;
    for test_list in test_lists {
        serialize_test_list(test_list, writer)?;
    }
    serialize_end_tag(TEST_LISTS_TAG, writer)?;

    serialize_empty_start_tag(TEST_ENTRIES_TAG, writer)?;
    for entry in test_entries {
        serialize_entry(entry, writer)?;
    }
    serialize_end_tag(TEST_ENTRIES_TAG, writer)?;

    serialize_empty_start_tag(RESULTS_TAG, writer)?;
    for result in results {
        serialize_result(result, writer)?;
    }
    serialize_end_tag(RESULTS_TAG, writer)?;

    serialize_end_tag(TEST_RUN_TAG, writer)
}

fn serialize_times(times: &Times, writer: &mut Writer<impl io::Write>) -> quick_xml::Result<()> {
    let Times {
        creation,
        queuing,
        start,
        finish,
    } = times;

    let mut tag = BytesStart::new(TIMES_TAG);
    tag.push_attribute(("creation", serialize_timestamp(creation).as_str()));
    tag.push_attribute(("queuing", serialize_timestamp(queuing).as_str()));
    tag.push_attribute(("start", serialize_timestamp(start).as_str()));
    tag.push_attribute(("finish", serialize_timestamp(finish).as_str()));
    writer.write_event(Event::Empty(tag))
}

fn serialize_settings(
    settings: &TestSettings,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let mut tag = BytesStart::new(TEST_SETTINGS_TAG);
    tag.push_attribute(("name", settings.name.as_str()));
    push_id_attribute(&mut tag, "id", settings.id);
    writer.write_event(Event::Empty(tag))
}

fn serialize_summary(
    summary: &ResultSummary,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let mut tag = BytesStart::new(RESULT_SUMMARY_TAG);
    tag.push_attribute(("outcome", summary.outcome.as_str()));
    writer.write_event(Event::Start(tag))?;

    serialize_counters(&summary.counters, writer)?;

    serialize_end_tag(RESULT_SUMMARY_TAG, writer)
}

fn serialize_counters(
    counters: &Counters,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let mut tag = BytesStart::new(COUNTERS_TAG);
    for (name, value) in counters.iter() {
        tag.push_attribute((name, value.to_string().as_str()));
    }
    writer.write_event(Event::Empty(tag))
}

fn serialize_definition(
    definition: &UnitTest,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let UnitTest {
        id,
        name,
        execution_id,
    } = definition;

    let mut tag = BytesStart::new(UNIT_TEST_TAG);
    tag.push_attribute(("name", name.as_str()));
    push_id_attribute(&mut tag, "id", *id);
    writer.write_event(Event::Start(tag))?;

    let mut execution_tag = BytesStart::new(EXECUTION_TAG);
    push_id_attribute(&mut execution_tag, "id", *execution_id);
    writer.write_event(Event::Empty(execution_tag))?;

    serialize_end_tag(UNIT_TEST_TAG, writer)
}

fn serialize_test_list(
    test_list: &TestList,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let mut tag = BytesStart::new(TEST_LIST_TAG);
    tag.push_attribute(("name", test_list.name.as_str()));
    push_id_attribute(&mut tag, "id", test_list.id);
    writer.write_event(Event::Empty(tag))
}

fn serialize_entry(
    entry: &TestEntry,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let TestEntry {
        test_id,
        execution_id,
        test_list_id,
    } = entry;

    let mut tag = BytesStart::new(TEST_ENTRY_TAG);
    push_id_attribute(&mut tag, "testId", *test_id);
    push_id_attribute(&mut tag, "executionId", *execution_id);
    push_id_attribute(&mut tag, "testListId", *test_list_id);
    writer.write_event(Event::Empty(tag))
}

fn serialize_result(
    result: &UnitTestResult,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let UnitTestResult {
        execution_id,
        test_id,
        test_list_id,
        test_name,
        start_time,
        end_time,
        outcome,
        debug_trace,
        error_message,
    } = result;

    let mut tag = BytesStart::new(UNIT_TEST_RESULT_TAG);
    push_id_attribute(&mut tag, "executionId", *execution_id);
    push_id_attribute(&mut tag, "testId", *test_id);
    tag.push_attribute(("testName", test_name.as_str()));
    tag.push_attribute(("startTime", serialize_timestamp(start_time).as_str()));
    tag.push_attribute(("endTime", serialize_timestamp(end_time).as_str()));
    tag.push_attribute((
        "duration",
        serialize_duration(start_time, end_time).as_str(),
    ));
    tag.push_attribute(("outcome", outcome.as_str()));
    push_id_attribute(&mut tag, "testListId", *test_list_id);

    if debug_trace.is_empty() {
        return writer.write_event(Event::Empty(tag));
    }

    writer.write_event(Event::Start(tag))?;
    serialize_empty_start_tag(OUTPUT_TAG, writer)?;
    serialize_text_element(STD_OUT_TAG, debug_trace, writer)?;
    serialize_empty_start_tag(ERROR_INFO_TAG, writer)?;
    serialize_text_element(MESSAGE_TAG, error_message, writer)?;
    serialize_end_tag(ERROR_INFO_TAG, writer)?;
    serialize_end_tag(OUTPUT_TAG, writer)?;
    serialize_end_tag(UNIT_TEST_RESULT_TAG, writer)
}

// The text event is always written, even if empty, so that the end tag stays on the same line as
// the start tag and no indentation leaks into the element's text.
fn serialize_text_element(
    tag_name: &'static str,
    text: &str,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    serialize_empty_start_tag(tag_name, writer)?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    serialize_end_tag(tag_name, writer)
}

fn push_id_attribute(tag: &mut BytesStart<'_>, name: &'static str, id: Uuid) {
    if !id.is_nil() {
        tag.push_attribute((name, id.hyphenated().to_string().as_str()));
    }
}

fn serialize_empty_start_tag(
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag_name)))
}

fn serialize_end_tag(
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    writer.write_event(Event::End(BytesEnd::new(tag_name)))
}

pub(crate) fn serialize_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

// Serialize the elapsed time as `hh:mm:ss.fffffff`, in 100ns ticks.
fn serialize_duration(start: &DateTime<FixedOffset>, end: &DateTime<FixedOffset>) -> String {
    let elapsed = (*end - *start).to_std().unwrap_or(Duration::ZERO);
    let secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:07}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        elapsed.subsec_nanos() / 100,
    )
}
