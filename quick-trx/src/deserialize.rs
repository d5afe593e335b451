// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read a `TestRun` back from XML.

use crate::{
    Counters, DeserializeError, ResultSummary, RunOutcome, TestEntry, TestList, TestOutcome,
    TestRun, TestSettings, Times, UnitTest, UnitTestResult,
    serialize::{
        COUNTERS_TAG, EXECUTION_TAG, MESSAGE_TAG, RESULT_SUMMARY_TAG, STD_OUT_TAG, TEST_ENTRY_TAG,
        TEST_LIST_TAG, TEST_RUN_TAG, TEST_SETTINGS_TAG, TIMES_TAG, UNIT_TEST_RESULT_TAG,
        UNIT_TEST_TAG,
    },
};
use chrono::{DateTime, FixedOffset};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use uuid::Uuid;

pub(crate) fn deserialize_test_run(xml: &str) -> Result<TestRun, DeserializeError> {
    let mut reader = Reader::from_str(xml);
    let mut state = ReadState::default();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = element_name(&start);
                state.start_element(&start, false)?;
                state.stack.push(name);
            }
            Event::Empty(start) => {
                state.start_element(&start, true)?;
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                state.end_element(&name);
                state.stack.pop();
            }
            Event::Text(text) => {
                // Whitespace between elements is only meaningful inside the text-bearing
                // elements.
                if let Some(buf) = state.text_target() {
                    buf.push_str(&text.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    state.finish()
}

#[derive(Default)]
struct ReadState {
    stack: Vec<String>,
    header: Option<RunHeader>,
    times: Option<Times>,
    settings: Option<TestSettings>,
    summary: ResultSummary,
    definitions: Vec<UnitTest>,
    lists: Vec<TestList>,
    entries: Vec<TestEntry>,
    results: Vec<UnitTestResult>,
    pending_definition: Option<UnitTest>,
    pending_result: Option<UnitTestResult>,
}

struct RunHeader {
    id: Uuid,
    name: String,
    run_user: String,
}

impl ReadState {
    fn start_element(
        &mut self,
        start: &BytesStart<'_>,
        is_empty: bool,
    ) -> Result<(), DeserializeError> {
        let attrs = Attributes::new(start)?;

        match attrs.element.as_str() {
            TEST_RUN_TAG => {
                self.header = Some(RunHeader {
                    id: attrs.uuid("id")?,
                    name: attrs.get("name").unwrap_or_default().to_owned(),
                    run_user: attrs.get("runUser").unwrap_or_default().to_owned(),
                });
            }
            TIMES_TAG => {
                self.times = Some(Times {
                    creation: attrs.timestamp("creation")?,
                    queuing: attrs.timestamp("queuing")?,
                    start: attrs.timestamp("start")?,
                    finish: attrs.timestamp("finish")?,
                });
            }
            TEST_SETTINGS_TAG => {
                self.settings = Some(TestSettings::new(
                    attrs.uuid("id")?,
                    attrs.get("name").unwrap_or_default(),
                ));
            }
            RESULT_SUMMARY_TAG => {
                let outcome = attrs.required("outcome")?;
                self.summary.outcome = outcome.parse::<RunOutcome>().map_err(|_| {
                    DeserializeError::InvalidAttribute {
                        element: attrs.element.clone(),
                        attribute: "outcome",
                        value: outcome.to_owned(),
                    }
                })?;
            }
            COUNTERS_TAG => {
                let mut counters = Counters::default();
                for counter in Counters::NAMES {
                    if let Some(slot) = counters.get_mut(counter) {
                        *slot = attrs.count(counter)?;
                    }
                }
                self.summary.counters = counters;
            }
            UNIT_TEST_TAG => {
                let definition = UnitTest::new(
                    attrs.uuid("id")?,
                    attrs.get("name").unwrap_or_default(),
                    Uuid::nil(),
                );
                if is_empty {
                    self.definitions.push(definition);
                } else {
                    self.pending_definition = Some(definition);
                }
            }
            EXECUTION_TAG => {
                let execution_id = attrs.uuid("id")?;
                if let Some(definition) = &mut self.pending_definition {
                    definition.execution_id = execution_id;
                }
            }
            TEST_LIST_TAG => {
                self.lists.push(TestList::new(
                    attrs.uuid("id")?,
                    attrs.get("name").unwrap_or_default(),
                ));
            }
            TEST_ENTRY_TAG => {
                self.entries.push(TestEntry {
                    test_id: attrs.uuid("testId")?,
                    execution_id: attrs.uuid("executionId")?,
                    test_list_id: attrs.uuid("testListId")?,
                });
            }
            UNIT_TEST_RESULT_TAG => {
                let result = UnitTestResult {
                    execution_id: attrs.uuid("executionId")?,
                    test_id: attrs.uuid("testId")?,
                    test_list_id: attrs.uuid("testListId")?,
                    test_name: attrs.get("testName").unwrap_or_default().to_owned(),
                    start_time: attrs.timestamp("startTime")?,
                    end_time: attrs.timestamp("endTime")?,
                    outcome: TestOutcome::from(attrs.required("outcome")?),
                    debug_trace: String::new(),
                    error_message: String::new(),
                };
                if is_empty {
                    self.results.push(result);
                } else {
                    self.pending_result = Some(result);
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn end_element(&mut self, name: &str) {
        if name == UNIT_TEST_TAG {
            if let Some(definition) = self.pending_definition.take() {
                self.definitions.push(definition);
            }
        } else if name == UNIT_TEST_RESULT_TAG {
            if let Some(result) = self.pending_result.take() {
                self.results.push(result);
            }
        }
    }

    fn text_target(&mut self) -> Option<&mut String> {
        let current = self.stack.last()?;
        let result = self.pending_result.as_mut()?;
        if current == STD_OUT_TAG {
            Some(&mut result.debug_trace)
        } else if current == MESSAGE_TAG {
            Some(&mut result.error_message)
        } else {
            None
        }
    }

    fn finish(self) -> Result<TestRun, DeserializeError> {
        let header = self.header.ok_or(DeserializeError::MissingElement {
            element: TEST_RUN_TAG,
        })?;
        let times = self.times.ok_or(DeserializeError::MissingElement {
            element: TIMES_TAG,
        })?;

        let mut test_run = TestRun::new(header.id, header.name, header.run_user, times.creation);
        test_run.times = times;
        if let Some(settings) = self.settings {
            test_run.set_settings(settings);
        }
        test_run.result_summary = self.summary;
        test_run.test_definitions = self.definitions;
        test_run.test_lists = self.lists;
        test_run.test_entries = self.entries;
        test_run.results = self.results;
        Ok(test_run)
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

/// The unescaped attributes of a single element.
struct Attributes {
    element: String,
    values: Vec<(String, String)>,
}

impl Attributes {
    fn new(start: &BytesStart<'_>) -> Result<Self, DeserializeError> {
        let mut values = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            values.push((key, value));
        }
        Ok(Self {
            element: element_name(start),
            values,
        })
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn required(&self, name: &'static str) -> Result<&str, DeserializeError> {
        self.get(name).ok_or_else(|| DeserializeError::MissingAttribute {
            element: self.element.clone(),
            attribute: name,
        })
    }

    /// Identifier attributes are omitted when nil, so a missing one reads back as nil.
    fn uuid(&self, name: &'static str) -> Result<Uuid, DeserializeError> {
        match self.get(name) {
            Some(value) => value.parse().map_err(|_| self.invalid(name, value)),
            None => Ok(Uuid::nil()),
        }
    }

    fn timestamp(&self, name: &'static str) -> Result<DateTime<FixedOffset>, DeserializeError> {
        let value = self.required(name)?;
        DateTime::parse_from_rfc3339(value).map_err(|_| self.invalid(name, value))
    }

    fn count(&self, name: &'static str) -> Result<usize, DeserializeError> {
        match self.get(name) {
            Some(value) => value.parse().map_err(|_| self.invalid(name, value)),
            None => Ok(0),
        }
    }

    fn invalid(&self, name: &'static str, value: &str) -> DeserializeError {
        DeserializeError::InvalidAttribute {
            element: self.element.clone(),
            attribute: name,
            value: value.to_owned(),
        }
    }
}
