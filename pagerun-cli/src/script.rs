// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operation scripts for `pagerun replay`.
//!
//! A script has one JSON-encoded operation per line. Blank lines and lines starting with `#` are
//! skipped.

use crate::errors::ExpectedError;
use camino::Utf8Path;
use pagerun_engine::{ids::RunUuid, operation::Operation};

/// Stands in for the identifier most recently returned by `create-run`.
pub(crate) const LAST_RUN_ID: &str = "@last";

/// An operation along with the (1-based) line it was read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ScriptStep {
    pub(crate) line: usize,
    pub(crate) operation: Operation,
}

pub(crate) fn parse_script(
    path: &Utf8Path,
    contents: &str,
) -> Result<Vec<ScriptStep>, ExpectedError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, text)| {
            let text = text.trim();
            !text.is_empty() && !text.starts_with('#')
        })
        .map(|(index, text)| {
            let line = index + 1;
            serde_json::from_str(text)
                .map(|operation| ScriptStep { line, operation })
                .map_err(|err| ExpectedError::script_parse_error(path, line, err))
        })
        .collect()
}

/// Replaces a `@last` run identifier with the most recently created run.
///
/// Returns false if the step refers to `@last` but no run has been created yet. The identifier is
/// then left as is and fails to parse during dispatch.
pub(crate) fn substitute_last_run(operation: &mut Operation, last_run: Option<RunUuid>) -> bool {
    match (operation.run_id_mut(), last_run) {
        (Some(run_id), Some(last_run)) if run_id.trim() == LAST_RUN_ID => {
            *run_id = last_run.to_string();
            true
        }
        (Some(run_id), None) => run_id.trim() != LAST_RUN_ID,
        _ => true,
    }
}
