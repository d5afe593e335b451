// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use pagerun_engine::errors::{ConfigParseError, EngineError};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Exit codes returned by `pagerun`.
pub struct PagerunExitCode;

impl PagerunExitCode {
    /// No errors occurred.
    pub const OK: i32 = 0;

    /// One or more scripted operations failed.
    pub const OPERATION_FAILED: i32 = 100;

    /// A user issue happened while setting up the invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing data to stdout or to a file produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}

// The #[error()] strings are placeholders; display_to_stderr prints the full, colorized message.

/// An error that `pagerun` reports to the user and exits on.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine current directory")]
    CurrentDirError {
        #[source]
        err: std::io::Error,
    },

    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },

    #[error("failed to read script")]
    ScriptReadError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("failed to parse script")]
    ScriptParseError {
        path: Utf8PathBuf,
        line: usize,
        #[source]
        err: serde_json::Error,
    },

    #[error("failed to render report")]
    ReportRenderError {
        #[source]
        err: EngineError,
    },

    #[error("failed to write report")]
    ReportWriteError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("failed to write output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },

    #[error("failed to serialize output")]
    SerializeOutputError {
        #[source]
        err: serde_json::Error,
    },
}

impl ExpectedError {
    pub(crate) fn script_parse_error(
        path: impl Into<Utf8PathBuf>,
        line: usize,
        err: serde_json::Error,
    ) -> Self {
        Self::ScriptParseError {
            path: path.into(),
            line,
            err,
        }
    }

    /// Returns the exit code for this error.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirError { .. }
            | Self::ConfigParseError { .. }
            | Self::ScriptReadError { .. }
            | Self::ScriptParseError { .. } => PagerunExitCode::SETUP_ERROR,
            Self::ReportRenderError { .. } => PagerunExitCode::OPERATION_FAILED,
            Self::ReportWriteError { .. }
            | Self::WriteOutputError { .. }
            | Self::SerializeOutputError { .. } => PagerunExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirError { err } => {
                error!("could not determine current directory");
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ScriptReadError { path, err } => {
                error!("failed to read script `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ScriptParseError { path, line, err } => {
                error!(
                    "failed to parse operation at {}",
                    format!("{path}:{line}").style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::ReportRenderError { err } => {
                error!("failed to render report");
                Some(err as &dyn Error)
            }
            Self::ReportWriteError { path, err } => {
                error!("failed to write report to `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::WriteOutputError { err } => {
                error!("failed to write output");
                Some(err as &dyn Error)
            }
            Self::SerializeOutputError { err } => {
                error!("failed to serialize output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

/// Logs an engine error along with its sources.
pub(crate) fn log_engine_error(line: usize, err: &EngineError, styles: &StderrStyles) {
    error!(
        "{} failed ({}): {err}",
        format!("line {line}").style(styles.bold),
        err.kind()
    );
    let mut next_error = err.source();
    while let Some(err) = next_error {
        error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
        next_error = err.source();
    }
}
