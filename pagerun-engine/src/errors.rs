// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the pagerun engine.

use crate::ids::RunUuid;
use camino::Utf8PathBuf;
use config::ConfigError;
use std::fmt;
use thiserror::Error;

/// The broad category an [`EngineError`] falls into.
///
/// Transports use this to pick a status code; the engine never retries or suppresses errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A null or malformed argument, such as an unparseable run identifier.
    InvalidArgument,

    /// An unknown run identifier, or a test name with no matching start event.
    NotFound,

    /// An internal failure unrelated to the caller's input.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "invalid argument"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Internal => write!(f, "internal error"),
        }
    }
}

/// An error returned by an engine operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// No run identifier was supplied.
    #[error("run identifier is missing")]
    MissingRunId,

    /// The run identifier could not be parsed.
    #[error("run identifier `{input}` is not a valid UUID")]
    InvalidRunId {
        /// The input that failed to parse.
        input: String,

        /// The underlying parse error.
        #[source]
        error: newtype_uuid::ParseError,
    },

    /// No run is registered under this identifier.
    #[error("run `{run_id}` not found")]
    RunNotFound {
        /// The identifier that was looked up.
        run_id: RunUuid,
    },

    /// A test was completed or asserted against before it was started.
    #[error("test `{test_name}` has not been started in run `{run_id}`")]
    TestNotFound {
        /// The run the test was logged against.
        run_id: RunUuid,

        /// The prefixed test name.
        test_name: String,
    },

    /// The registry lock was poisoned by a panicking holder.
    #[error("run registry is poisoned")]
    RegistryPoisoned,

    /// A run's lock was poisoned by a panicking holder.
    #[error("state for run `{run_id}` is poisoned")]
    RunPoisoned {
        /// The run whose lock was poisoned.
        run_id: RunUuid,
    },

    /// The report for a run could not be rendered.
    #[error("failed to render report for run `{run_id}`")]
    Render {
        /// The run being rendered.
        run_id: RunUuid,

        /// The underlying serialization error.
        #[source]
        error: quick_trx::SerializeError,
    },
}

impl EngineError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::MissingRunId | EngineError::InvalidRunId { .. } => {
                ErrorKind::InvalidArgument
            }
            EngineError::RunNotFound { .. } | EngineError::TestNotFound { .. } => {
                ErrorKind::NotFound
            }
            EngineError::RegistryPoisoned
            | EngineError::RunPoisoned { .. }
            | EngineError::Render { .. } => ErrorKind::Internal,
        }
    }
}

/// Returned when parsing an unrecognized operation name.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown operation `{input}`")]
pub struct UnknownOperationError {
    input: String,
}

impl UnknownOperationError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the name that was not recognized.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// An error that occurred while reading the engine configuration.
#[derive(Debug, Error)]
#[error("failed to parse pagerun config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &camino::Utf8Path {
        &self.config_file
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of [`ConfigParseError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// The config sources could not be read or merged.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// The merged config could not be deserialized.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}
