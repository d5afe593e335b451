// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Generate and read TRX-style test run reports in Rust.
//!
//! The document model mirrors the layout of Visual Studio test results: a
//! [`TestRun`] holds its settings, a [`ResultSummary`] with [`Counters`], the
//! test definitions, test lists, test entries and the [`UnitTestResult`]s
//! recorded against them.

mod deserialize;
mod errors;
mod report;
mod serialize;

pub use errors::*;
pub use report::*;

// Re-export `uuid::Uuid` so downstream consumers don't need to depend on it directly.
pub use uuid::Uuid;
