// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line harness for the pagerun engine.
//!
//! `pagerun replay` feeds a script of JSON-encoded operations to an in-process
//! [`RunRegistry`](pagerun_engine::registry::RunRegistry), printing each response as a JSON line.
//! This is the same path a transport takes, minus the network.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod script;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
