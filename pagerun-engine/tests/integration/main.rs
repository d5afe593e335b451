// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the engine, driven through the public registry and dispatch APIs.

mod concurrency;
mod dispatch;
mod fixtures;
mod scenarios;
