// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core engine for pagerun.
//!
//! Test pages running in browsers report their progress against a shared run identifier. The
//! engine accumulates those events in a [`RunRegistry`](registry::RunRegistry), and renders
//! finalized runs as TRX reports via [`quick_trx`].
//!
//! Transports deliver already-parsed [`Operation`](operation::Operation)s to
//! [`RunRegistry::dispatch`](registry::RunRegistry::dispatch).

pub mod aggregator;
pub mod config;
pub mod context;
pub mod errors;
pub mod ids;
pub mod operation;
pub mod pages;
pub mod registry;
