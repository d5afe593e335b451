// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide registry of runs.
//!
//! Locking happens in two tiers. The registry lock guards only the map from run identifiers to
//! contexts, and is released before any run is touched. Each run then has its own lock, held for
//! the full duration of an operation on that run. Operations on different runs never contend.

use crate::{
    config::EngineConfig,
    context::RunContext,
    errors::EngineError,
    ids::{NIL_RUN_ID, RunUuid},
    pages::split_page_list,
};
use chrono::{DateTime, FixedOffset, Local};
use indexmap::IndexMap;
use quick_trx::TestRun;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// The registry of active runs.
#[derive(Debug)]
pub struct RunRegistry {
    config: EngineConfig,
    run_user: String,
    runs: Mutex<IndexMap<RunUuid, RunHandle>>,
}

impl RunRegistry {
    /// Creates an empty registry.
    ///
    /// The run user is resolved here, once, since looking up the OS user may hit the disk or the
    /// network.
    pub fn new(config: EngineConfig) -> Self {
        let run_user = config.run_user();
        Self {
            config,
            run_user,
            runs: Mutex::new(IndexMap::new()),
        }
    }

    /// Returns the configuration this registry was created with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the user recorded as the owner of every run.
    pub fn run_user(&self) -> &str {
        &self.run_user
    }

    /// Creates a new run under a fresh identifier.
    pub fn create_run(&self) -> Result<RunUuid, EngineError> {
        let run_id = loop {
            let candidate = RunUuid::new_v4();
            if candidate == NIL_RUN_ID {
                continue;
            }
            // The context is built before the registry lock is taken.
            let handle = self.new_handle(candidate);
            let mut runs = self.lock_runs()?;
            if !runs.contains_key(&candidate) {
                runs.insert(candidate, handle);
                break candidate;
            }
        };
        info!("created run {run_id}");
        Ok(run_id)
    }

    /// Looks up a run.
    ///
    /// If the run doesn't exist and `run_id` is the nil identifier, the run is created on demand
    /// (unless `registry.allow-nil-run` is disabled). The nil run stays registered even if the
    /// operation that referenced it goes on to fail: creating it is part of resolving the
    /// identifier, not of the operation.
    pub fn get_or_create(&self, run_id: RunUuid) -> Result<RunHandle, EngineError> {
        if let Some(handle) = self.lock_runs()?.get(&run_id) {
            return Ok(handle.clone());
        }
        if run_id != NIL_RUN_ID || !self.config.registry.allow_nil_run {
            debug!("run {run_id} not found");
            return Err(EngineError::RunNotFound { run_id });
        }

        let handle = self.new_handle(run_id);
        let (handle, created) = {
            let mut runs = self.lock_runs()?;
            match runs.get(&run_id) {
                // Another caller created the nil run in the meantime.
                Some(existing) => (existing.clone(), false),
                None => {
                    runs.insert(run_id, handle.clone());
                    (handle, true)
                }
            }
        };
        if created {
            info!("created nil run on first reference");
        }
        Ok(handle)
    }

    /// Returns the identifiers of all registered runs, in creation order.
    pub fn list_active(&self) -> Result<Vec<RunUuid>, EngineError> {
        Ok(self.lock_runs()?.keys().copied().collect())
    }

    /// Replaces a run's pending pages with a comma-joined list, returning the number stored.
    pub fn set_pages(
        &self,
        run_id: RunUuid,
        pages: &str,
        filter: Option<&str>,
    ) -> Result<usize, EngineError> {
        let pages = split_page_list(pages);
        let handle = self.get_or_create(run_id)?;
        Ok(handle
            .lock()?
            .set_pages(pages, filter, &self.config.pages))
    }

    /// Replaces a run's test name prefix.
    pub fn set_name_prefix(&self, run_id: RunUuid, prefix: &str) -> Result<(), EngineError> {
        self.get_or_create(run_id)?.lock()?.set_name_prefix(prefix);
        Ok(())
    }

    /// Resets a run's outcome to in-progress.
    pub fn mark_in_progress(&self, run_id: RunUuid) -> Result<(), EngineError> {
        self.get_or_create(run_id)?.lock()?.mark_in_progress();
        Ok(())
    }

    /// Returns true if a run's outcome is in-progress.
    pub fn is_in_progress(&self, run_id: RunUuid) -> Result<bool, EngineError> {
        Ok(self.get_or_create(run_id)?.lock()?.is_in_progress())
    }

    /// Records the start of a test.
    pub fn log_test_start(
        &self,
        run_id: RunUuid,
        name: &str,
        start_time: DateTime<FixedOffset>,
    ) -> Result<(), EngineError> {
        self.get_or_create(run_id)?
            .lock()?
            .log_test_start(name, start_time);
        Ok(())
    }

    /// Records an assertion made by a started test.
    pub fn log_assert(
        &self,
        run_id: RunUuid,
        name: &str,
        pass: bool,
        message: &str,
        actual: &str,
        expected: &str,
    ) -> Result<(), EngineError> {
        self.get_or_create(run_id)?
            .lock()?
            .log_assert(name, pass, message, actual, expected)
    }

    /// Records the completion of a started test.
    pub fn log_test_done(
        &self,
        run_id: RunUuid,
        name: &str,
        failures: u64,
        total: u64,
        end_time: DateTime<FixedOffset>,
    ) -> Result<(), EngineError> {
        self.get_or_create(run_id)?
            .lock()?
            .log_test_done(name, failures, total, end_time)
    }

    /// Hands out a run's next pending page, or `None` once all pages are handed out.
    pub fn advance_page(&self, run_id: RunUuid) -> Result<Option<String>, EngineError> {
        Ok(self.get_or_create(run_id)?.lock()?.advance_page())
    }

    /// Finalizes a run and returns a copy of its report.
    pub fn finalized_run(&self, run_id: RunUuid) -> Result<TestRun, EngineError> {
        let handle = self.get_or_create(run_id)?;
        let mut context = handle.lock()?;
        Ok(context.finalize(now()).clone())
    }

    /// Finalizes a run and renders its report.
    pub fn get_report(&self, run_id: RunUuid) -> Result<String, EngineError> {
        self.get_or_create(run_id)?.lock()?.render_report(now())
    }

    // ---
    // Helper methods
    // ---

    fn lock_runs(&self) -> Result<MutexGuard<'_, IndexMap<RunUuid, RunHandle>>, EngineError> {
        self.runs.lock().map_err(|_| EngineError::RegistryPoisoned)
    }

    fn new_handle(&self, run_id: RunUuid) -> RunHandle {
        RunHandle {
            run_id,
            context: Arc::new(Mutex::new(RunContext::new(
                run_id,
                &self.config,
                &self.run_user,
                now(),
            ))),
        }
    }
}

/// A shared reference to one run's context.
///
/// Handles stay valid after the registry lock is released.
#[derive(Clone, Debug)]
pub struct RunHandle {
    run_id: RunUuid,
    context: Arc<Mutex<RunContext>>,
}

impl RunHandle {
    /// Returns the identifier of the run.
    pub fn run_id(&self) -> RunUuid {
        self.run_id
    }

    /// Acquires the run's lock.
    pub fn lock(&self) -> Result<MutexGuard<'_, RunContext>, EngineError> {
        self.context.lock().map_err(|_| EngineError::RunPoisoned {
            run_id: self.run_id,
        })
    }
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}
