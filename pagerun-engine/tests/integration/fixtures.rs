// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, FixedOffset, TimeZone};
use pagerun_engine::{config::EngineConfig, registry::RunRegistry};

/// A registry whose stored pages are the input URLs verbatim.
pub(crate) fn untagged_registry() -> RunRegistry {
    let mut config = EngineConfig::default();
    config.pages.tag_run_id = false;
    config.report.run_user = Some("harness".to_owned());
    RunRegistry::new(config)
}

pub(crate) fn timestamp(secs: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(2 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 2, 29, 23, 59, 0)
        .unwrap()
        + chrono::Duration::seconds(secs.into())
}
