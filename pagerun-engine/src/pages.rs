// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Building the page URLs handed out to reporting clients.

use crate::{config::PagesConfig, ids::RunUuid};
use url::form_urlencoded;

/// Splits a comma-joined page list, dropping blank entries.
pub fn split_page_list(pages: &str) -> Vec<String> {
    pages
        .split(',')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Returns `page` with the run identifier and optional filter appended as query parameters.
///
/// Parameters go before any `#fragment`, and are joined with `&` if the URL already has a
/// query string.
pub fn tag_page(page: &str, run_id: RunUuid, filter: Option<&str>, config: &PagesConfig) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    if config.tag_run_id {
        query.append_pair(&config.run_id_param, &run_id.to_string());
    }
    if let Some(filter) = filter {
        query.append_pair(&config.filter_param, filter);
    }
    let query = query.finish();
    if query.is_empty() {
        return page.to_owned();
    }

    let (base, fragment) = match page.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (page, None),
    };
    let separator = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };

    let mut tagged = format!("{base}{separator}{query}");
    if let Some(fragment) = fragment {
        tagged.push('#');
        tagged.push_str(fragment);
    }
    tagged
}
