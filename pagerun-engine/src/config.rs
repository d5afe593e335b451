// Copyright (c) The pagerun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine configuration.
//!
//! The embedded default configuration is layered under an optional repository configuration at
//! `.config/pagerun.toml` (or an explicitly specified file).

use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::Utf8Path;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Overall configuration for the pagerun engine.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct EngineConfig {
    /// Registry behavior.
    pub registry: RegistryConfig,

    /// How pending pages are stored.
    pub pages: PagesConfig,

    /// Values recorded in reports.
    pub report: ReportConfig,
}

/// Configuration for the run registry.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct RegistryConfig {
    /// Whether referencing the nil run identifier creates that run on demand.
    pub allow_nil_run: bool,
}

/// Configuration for pending test pages.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct PagesConfig {
    /// Whether the owning run identifier is appended to each stored page.
    pub tag_run_id: bool,

    /// The query parameter carrying the run identifier.
    pub run_id_param: String,

    /// The query parameter carrying the test filter.
    pub filter_param: String,
}

/// Configuration for values recorded in reports.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct ReportConfig {
    /// The user recorded as owning each run. `None` means the current OS user.
    #[serde(default)]
    pub run_user: Option<String>,

    /// The name of the settings element.
    pub settings_name: String,

    /// The name of the test list entries are grouped under.
    pub test_list_name: String,
}

impl EngineConfig {
    /// The location of the repository config, relative to the root directory.
    pub const CONFIG_PATH: &'static str = ".config/pagerun.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the given file, or if not specified from `.config/pagerun.toml` in
    /// the given root directory.
    ///
    /// An explicitly specified file must exist. Unknown keys are reported as warnings.
    pub fn from_sources(
        config_file: Option<&Utf8Path>,
        root: &Utf8Path,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (config, unknown) = Self::build_and_deserialize_config(builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            warn!(
                "ignoring unknown configuration keys in {config_file}: {}",
                unknown.into_iter().collect::<Vec<_>>().join(", ")
            );
        }

        Ok(config)
    }

    /// Returns the run user to record, falling back to the current OS user.
    pub fn run_user(&self) -> String {
        match &self.report.run_user {
            Some(user) => user.clone(),
            None => whoami::username().unwrap_or_else(|_| "unknown".to_owned()),
        }
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<(Self, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: EngineConfig = serde_path_to_error::deserialize(ignored_de).map_err(|error| {
            // The config crate reports the key as well; drop it in favor of the path.
            let path = error.path().clone();
            let error = match error.into_inner() {
                ConfigError::At { error, .. } => *error,
                other => other,
            };
            ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                path, error,
            )))
        })?;

        Ok((config, ignored))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let (config, unknown) = Self::build_and_deserialize_config(Self::make_default_config())
            .expect("default config is always valid");
        debug_assert!(
            unknown.is_empty(),
            "found unknown keys in default config: {unknown:?}"
        );
        config
    }
}
