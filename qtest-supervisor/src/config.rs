// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for qt-testrunner.
//!
//! Configuration is layered: the embedded default config comes first, then an optional
//! repository-specific file, and finally any command-line overrides applied to the resolved
//! [`SupervisorProfile`].

use crate::{
    errors::{ConfigReadError, ConfigReadErrorKind, ProfileNotFound},
    invocation::WrapperRegistry,
    retry::RetryPolicy,
};
use camino::Utf8Path;
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};
use tracing::debug;

/// Configuration for qt-testrunner.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    default_profile: String,
    profiles: BTreeMap<String, ProfileImpl>,
    wrappers: WrappersImpl,
}

impl SupervisorConfig {
    /// The location of the repository config relative to the current directory.
    pub const CONFIG_PATH: &'static str = ".config/qt-testrunner.toml";

    /// Contains the default config as a TOML file.
    ///
    /// The default rules included with this copy of qtest-supervisor are:
    ///
    /// ```toml
    #[doc = include_str!("../default-config.toml")]
    /// ```
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// The name of the profile every other profile inherits from.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the config from the given file, or if not present from `.config/qt-testrunner.toml`
    /// in the given directory.
    ///
    /// If the file isn't specified and the directory doesn't have a config file, uses the default
    /// config options.
    pub fn from_sources(
        config_file: Option<&Utf8Path>,
        dir: &Utf8Path,
    ) -> Result<Self, ConfigReadError> {
        let mut config = Self::default();

        let repo_config = match config_file {
            Some(file) => Some((file.to_owned(), Self::read_file(file)?)),
            None => {
                let default_file = dir.join(Self::CONFIG_PATH);
                if default_file.is_file() {
                    let repo_config = Self::read_file(&default_file)?;
                    Some((default_file, repo_config))
                } else {
                    None
                }
            }
        };

        if let Some((file, repo_config)) = repo_config {
            debug!("layering config from {file}");
            config.merge(repo_config);
        }

        Ok(config)
    }

    /// Returns the profile with the given name, the default profile if not specified, or an error
    /// if a profile was specified but not found.
    pub fn profile(&self, name: Option<&str>) -> Result<SupervisorProfile, ProfileNotFound> {
        let name = name.unwrap_or(self.default_profile.as_str());
        let named = self
            .profiles
            .get(name)
            .ok_or_else(|| ProfileNotFound::new(name, self.profiles.keys()))?;

        // Every profile inherits unset values from the default profile, which the embedded config
        // always fills in completely.
        let mut resolved = SupervisorProfile::builtin(name);
        if let Some(default) = self.profiles.get(Self::DEFAULT_PROFILE) {
            resolved.apply(default);
        }
        resolved.apply(named);
        Ok(resolved)
    }

    /// Returns the registry of known wrapper scripts.
    pub fn wrapper_registry(&self) -> WrapperRegistry {
        WrapperRegistry::new(
            self.wrappers.passthrough.iter().cloned(),
            self.wrappers.separator.iter().cloned(),
        )
    }

    // ---
    // Helper methods
    // ---

    fn read_file(file: &Utf8Path) -> Result<ConfigImpl, ConfigReadError> {
        let data = std::fs::read_to_string(file)
            .map_err(|err| ConfigReadError::new(file, ConfigReadErrorKind::Read(err)))?;
        toml::from_str(&data).map_err(|err| {
            ConfigReadError::new(file, ConfigReadErrorKind::Deserialize(Box::new(err)))
        })
    }

    fn merge(&mut self, other: ConfigImpl) {
        if let Some(default_profile) = other.default_profile {
            self.default_profile = default_profile;
        }

        for (name, profile) in other.profiles {
            self.profiles
                .entry(name)
                .and_modify(|existing| existing.overlay(&profile))
                .or_insert(profile);
        }

        for wrapper in other.wrappers.passthrough {
            if !self.wrappers.passthrough.contains(&wrapper) {
                self.wrappers.passthrough.push(wrapper);
            }
        }
        for wrapper in other.wrappers.separator {
            if !self.wrappers.separator.contains(&wrapper) {
                self.wrappers.separator.push(wrapper);
            }
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        let config: ConfigImpl =
            toml::from_str(Self::DEFAULT_CONFIG).expect("default config should be valid");
        Self {
            default_profile: config
                .default_profile
                .unwrap_or_else(|| Self::DEFAULT_PROFILE.to_owned()),
            profiles: config.profiles,
            wrappers: config.wrappers,
        }
    }
}

/// A fully resolved profile.
///
/// Command-line overrides are applied through the setters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupervisorProfile {
    name: String,
    max_repeats: u32,
    passes_needed: u32,
    crash_reruns: u32,
    timeout: Option<Duration>,
    no_rerun_functions: Vec<String>,
}

impl SupervisorProfile {
    fn builtin(name: &str) -> Self {
        let policy = RetryPolicy::default();
        Self {
            name: name.to_owned(),
            max_repeats: policy.max_repeats,
            passes_needed: policy.passes_needed,
            crash_reruns: policy.crash_reruns,
            timeout: None,
            no_rerun_functions: policy.no_rerun_functions.into_iter().collect(),
        }
    }

    fn apply(&mut self, profile: &ProfileImpl) {
        if let Some(max_repeats) = profile.max_repeats {
            self.max_repeats = max_repeats;
        }
        if let Some(passes_needed) = profile.passes_needed {
            self.passes_needed = passes_needed;
        }
        if let Some(crash_reruns) = profile.crash_reruns {
            self.crash_reruns = crash_reruns;
        }
        if profile.timeout.is_some() {
            self.timeout = profile.timeout;
        }
        if let Some(functions) = &profile.no_rerun_functions {
            self.no_rerun_functions.clone_from(functions);
        }
    }

    /// Returns the name of this profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the per-attempt timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Overrides the per-test-case rerun budget.
    pub fn set_max_repeats(&mut self, max_repeats: u32) -> &mut Self {
        self.max_repeats = max_repeats;
        self
    }

    /// Overrides the number of passes needed for a flaky test case.
    pub fn set_passes_needed(&mut self, passes_needed: u32) -> &mut Self {
        self.passes_needed = passes_needed;
        self
    }

    /// Overrides the whole-executable rerun budget after crashes.
    pub fn set_crash_reruns(&mut self, crash_reruns: u32) -> &mut Self {
        self.crash_reruns = crash_reruns;
        self
    }

    /// Overrides the per-attempt timeout.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the retry policy described by this profile.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_repeats: self.max_repeats,
            passes_needed: self.passes_needed,
            crash_reruns: self.crash_reruns,
            no_rerun_functions: self.no_rerun_functions.iter().cloned().collect(),
        }
    }
}

/// One config file, as deserialized.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigImpl {
    #[serde(default)]
    default_profile: Option<String>,
    #[serde(default, rename = "profile")]
    profiles: BTreeMap<String, ProfileImpl>,
    #[serde(default)]
    wrappers: WrappersImpl,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ProfileImpl {
    #[serde(default)]
    max_repeats: Option<u32>,
    #[serde(default)]
    passes_needed: Option<u32>,
    #[serde(default)]
    crash_reruns: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
    #[serde(default)]
    no_rerun_functions: Option<Vec<String>>,
}

impl ProfileImpl {
    fn overlay(&mut self, other: &ProfileImpl) {
        if other.max_repeats.is_some() {
            self.max_repeats = other.max_repeats;
        }
        if other.passes_needed.is_some() {
            self.passes_needed = other.passes_needed;
        }
        if other.crash_reruns.is_some() {
            self.crash_reruns = other.crash_reruns;
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        if other.no_rerun_functions.is_some() {
            self.no_rerun_functions.clone_from(&other.no_rerun_functions);
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct WrappersImpl {
    #[serde(default)]
    passthrough: Vec<String>,
    #[serde(default)]
    separator: Vec<String>,
}
