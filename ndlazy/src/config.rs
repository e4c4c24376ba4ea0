/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Configuration for execution scopes.
//!
//! Settings can come from the environment, from a YAML file, or be set
//! in code; unset values fall back to defaults when read.

use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Environment variable overriding [`LazyConfig::worker_threads`].
pub const WORKER_THREADS_ENV: &str = "NDLAZY_WORKER_THREADS";
/// Environment variable overriding [`LazyConfig::thread_name`].
pub const THREAD_NAME_ENV: &str = "NDLAZY_THREAD_NAME";
/// Environment variable overriding [`LazyConfig::blocking_timeout`],
/// in milliseconds.
pub const BLOCKING_TIMEOUT_MS_ENV: &str = "NDLAZY_BLOCKING_TIMEOUT_MS";

const DEFAULT_THREAD_NAME: &str = "ndlazy-worker";

/// Configuration builder for [`crate::ExecScope`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    worker_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocking_timeout_ms: Option<u64>,
}

impl LazyConfig {
    /// Create a new configuration with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables. Values that do
    /// not parse are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var(WORKER_THREADS_ENV) {
            match val.parse::<usize>() {
                Ok(parsed) if parsed > 0 => config.worker_threads = Some(parsed),
                _ => tracing::warn!(var = WORKER_THREADS_ENV, value = %val, "ignoring invalid value"),
            }
        }

        if let Ok(val) = env::var(THREAD_NAME_ENV) {
            if !val.is_empty() {
                config.thread_name = Some(val);
            }
        }

        if let Ok(val) = env::var(BLOCKING_TIMEOUT_MS_ENV) {
            match val.parse::<u64>() {
                Ok(parsed) => config.blocking_timeout_ms = Some(parsed),
                Err(_) => {
                    tracing::warn!(var = BLOCKING_TIMEOUT_MS_ENV, value = %val, "ignoring invalid value")
                }
            }
        }

        config
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), anyhow::Error> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Merge with another configuration, with the other taking
    /// precedence for every value it sets.
    pub fn merge(&mut self, other: &Self) {
        if let Some(value) = other.worker_threads {
            self.worker_threads = Some(value);
        }
        if let Some(value) = &other.thread_name {
            self.thread_name = Some(value.clone());
        }
        if let Some(value) = other.blocking_timeout_ms {
            self.blocking_timeout_ms = Some(value);
        }
    }

    /// Number of worker threads; defaults to the available parallelism.
    /// Never zero, whichever source the value came from.
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    /// Name given to worker threads.
    pub fn thread_name(&self) -> String {
        self.thread_name
            .clone()
            .unwrap_or_else(|| DEFAULT_THREAD_NAME.to_string())
    }

    /// Upper bound on blocking accesses, if any. None waits forever.
    pub fn blocking_timeout(&self) -> Option<Duration> {
        self.blocking_timeout_ms.map(Duration::from_millis)
    }

    /// Set the number of worker threads. Zero is clamped to one.
    pub fn set_worker_threads(&mut self, value: usize) {
        self.worker_threads = Some(value.max(1));
    }

    /// Set the worker thread name.
    pub fn set_thread_name(&mut self, value: impl Into<String>) {
        self.thread_name = Some(value.into());
    }

    /// Set or clear the blocking timeout. Timeouts too long to count
    /// in milliseconds saturate.
    pub fn set_blocking_timeout(&mut self, value: Option<Duration>) {
        self.blocking_timeout_ms =
            value.map(|timeout| u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LazyConfig::new();
        assert!(config.worker_threads() >= 1);
        assert_eq!(config.thread_name(), "ndlazy-worker");
        assert_eq!(config.blocking_timeout(), None);
    }

    // The only test in this binary that touches the process environment.
    #[test]
    fn test_from_env() {
        // SAFETY: no other test reads or writes these variables.
        unsafe { std::env::set_var(WORKER_THREADS_ENV, "3") };
        // SAFETY: see above.
        unsafe { std::env::set_var(THREAD_NAME_ENV, "lazy") };
        // SAFETY: see above.
        unsafe { std::env::set_var(BLOCKING_TIMEOUT_MS_ENV, "not-a-number") };

        let config = LazyConfig::from_env();
        assert_eq!(config.worker_threads(), 3);
        assert_eq!(config.thread_name(), "lazy");
        assert_eq!(config.blocking_timeout(), None);

        // SAFETY: see above.
        unsafe { std::env::remove_var(WORKER_THREADS_ENV) };
        // SAFETY: see above.
        unsafe { std::env::remove_var(THREAD_NAME_ENV) };
        // SAFETY: see above.
        unsafe { std::env::remove_var(BLOCKING_TIMEOUT_MS_ENV) };
    }

    #[test]
    fn test_merge() {
        let mut base = LazyConfig::new();
        base.set_worker_threads(4);
        base.set_thread_name("base");

        let mut other = LazyConfig::new();
        other.set_blocking_timeout(Some(Duration::from_millis(250)));
        other.set_thread_name("other");

        base.merge(&other);
        assert_eq!(base.worker_threads(), 4);
        assert_eq!(base.thread_name(), "other");
        assert_eq!(base.blocking_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ndlazy.yaml");

        let mut config = LazyConfig::new();
        config.set_worker_threads(2);
        config.set_blocking_timeout(Some(Duration::from_secs(1)));
        config.to_yaml(&path).unwrap();

        let loaded = LazyConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded, config);
        // Unset values stay unset.
        assert_eq!(loaded.thread_name(), "ndlazy-worker");
    }

    #[test]
    fn test_zero_worker_threads_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.yaml");
        std::fs::write(&path, "worker_threads: 0\n").unwrap();
        let loaded = LazyConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.worker_threads(), 1);
        let scope = crate::ExecScope::new(&loaded).unwrap();
        assert!(scope.shutdown());
    }

    #[test]
    fn test_huge_blocking_timeout_saturates() {
        let mut config = LazyConfig::new();
        config.set_blocking_timeout(Some(Duration::MAX));
        assert_eq!(
            config.blocking_timeout(),
            Some(Duration::from_millis(u64::MAX))
        );
    }

    #[test]
    fn test_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.yaml");
        std::fs::write(&path, "worker_threads: 6\n").unwrap();
        let loaded = LazyConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.worker_threads(), 6);
        assert_eq!(loaded.blocking_timeout(), None);
    }
}
