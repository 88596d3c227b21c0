//! Configuration Module
//!
//! Handles loading the settings of the sweep runtime from environment variables.

use std::env;

/// Sweep runtime configuration parameters.
///
/// Read once, when the shared sweep runtime is first needed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of worker threads driving expiration timers
    pub sweep_workers: usize,
    /// Thread name prefix of the sweep runtime
    pub sweep_thread_name: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_SWEEP_WORKERS` - Worker threads of the sweep runtime (default: 1)
    /// - `CACHE_SWEEP_THREAD_NAME` - Thread name prefix (default: "cache-sweeper")
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Creates a new Config from variables supplied by `lookup`.
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            sweep_workers: lookup("CACHE_SWEEP_WORKERS")
                .and_then(|v| v.parse().ok())
                .filter(|workers: &usize| *workers > 0)
                .unwrap_or(defaults.sweep_workers),
            sweep_thread_name: lookup("CACHE_SWEEP_THREAD_NAME")
                .filter(|name| !name.is_empty())
                .unwrap_or(defaults.sweep_thread_name),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_workers: 1,
            sweep_thread_name: "cache-sweeper".to_string(),
        }
    }
}
