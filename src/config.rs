//! Pool sizing and loop parameters.
//!
//! Reads `SIMPOOL_THREADS`, `SIMPOOL_BATCH_SIZE` and `SIMPOOL_PLIES` so every
//! binary picks up the same overrides. Command line flags win over both.

use std::str::FromStr;

/// Rollouts a worker requests per batch. A batch is the unit of cancellation.
pub const DEFAULT_BATCH_SIZE: u32 = 10;

/// Turns looked ahead after the candidate move.
pub const DEFAULT_PLIES: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Worker count. `None` uses the hardware parallelism (at least one).
    pub workers: Option<usize>,
    pub batch_size: u32,
    pub plies: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: None,
            batch_size: DEFAULT_BATCH_SIZE,
            plies: DEFAULT_PLIES,
        }
    }
}

impl PoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_plies(mut self, plies: u32) -> Self {
        self.plies = plies;
        self
    }

    /// Defaults overridden by any parseable environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            workers: parse(&lookup, "SIMPOOL_THREADS").or(defaults.workers),
            batch_size: parse(&lookup, "SIMPOOL_BATCH_SIZE").unwrap_or(defaults.batch_size),
            plies: parse(&lookup, "SIMPOOL_PLIES").unwrap_or(defaults.plies),
        }
    }

    /// Worker count after applying the hardware default.
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| num_cpus::get().max(1))
    }
}

/// Unparseable or out-of-range values yield `None`.
fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}
