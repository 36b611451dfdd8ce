//! Per-scope configuration.

use std::time::Duration;

use crate::sequence::SequenceTable;

/// Configuration for a scope.
#[derive(Debug, Clone)]
pub struct ScopeConfig {
    /// Trailing-edge window for coalescing global changes per instance.
    pub debounce: Duration,
    /// Longest allowed `extend` chain, counting the definition itself.
    pub max_extend_depth: usize,
    /// Jobs a single flush may run before it gives up.
    pub max_jobs_per_flush: usize,
    /// Steps of every lifecycle pipeline.
    pub sequences: SequenceTable,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(10),
            max_extend_depth: 16,
            max_jobs_per_flush: 10_000,
            sequences: SequenceTable::default(),
        }
    }
}

impl ScopeConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global-change debounce window (builder).
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the maximum extend depth (builder).
    pub fn with_max_extend_depth(mut self, depth: usize) -> Self {
        self.max_extend_depth = depth;
        self
    }

    /// Set the per-flush job limit (builder).
    pub fn with_max_jobs_per_flush(mut self, limit: usize) -> Self {
        self.max_jobs_per_flush = limit;
        self
    }

    /// Replace the sequence table (builder).
    pub fn with_sequences(mut self, sequences: SequenceTable) -> Self {
        self.sequences = sequences;
        self
    }
}
