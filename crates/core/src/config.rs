//! Tablet write-path configuration.
//!
//! This module provides the knobs an embedding tablet hands to its operations.

use serde::{Deserialize, Serialize};

/// Write-path configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabletConfig {
    /// Panic instead of logging when an operation completes twice (default: false).
    ///
    /// A second completion is always a caller bug. The lenient default logs
    /// the offending status at error level and drops it.
    pub fatal_on_double_completion: bool,

    /// Maximum number of entries in a single write batch (default: 65536).
    ///
    /// Each entry consumes one write id of the operation's version range.
    pub max_write_batch_entries: usize,

    /// Number of raw key bytes rendered in log messages (default: 40).
    pub debug_string_max_len: usize,
}

impl Default for TabletConfig {
    fn default() -> Self {
        TabletConfig {
            fatal_on_double_completion: false,
            max_write_batch_entries: 64 * 1024,
            debug_string_max_len: 40,
        }
    }
}

impl TabletConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set double-completion strictness (builder pattern).
    pub fn with_fatal_on_double_completion(mut self, fatal: bool) -> Self {
        self.fatal_on_double_completion = fatal;
        self
    }

    /// Set write batch limit (builder pattern).
    pub fn with_max_write_batch_entries(mut self, entries: usize) -> Self {
        self.max_write_batch_entries = entries;
        self
    }

    /// Set debug rendering length (builder pattern).
    pub fn with_debug_string_max_len(mut self, len: usize) -> Self {
        self.debug_string_max_len = len;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), TabletConfigError> {
        if self.max_write_batch_entries == 0 {
            return Err(TabletConfigError::EmptyWriteBatchLimit);
        }
        if self.max_write_batch_entries as u64 > u32::MAX as u64 + 1 {
            return Err(TabletConfigError::WriteBatchLimitExceedsWriteIds);
        }
        if self.debug_string_max_len == 0 {
            return Err(TabletConfigError::EmptyDebugString);
        }
        Ok(())
    }

    /// Create a configuration optimized for testing (small batches).
    pub fn for_testing() -> Self {
        TabletConfig {
            fatal_on_double_completion: false,
            max_write_batch_entries: 16,
            debug_string_max_len: 16,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TabletConfigError {
    /// Write batch limit is zero.
    #[error("Write batch limit must be at least 1")]
    EmptyWriteBatchLimit,

    /// Write batch limit exceeds the write-id space.
    #[error("Write batch limit cannot exceed the number of write ids")]
    WriteBatchLimitExceedsWriteIds,

    /// Debug rendering length is zero.
    #[error("Debug string length must be at least 1")]
    EmptyDebugString,
}
