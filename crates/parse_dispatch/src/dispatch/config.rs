//! src/dispatch/config.rs
//!
//! Configuration for a dispatch run.
//!
//! The `DispatchConfig` struct stores the parameters that control how many
//! workers read, how many passes make up a run, and how long a pass is.
//!
//! Example:
//! ```ignore
//! let config = DispatchConfig::builder()
//!     .num_workers(4)
//!     .num_passes(3)
//!     .pass_length(10_000)
//!     .build();
//! ```
//!
//! # Pass length and example budget
//! - `pass_length`: a worker stops reading for the current pass once its own
//!                  count of records reaches this value. Grows to
//!                  `2 * pass_length + 1` when every scheduled pass consumed
//!                  exactly `pass_length` records.
//! - `max_examples`: a worker stops reading once its own count reaches it.

use crate::error::{DispatchError, Result};

/// Configuration for a dispatch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Number of worker threads (must be > 0)
    pub num_workers: usize,
    /// Passes over the input before the run ends (must be > 0)
    pub num_passes: usize,
    /// Records per worker per pass (None = until the input is exhausted)
    pub pass_length: Option<usize>,
    /// Records per worker before it stops reading (None = unlimited)
    pub max_examples: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            num_workers: 1,
            num_passes: 1,
            pass_length: None,
            max_examples: None,
        }
    }
}

impl DispatchConfig {
    pub fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder::default()
    }

    /// Checks the configuration before any thread is started.
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(DispatchError::InvalidConfig {
                parameter: "num_workers",
                reason: "at least one worker is required".to_string(),
            });
        }
        if self.num_passes == 0 {
            return Err(DispatchError::InvalidConfig {
                parameter: "num_passes",
                reason: "a run needs at least one pass".to_string(),
            });
        }
        if self.pass_length == Some(0) {
            return Err(DispatchError::InvalidConfig {
                parameter: "pass_length",
                reason: "a pass must allow at least one record".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn effective_pass_length(&self) -> usize {
        self.pass_length.unwrap_or(usize::MAX)
    }

    pub(crate) fn effective_max_examples(&self) -> usize {
        self.max_examples.unwrap_or(usize::MAX)
    }
}

/// Builder for DispatchConfig with method chaining
#[derive(Default)]
pub struct DispatchConfigBuilder {
    config: DispatchConfig,
}

impl DispatchConfigBuilder {
    /// Set the number of worker threads
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = workers;
        self
    }

    /// Set the number of passes over the input
    pub fn num_passes(mut self, passes: usize) -> Self {
        self.config.num_passes = passes;
        self
    }

    /// Set the initial pass length.
    pub fn pass_length(mut self, length: usize) -> Self {
        self.config.pass_length = Some(length);
        self
    }

    /// Set the per-worker example budget.
    pub fn max_examples(mut self, max: usize) -> Self {
        self.config.max_examples = Some(max);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> DispatchConfig {
        self.config
    }
}
