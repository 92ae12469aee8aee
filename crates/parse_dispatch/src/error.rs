//! Error types for the dispatch loop.
//!
//! Collaborators (readers, reset sources, dispatch callbacks) report failures
//! through `anyhow::Result`. The worker boundary converts whatever it catches
//! into a [`DispatchError`], which is what `DispatchLoop::run` hands back to
//! the caller after all workers have been joined.

use thiserror::Error;

/// Result type alias for dispatch loop operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Error type for a dispatch run
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A reader rejected a record and knew where it came from
    #[error("example #{example_number}({file}:{line}): {message}")]
    Parse {
        /// Worker-local ordinal of the record being read
        example_number: usize,
        /// Source the record came from
        file: String,
        /// 1-based line in the source
        line: usize,
        /// What was wrong with the record
        message: String,
    },

    /// Any other failure while reading or dispatching
    #[error("example #{example_number}: {source:#}")]
    Example {
        /// Worker-local ordinal of the record being processed
        example_number: usize,
        /// Underlying failure
        #[source]
        source: anyhow::Error,
    },

    /// The I/O helper failed to rewind the input between passes
    #[error("failed to reset input source: {source:#}")]
    Reset {
        /// Underlying failure
        #[source]
        source: anyhow::Error,
    },

    /// A worker thread unwound instead of returning
    #[error("dispatch worker {worker_id} panicked")]
    WorkerPanicked {
        /// Index of the worker that panicked
        worker_id: usize,
    },

    /// Configuration rejected before any thread was started
    #[error("Invalid configuration '{parameter}': {reason}")]
    InvalidConfig {
        /// The offending parameter
        parameter: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The OS refused to start a thread
    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        /// Name of the thread that could not be started
        name: String,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },
}

impl DispatchError {
    /// Wraps a failure caught at the worker boundary.
    ///
    /// A [`ParseError`] anywhere in the chain keeps its position; anything
    /// else becomes [`DispatchError::Example`].
    pub(crate) fn from_worker(example_number: usize, err: anyhow::Error) -> Self {
        if let Some(parse) = err.chain().find_map(|e| e.downcast_ref::<ParseError>()) {
            return DispatchError::Parse {
                example_number,
                file: parse.file.clone(),
                line: parse.line,
                message: parse.message.clone(),
            };
        }
        DispatchError::Example {
            example_number,
            source: err,
        }
    }
}

/// A malformed record, with the position it was read from.
///
/// Readers return this inside an `anyhow::Error`; the worker recovers the
/// position when it stashes the failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{file}:{line}: {message}")]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_parse_error_keeps_position() {
        let err: anyhow::Error = ParseError::new("train.txt", 7, "missing '|'").into();
        let err = err.context("reading batch");

        match DispatchError::from_worker(3, err) {
            DispatchError::Parse {
                example_number,
                file,
                line,
                message,
            } => {
                assert_eq!(example_number, 3);
                assert_eq!(file, "train.txt");
                assert_eq!(line, 7);
                assert_eq!(message, "missing '|'");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_generic_error_display() {
        let err = DispatchError::from_worker(12, anyhow!("model diverged"));
        assert!(matches!(err, DispatchError::Example { .. }));
        assert_eq!(format!("{err}"), "example #12: model diverged");
    }

    #[test]
    fn test_parse_display_matches_log_format() {
        let err = DispatchError::Parse {
            example_number: 4,
            file: "a.txt".to_string(),
            line: 2,
            message: "bad feature value".to_string(),
        };
        assert_eq!(format!("{err}"), "example #4(a.txt:2): bad feature value");
    }

    #[test]
    fn test_invalid_config() {
        let err = DispatchError::InvalidConfig {
            parameter: "num_workers",
            reason: "must be > 0".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("Invalid configuration 'num_workers'"));
        assert!(msg.contains("must be > 0"));
    }

    #[test]
    fn test_context_survives_wrapping() {
        let err: anyhow::Result<()> = Err(anyhow!("disk gone")).context("dispatching batch");
        let err = DispatchError::from_worker(0, err.unwrap_err());
        let msg = format!("{err}");
        assert!(msg.contains("dispatching batch"));
        assert!(msg.contains("disk gone"));
    }
}
