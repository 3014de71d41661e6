//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = MarkovError> = std::result::Result<T, E>;

/// Domain-specific error describing failures during storage, generation, or retraining.
#[derive(Debug, Error)]
pub enum MarkovError {
    /// A non-empty prompt whose trailing context never occurs in the corpus.
    #[error("cannot extrapolate from prompt {prompt:?}")]
    CannotExtrapolate {
        /// Prompt exactly as supplied by the caller.
        prompt: String,
    },
    /// Generation exceeded the configured token cap, usually because of a corpus cycle.
    #[error("runaway generation: exceeded {limit} tokens")]
    RunawayGeneration {
        /// Token cap that was exceeded.
        limit: usize,
    },
    /// Error reported by SQLite, propagated unmodified.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// A message archive line could not be decoded.
    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        /// Archive file containing the malformed line.
        path: PathBuf,
        /// 1-indexed line number.
        line: usize,
        /// Decoder diagnostic.
        message: String,
    },
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The retraining worker failed or went away before reporting completion.
    #[error("retrain failed: {0}")]
    Retrain(String),
    /// Catch-all variant for invariants that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarkovError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// Returns `true` for generation outcomes a caller should report rather than treat as faults.
    #[must_use]
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            Self::CannotExtrapolate { .. } | Self::RunawayGeneration { .. }
        )
    }
}
