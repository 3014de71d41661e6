//! Summaries describing retraining runs and corpus contents.

use std::time::Duration;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::{entry_count, message_count};

/// Outcome of a completed retraining run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrainReport {
    /// Archived messages read from storage.
    pub messages_seen: usize,
    /// Messages whose n-grams were added to the rebuilt corpus.
    pub messages_trained: usize,
    /// Messages skipped because their author was excluded.
    pub messages_excluded: usize,
    /// Corpus rows written.
    pub entries_written: usize,
    /// Corpus rows removed before rebuilding.
    pub entries_cleared: usize,
    /// Wall-clock time from transaction start to commit (vacuum excluded).
    pub duration: Duration,
    /// Whether `VACUUM` ran after the commit.
    pub vacuumed: bool,
}

/// Point-in-time size of the archive and corpus.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusStats {
    /// Archived messages.
    pub messages: u64,
    /// Corpus rows.
    pub entries: u64,
}

impl CorpusStats {
    /// Reads the current counts.
    pub fn collect(conn: &Connection) -> Result<Self> {
        Ok(Self {
            messages: message_count(conn)?,
            entries: entry_count(conn)?,
        })
    }
}
