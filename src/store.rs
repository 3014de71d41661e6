//! SQLite persistence for the n-gram corpus and the message archive.
//!
//! Corpus rows are never updated in place: they are inserted per message, deleted per message,
//! or cleared wholesale inside a retrain transaction. All functions accept a plain
//! [`Connection`] so they can run equally on a connection or inside a
//! [`rusqlite::Transaction`] (which dereferences to one).

use std::path::Path;

use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use rustc_hash::FxHashSet;

use crate::config::StoreConfig;
use crate::context::{Context, Successor};
use crate::error::Result;
use crate::message::Message;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id        TEXT PRIMARY KEY,
    author_id TEXT NOT NULL,
    content   TEXT NOT NULL,
    is_bot    INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS markov4 (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id TEXT NOT NULL,
    author_id  TEXT NOT NULL,
    word1      TEXT,
    word2      TEXT,
    word3      TEXT,
    word4      TEXT,
    word5      TEXT
);
CREATE INDEX IF NOT EXISTS idx_markov4_author_context
    ON markov4 (author_id, word1, word2, word3, word4);
CREATE INDEX IF NOT EXISTS idx_markov4_context
    ON markov4 (word1, word2, word3, word4);
CREATE INDEX IF NOT EXISTS idx_markov4_message
    ON markov4 (message_id);
"#;

const CONTEXT_PREDICATE: &str = "word1 IS ?1 AND word2 IS ?2 AND word3 IS ?3 AND word4 IS ?4";

/// One persisted n-gram row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    /// Message the row was derived from.
    pub message_id: String,
    /// Author of that message.
    pub author_id: String,
    /// Preceding tokens.
    pub context: Context,
    /// Following token, or end of message.
    pub successor: Successor,
}

/// Opens (creating if necessary) a corpus database at `path` and applies `cfg`.
pub fn open<P: AsRef<Path>>(path: P, cfg: &StoreConfig) -> Result<Connection> {
    let conn = Connection::open(path.as_ref())?;
    conn.busy_timeout(cfg.busy_timeout())?;
    if cfg.wal {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("journal mode for {} is {mode}", path.as_ref().display());
    }
    init_schema(&conn)?;
    Ok(conn)
}

/// Opens a private in-memory corpus, mainly for tests and fixtures.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Creates the archive and corpus tables and their indexes if they are missing.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Appends one n-gram row.
pub fn insert_entry(
    conn: &Connection,
    message_id: &str,
    author_id: &str,
    context: &Context,
    successor: &Successor,
) -> Result<()> {
    let [w1, w2, w3, w4] = context.slots();
    let mut stmt = conn.prepare_cached(
        "INSERT INTO markov4 (message_id, author_id, word1, word2, word3, word4, word5)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    stmt.execute(params![
        message_id,
        author_id,
        w1.as_deref(),
        w2.as_deref(),
        w3.as_deref(),
        w4.as_deref(),
        successor.as_column(),
    ])?;
    Ok(())
}

/// Removes every row derived from `message_id`, returning how many were deleted.
pub fn delete_entries(conn: &Connection, message_id: &str) -> Result<usize> {
    let removed = conn.execute("DELETE FROM markov4 WHERE message_id = ?1", [message_id])?;
    Ok(removed)
}

/// Removes every corpus row.
pub fn clear_entries(conn: &Connection) -> Result<usize> {
    let removed = conn.execute("DELETE FROM markov4", [])?;
    Ok(removed)
}

/// Counts rows whose context equals `context`, optionally restricted to one author.
///
/// Null slots only match null columns.
pub fn count_matching(conn: &Connection, context: &Context, author: Option<&str>) -> Result<u64> {
    let [w1, w2, w3, w4] = context.slots();
    let count: i64 = match author {
        Some(author) => {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT COUNT(*) FROM markov4 WHERE author_id = ?5 AND {CONTEXT_PREDICATE}"
            ))?;
            stmt.query_row(
                params![w1.as_deref(), w2.as_deref(), w3.as_deref(), w4.as_deref(), author],
                |row| row.get(0),
            )?
        }
        None => {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT COUNT(*) FROM markov4 WHERE {CONTEXT_PREDICATE}"
            ))?;
            stmt.query_row(
                params![w1.as_deref(), w2.as_deref(), w3.as_deref(), w4.as_deref()],
                |row| row.get(0),
            )?
        }
    };
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Fetches the successor of the `offset`-th matching row (zero-based, insertion order).
///
/// Uses the same predicate as [`count_matching`]. Returns `None` when the offset is past the end.
pub fn successor_at(
    conn: &Connection,
    context: &Context,
    author: Option<&str>,
    offset: u64,
) -> Result<Option<Successor>> {
    let [w1, w2, w3, w4] = context.slots();
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    let word: Option<Option<String>> = match author {
        Some(author) => {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT word5 FROM markov4 WHERE author_id = ?5 AND {CONTEXT_PREDICATE}
                 ORDER BY id LIMIT 1 OFFSET ?6"
            ))?;
            stmt.query_row(
                params![
                    w1.as_deref(),
                    w2.as_deref(),
                    w3.as_deref(),
                    w4.as_deref(),
                    author,
                    offset
                ],
                |row| row.get(0),
            )
            .optional()?
        }
        None => {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT word5 FROM markov4 WHERE {CONTEXT_PREDICATE}
                 ORDER BY id LIMIT 1 OFFSET ?5"
            ))?;
            stmt.query_row(
                params![w1.as_deref(), w2.as_deref(), w3.as_deref(), w4.as_deref(), offset],
                |row| row.get(0),
            )
            .optional()?
        }
    };
    Ok(word.map(Successor::from_column))
}

/// Total number of corpus rows.
pub fn entry_count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM markov4", [], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Number of corpus rows attributed to `author_id`.
pub fn entry_count_for_author(conn: &Connection, author_id: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM markov4 WHERE author_id = ?1",
        [author_id],
        |row| row.get(0),
    )?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Rows derived from one message, in insertion order.
pub fn entries_for_message(conn: &Connection, message_id: &str) -> Result<Vec<CorpusEntry>> {
    let mut stmt = conn.prepare(
        "SELECT message_id, author_id, word1, word2, word3, word4, word5
         FROM markov4 WHERE message_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([message_id], |row| {
        Ok(CorpusEntry {
            message_id: row.get(0)?,
            author_id: row.get(1)?,
            context: Context::from_slots([row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?]),
            successor: Successor::from_column(row.get(6)?),
        })
    })?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Archives a message. Returns `false` when a message with the same id already exists.
pub fn insert_message(conn: &Connection, message: &Message) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO messages (id, author_id, content, is_bot) VALUES (?1, ?2, ?3, ?4)",
    )?;
    let inserted = stmt.execute(params![
        message.id,
        message.author_id,
        message.content,
        message.is_bot
    ])?;
    Ok(inserted > 0)
}

/// Removes a message from the archive. Returns `false` when it was not archived.
pub fn delete_message(conn: &Connection, message_id: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM messages WHERE id = ?1", [message_id])?;
    Ok(removed > 0)
}

/// Looks up an archived message by id.
pub fn find_message(conn: &Connection, message_id: &str) -> Result<Option<Message>> {
    let message = conn
        .query_row(
            "SELECT id, author_id, content, is_bot FROM messages WHERE id = ?1",
            [message_id],
            row_to_message,
        )
        .optional()?;
    Ok(message)
}

/// Streams every archived message in storage order without buffering the archive.
///
/// Stops at, and returns, the first error produced by `f`.
pub fn for_each_message<F>(conn: &Connection, mut f: F) -> Result<()>
where
    F: FnMut(Message) -> Result<()>,
{
    let mut stmt =
        conn.prepare("SELECT id, author_id, content, is_bot FROM messages ORDER BY rowid")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        f(row_to_message(row)?)?;
    }
    Ok(())
}

/// Number of archived messages.
pub fn message_count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Authors of archived messages flagged as automated.
pub fn bot_author_ids(conn: &Connection) -> Result<FxHashSet<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT author_id FROM messages WHERE is_bot = 1")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut ids = FxHashSet::default();
    for row in rows {
        ids.insert(row?);
    }
    Ok(ids)
}

/// Rebuilds the database file to reclaim space freed by deletions.
pub fn vacuum(conn: &Connection) -> Result<()> {
    conn.execute_batch("VACUUM")?;
    Ok(())
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        author_id: row.get(1)?,
        content: row.get(2)?,
        is_bot: row.get(3)?,
    })
}
