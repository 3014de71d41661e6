//! Hooks keeping the corpus in step with message creation and deletion.

use log::debug;
use rusqlite::Connection;

use crate::context::{Context, Successor};
use crate::error::Result;
use crate::message::Message;
use crate::store::{delete_entries, delete_message, insert_entry, insert_message};
use crate::tokenizer::tokenize;

/// What [`train_on_message`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Archived and added to the corpus with this many entries.
    Trained {
        /// Rows inserted: token count plus the end-of-message row.
        entries: usize,
    },
    /// Archived only, because the author is automated.
    ArchivedOnly,
    /// Already archived; nothing changed.
    Duplicate,
}

/// Inserts the n-gram rows for `message`: one per token plus a trailing end-of-message row.
///
/// Runs on whatever connection or transaction it is given and opens none of its own.
pub fn insert_message_entries(conn: &Connection, message: &Message) -> Result<usize> {
    let mut context = Context::empty();
    let mut inserted = 0usize;
    for token in tokenize(&message.content) {
        insert_entry(
            conn,
            &message.id,
            &message.author_id,
            &context,
            &Successor::Token(token.to_owned()),
        )?;
        context.push(token);
        inserted += 1;
    }
    insert_entry(
        conn,
        &message.id,
        &message.author_id,
        &context,
        &Successor::End,
    )?;
    Ok(inserted + 1)
}

/// Archives `message` and, unless it came from a bot, trains the corpus on it, atomically.
///
/// Redelivering an archived message is a no-op so the call is safe to retry.
pub fn train_on_message(conn: &mut Connection, message: &Message) -> Result<IngestOutcome> {
    let tx = conn.transaction()?;
    let outcome = if !insert_message(&tx, message)? {
        IngestOutcome::Duplicate
    } else if message.is_bot {
        IngestOutcome::ArchivedOnly
    } else {
        let entries = insert_message_entries(&tx, message)?;
        IngestOutcome::Trained { entries }
    };
    tx.commit()?;
    debug!("ingested message {}: {outcome:?}", message.id);
    Ok(outcome)
}

/// Removes `message_id` from the archive and drops its corpus rows, atomically.
///
/// Returns the number of corpus rows removed.
pub fn forget_message(conn: &mut Connection, message_id: &str) -> Result<usize> {
    let tx = conn.transaction()?;
    delete_message(&tx, message_id)?;
    let removed = delete_entries(&tx, message_id)?;
    tx.commit()?;
    debug!("forgot message {message_id}: removed {removed} entries");
    Ok(removed)
}
