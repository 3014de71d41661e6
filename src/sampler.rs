//! Next-token selection by count + offset, without materialising the candidate set.
//!
//! Every corpus row matching a context is one equally likely draw. Because repeated
//! transitions are stored as repeated rows, a uniform offset into the matching rows
//! reproduces the empirical next-token distribution.

use log::warn;
use rand::Rng;
use rusqlite::Connection;

use crate::context::{Context, Successor};
use crate::error::Result;
use crate::store::{count_matching, successor_at};

/// Draws one successor of `context`, optionally restricted to rows from `author`.
///
/// Returns `Ok(None)` when the context has no recorded successor. A returned
/// [`Successor::End`] means the drawn row ended its message.
pub fn sample_successor<R: Rng + ?Sized>(
    conn: &Connection,
    context: &Context,
    author: Option<&str>,
    rng: &mut R,
) -> Result<Option<Successor>> {
    let count = count_matching(conn, context, author)?;
    if count == 0 {
        return Ok(None);
    }
    let offset = rng.gen_range(0..count);
    let successor = successor_at(conn, context, author, offset)?;
    if successor.is_none() {
        // Rows were deleted between the two queries.
        warn!("no row at offset {offset} of {count} for context {context}");
    }
    Ok(successor)
}
