//! Chat messages as handed over by the chat platform.

use serde::{Deserialize, Serialize};

/// An immutable chat message. Only the id is referenced by corpus entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stable platform message id.
    pub id: String,
    /// Platform id of the author.
    pub author_id: String,
    /// Raw text content.
    pub content: String,
    /// Whether the author is an automated account.
    #[serde(default)]
    pub is_bot: bool,
}

impl Message {
    /// Creates a message from a human author.
    pub fn new(
        id: impl Into<String>,
        author_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author_id: author_id.into(),
            content: content.into(),
            is_bot: false,
        }
    }

    /// Marks the message as authored by an automated account.
    #[must_use]
    pub fn sent_by_bot(mut self) -> Self {
        self.is_bot = true;
        self
    }
}
