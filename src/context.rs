//! Fixed-order lookup keys and successor values for the fourth-order chain.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of preceding tokens used as context.
pub const ORDER: usize = 4;

/// Four preceding tokens, oldest first. `None` marks "no history yet" at the start of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    slots: [Option<String>; ORDER],
}

impl Context {
    /// The all-null context that begins every message.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a context from explicit slots, oldest first.
    #[must_use]
    pub fn from_slots(slots: [Option<String>; ORDER]) -> Self {
        Self { slots }
    }

    /// Takes the last [`ORDER`] tokens of `tokens`, left-padding with `None` when fewer exist.
    #[must_use]
    pub fn from_tail<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut ctx = Self::empty();
        let start = tokens.len().saturating_sub(ORDER);
        for token in &tokens[start..] {
            ctx.push(token.as_ref());
        }
        ctx
    }

    /// Shifts the window left by one and appends `token` as the most recent slot.
    pub fn push(&mut self, token: &str) {
        self.slots.rotate_left(1);
        self.slots[ORDER - 1] = Some(token.to_owned());
    }

    /// Slots oldest first.
    #[must_use]
    pub fn slots(&self) -> &[Option<String>; ORDER] {
        &self.slots
    }

    /// Returns `true` when no slot holds a token.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

/// What follows a context: another token, or the end of the message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Successor {
    /// The next token.
    Token(String),
    /// The message ended here.
    End,
}

impl Successor {
    /// Maps the stored nullable column onto a successor.
    #[must_use]
    pub fn from_column(value: Option<String>) -> Self {
        value.map_or(Self::End, Self::Token)
    }

    /// Nullable column value for storage.
    #[must_use]
    pub fn as_column(&self) -> Option<&str> {
        match self {
            Self::Token(token) => Some(token),
            Self::End => None,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, slot) in self.slots.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match slot {
                Some(token) => write!(f, "{token:?}")?,
                None => f.write_str("_")?,
            }
        }
        f.write_str("]")
    }
}
