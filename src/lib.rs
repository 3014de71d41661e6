//! Fourth-order Markov chain text generation over a SQLite n-gram corpus.
//!
//! Messages are split into lossless tokens, and every token is stored together with the four
//! tokens preceding it. Generation walks the chain by drawing a uniformly random row among
//! those sharing the current context, which reproduces the observed next-token frequencies
//! without ever loading the candidate set into memory. The crate also exposes a `markov4`
//! command line interface.
//!
//! ```no_run
//! use markov4::{Corpus, Message, StoreConfig};
//!
//! # fn main() -> markov4::Result<()> {
//! let mut corpus = Corpus::open("markov4.sqlite3", StoreConfig::default())?;
//! corpus.train_on_message(&Message::new("1", "alice", "the quick brown fox"))?;
//! let sentence = corpus.generate("the", Some("alice"))?;
//! println!("{sentence}");
//!
//! let excluded = corpus.bot_author_ids()?;
//! let report = corpus
//!     .retrain(excluded, Default::default())?
//!     .wait(|count| println!("processed {count} messages"))?;
//! println!("rebuilt with {} entries", report.entries_written);
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature. Library-only users can disable
//! default features to avoid the CLI dependencies.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown
)]

pub mod archive;
pub mod config;
pub mod context;
pub mod corpus;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod message;
pub mod metrics;
pub mod retrain;
pub mod sampler;
pub mod store;
pub mod tokenizer;

pub use archive::ImportSummary;
pub use config::{GeneratorConfig, ImportConfig, RetrainConfig, StoreConfig};
pub use context::{Context, Successor, ORDER};
pub use corpus::Corpus;
pub use error::{MarkovError, Result};
pub use ingest::{forget_message, train_on_message, IngestOutcome};
pub use message::Message;
pub use metrics::{CorpusStats, RetrainReport};
pub use retrain::{spawn_retrain, RetrainEvent, RetrainHandle};
pub use tokenizer::{tokenize, TokenKind, Tokens};
