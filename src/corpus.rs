//! The [`Corpus`] handle: one database connection plus the operations exposed to callers.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;
use rustc_hash::FxHashSet;

use crate::archive::{import_messages, ImportSummary};
use crate::config::{GeneratorConfig, RetrainConfig, StoreConfig};
use crate::error::{MarkovError, Result};
use crate::generator;
use crate::ingest::{self, IngestOutcome};
use crate::message::Message;
use crate::metrics::{CorpusStats, RetrainReport};
use crate::retrain::{retrain_in, spawn_retrain, RetrainHandle};
use crate::store;

/// A corpus database opened for ingestion and generation.
///
/// Handles are independent: tests can open isolated in-memory corpora side by side.
#[derive(Debug)]
pub struct Corpus {
    conn: Connection,
    path: Option<PathBuf>,
    store_cfg: StoreConfig,
}

impl Corpus {
    /// Opens or creates a file-backed corpus.
    pub fn open<P: AsRef<Path>>(path: P, store_cfg: StoreConfig) -> Result<Self> {
        let conn = store::open(path.as_ref(), &store_cfg)?;
        Ok(Self {
            conn,
            path: Some(path.as_ref().to_path_buf()),
            store_cfg,
        })
    }

    /// Opens a private in-memory corpus.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: store::open_in_memory()?,
            path: None,
            store_cfg: StoreConfig::default(),
        })
    }

    /// Database file backing this corpus, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Underlying connection, for direct use of [`crate::store`] queries.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Archives `message` and trains on it. See [`ingest::train_on_message`].
    pub fn train_on_message(&mut self, message: &Message) -> Result<IngestOutcome> {
        ingest::train_on_message(&mut self.conn, message)
    }

    /// Forgets a message and its corpus rows. See [`ingest::forget_message`].
    pub fn forget_message(&mut self, message_id: &str) -> Result<usize> {
        ingest::forget_message(&mut self.conn, message_id)
    }

    /// Archives a batch of messages without training on them.
    pub fn import<'a, I>(&mut self, messages: I) -> Result<ImportSummary>
    where
        I: IntoIterator<Item = &'a Message>,
    {
        import_messages(&mut self.conn, messages)
    }

    /// Generates a sentence with default settings and an entropy-seeded RNG.
    pub fn generate(&self, prompt: &str, author: Option<&str>) -> Result<String> {
        self.generate_with_config(prompt, author, &GeneratorConfig::default())
    }

    /// Generates a sentence, seeding the RNG from `cfg.seed` when set.
    pub fn generate_with_config(
        &self,
        prompt: &str,
        author: Option<&str>,
        cfg: &GeneratorConfig,
    ) -> Result<String> {
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.generate_with(prompt, author, cfg, &mut rng)
    }

    /// Generates a sentence with a caller-supplied RNG.
    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        prompt: &str,
        author: Option<&str>,
        cfg: &GeneratorConfig,
        rng: &mut R,
    ) -> Result<String> {
        generator::generate(&self.conn, prompt, author, cfg, rng)
    }

    /// Starts a background rebuild of a file-backed corpus.
    ///
    /// The worker opens its own connection. Generation through this handle is unaffected and
    /// sees the previous corpus until the rebuild commits; ingestion and other writes wait for
    /// the rebuild's write lock up to the store's busy timeout.
    pub fn retrain(
        &self,
        excluded: FxHashSet<String>,
        cfg: RetrainConfig,
    ) -> Result<RetrainHandle> {
        let path = self.path.clone().ok_or_else(|| {
            MarkovError::InvalidConfig(
                "background retraining needs a file-backed corpus; use retrain_blocking".into(),
            )
        })?;
        spawn_retrain(path, self.store_cfg.clone(), excluded, cfg)
    }

    /// Rebuilds the corpus on the calling thread.
    pub fn retrain_blocking<F>(
        &mut self,
        excluded: &FxHashSet<String>,
        cfg: &RetrainConfig,
        on_progress: F,
    ) -> Result<RetrainReport>
    where
        F: FnMut(usize),
    {
        retrain_in(&mut self.conn, excluded, cfg, on_progress)
    }

    /// Authors of archived messages flagged as automated.
    pub fn bot_author_ids(&self) -> Result<FxHashSet<String>> {
        store::bot_author_ids(&self.conn)
    }

    /// Current archive and corpus sizes.
    pub fn stats(&self) -> Result<CorpusStats> {
        CorpusStats::collect(&self.conn)
    }
}
