//! Configuration builders controlling storage, generation, retraining, and archive import.

use std::time::Duration;

use crate::error::{MarkovError, Result};
use serde::{Deserialize, Serialize};

/// Default cap on the total number of tokens in a generated sentence.
pub const DEFAULT_MAX_TOKENS: usize = 1000;

/// Default number of trained messages between retrain progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

/// Connection settings applied whenever a corpus database is opened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Switches file databases to write-ahead logging so readers never block on a retrain.
    pub wal: bool,
    /// How long a writer waits on a locked database before giving up, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            wal: true,
            busy_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    /// Returns a builder initialised with [`StoreConfig::default`].
    #[must_use]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// Busy timeout as a [`Duration`].
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Builder for [`StoreConfig`].
#[derive(Debug, Default, Clone)]
pub struct StoreBuilder {
    cfg: StoreConfig,
}

impl StoreBuilder {
    /// Enables or disables write-ahead logging.
    #[must_use]
    pub fn wal(mut self, enabled: bool) -> Self {
        self.cfg.wal = enabled;
        self
    }

    /// Sets the busy timeout in milliseconds.
    #[must_use]
    pub fn busy_timeout_ms(mut self, value: u64) -> Self {
        self.cfg.busy_timeout_ms = value;
        self
    }

    /// Finalises the builder, returning the [`StoreConfig`].
    pub fn build(self) -> StoreConfig {
        self.cfg
    }
}

/// Configuration for sentence generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Hard cap on prompt plus generated tokens before generation is aborted as runaway.
    pub max_tokens: usize,
    /// Seeds the sampler RNG; `None` draws from system entropy.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Returns a builder initialised with [`GeneratorConfig::default`].
    #[must_use]
    pub fn builder() -> GeneratorBuilder {
        GeneratorBuilder::default()
    }

    /// Validates the invariants required for generation.
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(MarkovError::InvalidConfig(
                "max_tokens must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug, Default, Clone)]
pub struct GeneratorBuilder {
    cfg: GeneratorConfig,
}

impl GeneratorBuilder {
    /// Sets the runaway token cap.
    #[must_use]
    pub fn max_tokens(mut self, value: usize) -> Self {
        self.cfg.max_tokens = value;
        self
    }

    /// Fixes the sampler seed for reproducible output.
    #[must_use]
    pub fn seed(mut self, value: Option<u64>) -> Self {
        self.cfg.seed = value;
        self
    }

    /// Finalises the builder, returning a validated [`GeneratorConfig`].
    pub fn build(self) -> Result<GeneratorConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Configuration for a full corpus rebuild.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrainConfig {
    /// Number of trained messages between progress reports.
    pub progress_interval: usize,
    /// Runs `VACUUM` after the rebuild commits.
    pub vacuum: bool,
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            vacuum: true,
        }
    }
}

impl RetrainConfig {
    /// Returns a builder initialised with [`RetrainConfig::default`].
    #[must_use]
    pub fn builder() -> RetrainBuilder {
        RetrainBuilder::default()
    }

    /// Validates the invariants required for retraining.
    pub fn validate(&self) -> Result<()> {
        if self.progress_interval == 0 {
            return Err(MarkovError::InvalidConfig(
                "progress_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`RetrainConfig`].
#[derive(Debug, Default, Clone)]
pub struct RetrainBuilder {
    cfg: RetrainConfig,
}

impl RetrainBuilder {
    /// Sets how many trained messages pass between progress reports.
    #[must_use]
    pub fn progress_interval(mut self, value: usize) -> Self {
        self.cfg.progress_interval = value;
        self
    }

    /// Enables or disables the post-commit `VACUUM`.
    #[must_use]
    pub fn vacuum(mut self, enabled: bool) -> Self {
        self.cfg.vacuum = enabled;
        self
    }

    /// Finalises the builder, returning a validated [`RetrainConfig`].
    pub fn build(self) -> Result<RetrainConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Configuration controlling how message archives are discovered on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportConfig {
    /// Enables recursive directory traversal.
    pub recursive: bool,
    /// Follows symlinks encountered during traversal.
    pub follow_symlinks: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_symlinks: false,
        }
    }
}
