//! Pipeline configuration.

use std::path::{Path, PathBuf};

use ledger_anchor_core::{CommitmentMode, DigestAlgorithm, EntryLimits, DEFAULT_MAX_BATCH_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{AnchorError, Result};

/// Environment variable prefix. Nested keys use `__`, e.g.
/// `LEDGER_ANCHOR__MAX_BATCH_SIZE` or `LEDGER_ANCHOR__LIMITS__MAX_ACCOUNT_LEN`.
pub const ENV_PREFIX: &str = "LEDGER_ANCHOR";

/// What to do with entries that fail validation or canonicalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectPolicy {
    /// Drop them, report them, anchor the rest.
    #[default]
    Skip,
    /// Abort the run before anything is hashed.
    FailRun,
}

/// Anchoring configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Maximum entries per batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Hash function for entry digests and Merkle nodes.
    #[serde(default)]
    pub digest: DigestAlgorithm,

    /// What the signature covers.
    #[serde(default)]
    pub commitment: CommitmentMode,

    #[serde(default)]
    pub reject_policy: RejectPolicy,

    /// Signing key file.
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Deadline for one submission, in milliseconds.
    #[serde(default)]
    pub submit_timeout_ms: Option<u64>,

    /// External-ledger field limits, checked after validation when set.
    #[serde(default)]
    pub limits: Option<EntryLimits>,
}

fn environment() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX).separator("__")
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            digest: DigestAlgorithm::default(),
            commitment: CommitmentMode::default(),
            reject_policy: RejectPolicy::default(),
            key_path: None,
            submit_timeout_ms: None,
            limits: None,
        }
    }
}

impl AnchorConfig {
    /// Load from an optional TOML file, then `LEDGER_ANCHOR__*` environment
    /// variables, and validate.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or the result is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, environment: ::config::Environment) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let config = builder.add_source(environment).build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(AnchorError::InvalidConfig(
                "max_batch_size must be a positive integer".into(),
            ));
        }
        if let Some(limits) = &self.limits {
            if self.max_batch_size > limits.max_batch_entries {
                return Err(AnchorError::InvalidConfig(format!(
                    "max_batch_size {} exceeds the external limit of {} entries",
                    self.max_batch_size, limits.max_batch_entries
                )));
            }
        }
        if self.submit_timeout_ms == Some(0) {
            return Err(AnchorError::InvalidConfig(
                "submit_timeout_ms must be positive when set".into(),
            ));
        }
        Ok(())
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    pub fn with_commitment(mut self, commitment: CommitmentMode) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn with_reject_policy(mut self, reject_policy: RejectPolicy) -> Self {
        self.reject_policy = reject_policy;
        self
    }

    pub fn with_limits(mut self, limits: EntryLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_submit_timeout_ms(mut self, ms: u64) -> Self {
        self.submit_timeout_ms = Some(ms);
        self
    }
}
