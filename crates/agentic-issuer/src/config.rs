//! Issuer configuration.
//!
//! Loaded from a JSON file or built from defaults. Every field has a
//! default, so a partial file only overrides what it names.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::hash::HASH_BITS;
use crate::error::{IssuerError, Result};
use crate::merkle::DEFAULT_DEPTH;

/// Top-level issuer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Base endpoint placed in identity metadata and credential-status URLs.
    pub server_url: String,
    /// Depth of every accumulator created from now on.
    pub tree_depth: usize,
    pub publisher: PublisherConfig,
    /// Publish each new state from a background task.
    pub auto_publish: bool,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8001".into(),
            tree_depth: DEFAULT_DEPTH,
            publisher: PublisherConfig::default(),
            auto_publish: false,
        }
    }
}

impl IssuerConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data).map_err(|e| {
            IssuerError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| IssuerError::SerializationError(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tree_depth == 0 || self.tree_depth > HASH_BITS {
            return Err(IssuerError::InvalidConfig(format!(
                "tree_depth must be within 1..={HASH_BITS}, got {}",
                self.tree_depth
            )));
        }
        if self.server_url.trim().is_empty() {
            return Err(IssuerError::InvalidConfig("server_url is empty".into()));
        }
        self.publisher.validate()
    }

    /// Credential-status URL for a claim's revocation nonce.
    pub fn credential_status_url(&self, identifier: &str, nonce: u64) -> String {
        format!(
            "{}/v1/{identifier}/claims/revocation/status/{nonce}",
            self.server_url.trim_end_matches('/')
        )
    }
}

/// Ledger submission and polling bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub poll_interval_ms: u64,
    /// Give up on confirmation after this long and mark the state failed.
    pub max_wait_ms: u64,
    /// Submission attempts before the state is marked failed.
    pub submit_attempts: u32,
    /// Delay before the first resubmission; doubles on each further attempt.
    pub retry_backoff_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            max_wait_ms: 60_000,
            submit_attempts: 3,
            retry_backoff_ms: 200,
        }
    }
}

impl PublisherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(IssuerError::InvalidConfig(
                "publisher.poll_interval_ms must be positive".into(),
            ));
        }
        if self.max_wait_ms < self.poll_interval_ms {
            return Err(IssuerError::InvalidConfig(
                "publisher.max_wait_ms must be at least poll_interval_ms".into(),
            ));
        }
        if self.submit_attempts == 0 {
            return Err(IssuerError::InvalidConfig(
                "publisher.submit_attempts must be positive".into(),
            ));
        }
        Ok(())
    }
}
