//! Publisher — submits state hashes to the anchoring ledger and waits for
//! their confirmation within configured bounds.

use std::sync::Arc;

use tokio::time::{sleep, Instant};

use crate::config::PublisherConfig;
use crate::error::Result;

use super::ledger::{AnchorRequest, LedgerClient, LedgerStatus, TxId};

/// Terminal result of publishing one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Confirmed {
        block_number: u64,
        block_timestamp: u64,
    },
    Failed {
        reason: String,
    },
}

/// Drives a ledger client with bounded retries and a bounded wait.
#[derive(Clone)]
pub struct Publisher {
    ledger: Arc<dyn LedgerClient>,
    config: PublisherConfig,
}

impl Publisher {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: PublisherConfig) -> Self {
        Self { ledger, config }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Submit a state hash, retrying retryable errors with exponential
    /// backoff up to `submit_attempts` times.
    pub async fn submit(&self, request: &AnchorRequest) -> Result<TxId> {
        let mut backoff = self.config.retry_backoff();
        let mut attempt = 1;
        loop {
            match self.ledger.submit(request).await {
                Ok(tx_id) => {
                    log::debug!(
                        "{}: state {} submitted as {tx_id}",
                        request.identifier,
                        request.state_hash
                    );
                    return Ok(tx_id);
                }
                Err(e) if e.is_retryable() && attempt < self.config.submit_attempts => {
                    log::warn!(
                        "{}: submission attempt {attempt}/{} failed: {e}",
                        request.identifier,
                        self.config.submit_attempts
                    );
                    sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One status query.
    pub async fn poll_status(&self, tx_id: &TxId) -> Result<LedgerStatus> {
        self.ledger.status(tx_id).await
    }

    /// Poll every `poll_interval` until the ledger reaches a terminal status
    /// or `max_wait` elapses.
    ///
    /// Retryable polling errors are logged and polling continues; anything
    /// else, a ledger rejection and the timeout all produce `Failed`.
    pub async fn await_confirmation(&self, tx_id: &TxId) -> PublishOutcome {
        let deadline = Instant::now() + self.config.max_wait();
        loop {
            match self.poll_status(tx_id).await {
                Ok(LedgerStatus::Confirmed {
                    block_number,
                    block_timestamp,
                }) => {
                    return PublishOutcome::Confirmed {
                        block_number,
                        block_timestamp,
                    }
                }
                Ok(LedgerStatus::Failed { reason }) => return PublishOutcome::Failed { reason },
                Ok(LedgerStatus::Pending) => log::debug!("{tx_id}: still pending"),
                Err(e) if e.is_retryable() => log::warn!("{tx_id}: status poll failed: {e}"),
                Err(e) => {
                    return PublishOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }

            if Instant::now() + self.config.poll_interval() > deadline {
                return PublishOutcome::Failed {
                    reason: format!(
                        "not confirmed within {} ms",
                        self.config.max_wait_ms
                    ),
                };
            }
            sleep(self.config.poll_interval()).await;
        }
    }
}
