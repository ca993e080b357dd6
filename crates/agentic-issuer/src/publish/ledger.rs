//! Anchoring ledger interface and the in-process development ledger.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crypto::hash::Hash256;
use crate::error::{IssuerError, Result};
use crate::identity::Identifier;

/// Ledger transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub String);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What gets anchored: the new state hash and the one it replaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRequest {
    pub identifier: Identifier,
    pub state_hash: Hash256,
    pub previous_state: Hash256,
}

/// Status of a submitted transaction as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LedgerStatus {
    Pending,
    Confirmed {
        block_number: u64,
        /// Unix seconds.
        block_timestamp: u64,
    },
    /// Terminal rejection.
    Failed { reason: String },
}

/// Client of the external anchoring ledger.
///
/// Submission failures that may succeed on retry must be reported as
/// [`IssuerError::Ledger`]; the publisher retries those with backoff.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Hand a state hash to the ledger, returning its transaction id.
    async fn submit(&self, request: &AnchorRequest) -> Result<TxId>;

    /// Current status of a previously submitted transaction.
    async fn status(&self, tx_id: &TxId) -> Result<LedgerStatus>;
}

// ── LocalLedger ──────────────────────────────────────────────────────────────

struct TxRecord {
    request: AnchorRequest,
    polls: u32,
    status: LedgerStatus,
}

#[derive(Default)]
struct LedgerState {
    next_block: u64,
    sequence: u64,
    txs: HashMap<TxId, TxRecord>,
    by_hash: HashMap<Hash256, TxId>,
    transient_failures: u32,
    reject_reason: Option<String>,
    stalled: bool,
}

/// In-process ledger for development and tests.
///
/// A transaction confirms after a configurable number of status polls.
/// Submitting an already-confirmed state hash returns the original
/// transaction, so resubmission is idempotent.
pub struct LocalLedger {
    confirm_after_polls: u32,
    state: Mutex<LedgerState>,
}

impl LocalLedger {
    /// A ledger that confirms on the first poll.
    pub fn new() -> Self {
        Self::with_confirmations(1)
    }

    /// A ledger that confirms after `polls` status calls.
    pub fn with_confirmations(polls: u32) -> Self {
        Self {
            confirm_after_polls: polls.max(1),
            state: Mutex::new(LedgerState {
                next_block: 1,
                ..LedgerState::default()
            }),
        }
    }

    /// Make the next `count` submissions fail with a retryable error.
    pub fn fail_next_submissions(&self, count: u32) {
        self.lock().transient_failures = count;
    }

    /// Reject every pending and future transaction, or stop rejecting.
    pub fn reject_all(&self, reason: Option<&str>) {
        self.lock().reject_reason = reason.map(str::to_string);
    }

    /// Keep every transaction pending until unstalled.
    pub fn set_stalled(&self, stalled: bool) {
        self.lock().stalled = stalled;
    }

    /// Number of accepted submissions.
    pub fn submission_count(&self) -> usize {
        self.lock().txs.len()
    }

    /// The request behind a transaction.
    pub fn transaction(&self, tx_id: &TxId) -> Option<AnchorRequest> {
        self.lock().txs.get(tx_id).map(|r| r.request.clone())
    }

    /// Hashes confirmed so far, in no particular order.
    pub fn confirmed_hashes(&self) -> Vec<Hash256> {
        self.lock()
            .txs
            .values()
            .filter(|r| matches!(r.status, LedgerStatus::Confirmed { .. }))
            .map(|r| r.request.state_hash)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LocalLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for LocalLedger {
    async fn submit(&self, request: &AnchorRequest) -> Result<TxId> {
        let mut state = self.lock();
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(IssuerError::Ledger("ledger temporarily unavailable".into()));
        }

        if let Some(existing) = state.by_hash.get(&request.state_hash) {
            let confirmed = state
                .txs
                .get(existing)
                .map(|r| matches!(r.status, LedgerStatus::Confirmed { .. }))
                .unwrap_or(false);
            if confirmed {
                return Ok(existing.clone());
            }
        }

        state.sequence += 1;
        let tx_id = TxId(format!(
            "0x{:08x}{}",
            state.sequence,
            &request.state_hash.to_hex()[..24]
        ));
        state.txs.insert(
            tx_id.clone(),
            TxRecord {
                request: request.clone(),
                polls: 0,
                status: LedgerStatus::Pending,
            },
        );
        state.by_hash.insert(request.state_hash, tx_id.clone());
        Ok(tx_id)
    }

    async fn status(&self, tx_id: &TxId) -> Result<LedgerStatus> {
        let mut guard = self.lock();
        let state = &mut *guard;
        // A transaction this ledger never saw will never confirm.
        let Some(record) = state.txs.get_mut(tx_id) else {
            return Ok(LedgerStatus::Failed {
                reason: format!("unknown transaction {tx_id}"),
            });
        };

        if record.status != LedgerStatus::Pending {
            return Ok(record.status.clone());
        }
        if let Some(reason) = &state.reject_reason {
            record.status = LedgerStatus::Failed {
                reason: reason.clone(),
            };
            return Ok(record.status.clone());
        }

        record.polls += 1;
        if !state.stalled && record.polls >= self.confirm_after_polls {
            record.status = LedgerStatus::Confirmed {
                block_number: state.next_block,
                block_timestamp: crate::time::now_micros() / 1_000_000,
            };
            state.next_block += 1;
        }
        Ok(record.status.clone())
    }
}
