//! Identity state records.

use serde::{Deserialize, Serialize};

use crate::crypto::hash::{hash_state, Hash256};
use crate::publish::TxId;

/// Publication status of an [`IdentityState`].
///
/// `Pending → Confirmed` and `Pending → Failed` are the only transitions;
/// both targets are terminal for the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Pending,
    Confirmed,
    Failed,
}

impl PublishStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an identity's state history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityState {
    /// `Hash(claims_tree_root, revocation_tree_root, root_of_roots)`.
    pub state_hash: Hash256,
    pub claims_tree_root: Hash256,
    pub revocation_tree_root: Hash256,
    pub root_of_roots: Hash256,
    /// Hash of the preceding entry; zero for genesis.
    pub previous_state: Hash256,
    pub status: PublishStatus,
    pub tx_id: Option<TxId>,
    /// Set only once `Confirmed`.
    pub block_number: Option<u64>,
    /// Unix seconds, set only once `Confirmed`.
    pub block_timestamp: Option<u64>,
    /// Why publication failed, set only once `Failed`.
    pub failure_reason: Option<String>,
    pub created_at: u64,
    pub modified_at: u64,
}

impl IdentityState {
    /// Build a new record over the given roots.
    pub fn new(
        claims_tree_root: Hash256,
        revocation_tree_root: Hash256,
        root_of_roots: Hash256,
        previous_state: Hash256,
        status: PublishStatus,
        now: u64,
    ) -> Self {
        Self {
            state_hash: hash_state(&claims_tree_root, &revocation_tree_root, &root_of_roots),
            claims_tree_root,
            revocation_tree_root,
            root_of_roots,
            previous_state,
            status,
            tx_id: None,
            block_number: None,
            block_timestamp: None,
            failure_reason: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Recompute the state hash from the recorded roots.
    pub fn recompute_hash(&self) -> Hash256 {
        hash_state(
            &self.claims_tree_root,
            &self.revocation_tree_root,
            &self.root_of_roots,
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_state.is_zero()
    }

    pub fn is_pending(&self) -> bool {
        self.status == PublishStatus::Pending
    }
}
