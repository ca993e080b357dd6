//! The identity aggregate.
//!
//! An [`Identity`] exclusively owns its three accumulators, its state
//! history and the claims it has issued. The whole aggregate is the unit of
//! persistence: a tree mutation and the state transition it causes are
//! always saved together.

use serde::{Deserialize, Serialize};

use crate::claim::revocation::revocation_key;
use crate::claim::{Claim, ClaimId, Revocation};
use crate::crypto::hash::{hash_data, Hash256};
use crate::crypto::keys::IssuerKeyPair;
use crate::error::{IssuerError, Result};
use crate::merkle::SparseMerkleTree;
use crate::state::{verify_state_chain, IdentityState, PublishStatus};

use super::identifier::Identifier;

/// How an identity anchors its state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMode {
    /// Every state transition is published to the anchoring ledger.
    #[default]
    Standard,
    /// Genesis only; claims are signature-only and state never changes.
    Immutable,
    /// A third party anchors on our behalf; states confirm immediately.
    Relay,
}

impl IdentityMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Standard => "standard",
            Self::Immutable => "immutable",
            Self::Relay => "relay",
        }
    }
}

impl std::str::FromStr for IdentityMode {
    type Err = IssuerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "immutable" => Ok(Self::Immutable),
            "relay" => Ok(Self::Relay),
            other => Err(IssuerError::InvalidInput(format!(
                "unknown identity mode: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied parameters for a new identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMetadata {
    /// Endpoint used for off-chain claim retrieval.
    pub endpoint: String,
    #[serde(default)]
    pub mode: IdentityMode,
}

/// An issuer identity together with everything it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub identifier: Identifier,
    pub immutable: bool,
    pub relay: bool,
    /// Base64 Ed25519 verifying key committed by the auth claim.
    pub public_key: String,
    pub endpoint: String,
    pub claims_tree: SparseMerkleTree,
    pub revocation_tree: SparseMerkleTree,
    pub roots_tree: SparseMerkleTree,
    /// Oldest first.
    pub states: Vec<IdentityState>,
    pub claims: Vec<Claim>,
    pub revocations: Vec<Revocation>,
    /// Mutations applied while a state was pending, not yet folded into a
    /// state of their own.
    pub unpublished_changes: bool,
    /// Set when an invariant violation stopped this identity.
    pub halted: Option<String>,
    pub created_at: u64,
}

impl Identity {
    /// Build a new identity and its genesis state.
    ///
    /// The claims tree starts with an auth claim committing to the key pair
    /// and endpoint, so two identities never share a genesis state.
    pub fn genesis(
        metadata: &IdentityMetadata,
        key_pair: &IssuerKeyPair,
        depth: usize,
        now: u64,
    ) -> Result<Self> {
        let public_key = key_pair.public_key_base64();

        let mut claims_tree = SparseMerkleTree::new(depth)?;
        let revocation_tree = SparseMerkleTree::new(depth)?;
        let mut roots_tree = SparseMerkleTree::new(depth)?;

        claims_tree.insert(
            auth_claim_index(&public_key),
            auth_claim_value(&public_key, &metadata.endpoint),
        )?;
        let claims_root = claims_tree.root();
        roots_tree.insert(claims_root, claims_root)?;

        let status = match metadata.mode {
            IdentityMode::Standard => PublishStatus::Pending,
            IdentityMode::Immutable | IdentityMode::Relay => PublishStatus::Confirmed,
        };
        let genesis = IdentityState::new(
            claims_root,
            revocation_tree.root(),
            roots_tree.root(),
            Hash256::zero(),
            status,
            now,
        );

        Ok(Self {
            identifier: Identifier::from_genesis(&genesis.state_hash),
            immutable: metadata.mode == IdentityMode::Immutable,
            relay: metadata.mode == IdentityMode::Relay,
            public_key,
            endpoint: metadata.endpoint.clone(),
            claims_tree,
            revocation_tree,
            roots_tree,
            states: vec![genesis],
            claims: Vec::new(),
            revocations: Vec::new(),
            unpublished_changes: false,
            halted: None,
            created_at: now,
        })
    }

    pub fn mode(&self) -> IdentityMode {
        if self.immutable {
            IdentityMode::Immutable
        } else if self.relay {
            IdentityMode::Relay
        } else {
            IdentityMode::Standard
        }
    }

    /// Fail if an invariant violation has halted this identity.
    pub fn ensure_not_halted(&self) -> Result<()> {
        match &self.halted {
            Some(reason) => Err(IssuerError::IdentityHalted {
                identifier: self.identifier.0.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// The most recent state. Every identity has at least its genesis.
    pub fn latest_state(&self) -> Option<&IdentityState> {
        self.states.last()
    }

    /// The pending state, if one is in flight.
    pub fn pending_state(&self) -> Option<&IdentityState> {
        self.states.last().filter(|s| s.is_pending())
    }

    /// The most recent confirmed state.
    pub fn latest_confirmed(&self) -> Option<&IdentityState> {
        self.states
            .iter()
            .rev()
            .find(|s| s.status == PublishStatus::Confirmed)
    }

    /// Find a state by hash, newest first.
    pub fn state_by_hash(&self, hash: &Hash256) -> Option<&IdentityState> {
        self.states.iter().rev().find(|s| &s.state_hash == hash)
    }

    pub fn claim(&self, id: &ClaimId) -> Option<&Claim> {
        self.claims.iter().find(|c| &c.id == id)
    }

    pub fn claim_by_nonce(&self, nonce: u64) -> Option<&Claim> {
        self.claims.iter().find(|c| c.revocation_nonce == nonce)
    }

    pub fn revocation(&self, nonce: u64) -> Option<&Revocation> {
        self.revocations.iter().find(|r| r.nonce == nonce)
    }

    /// Check the aggregate is internally consistent: the state history is an
    /// unbroken chain, every published claims root is in the roots tree, and
    /// every committed claim and revocation is present in its tree.
    pub fn verify(&self) -> Result<()> {
        verify_state_chain(&self.states)?;
        for state in &self.states {
            if !self.roots_tree.contains(&state.claims_tree_root) {
                return Err(IssuerError::BrokenStateChain(format!(
                    "claims root {} of state {} is missing from the roots tree",
                    state.claims_tree_root, state.state_hash
                )));
            }
        }
        if !self.immutable {
            for claim in &self.claims {
                if self.claims_tree.get(&claim.index) != Some(claim.value) {
                    return Err(IssuerError::BrokenStateChain(format!(
                        "claim {} is not committed in the claims tree",
                        claim.id
                    )));
                }
            }
        }
        for revocation in &self.revocations {
            if !self.revocation_tree.contains(&revocation_key(revocation.nonce)) {
                return Err(IssuerError::BrokenStateChain(format!(
                    "revoked nonce {} is missing from the revocation tree",
                    revocation.nonce
                )));
            }
        }
        Ok(())
    }

    /// Summary view.
    pub fn info(&self) -> IdentityInfo {
        let latest = self.latest_state();
        IdentityInfo {
            identifier: self.identifier.clone(),
            mode: self.mode(),
            public_key: self.public_key.clone(),
            endpoint: self.endpoint.clone(),
            state_hash: latest.map(|s| s.state_hash).unwrap_or_default(),
            status: latest.map(|s| s.status).unwrap_or(PublishStatus::Pending),
            claims_tree_root: self.claims_tree.root(),
            revocation_tree_root: self.revocation_tree.root(),
            root_of_roots: self.roots_tree.root(),
            state_count: self.states.len(),
            claim_count: self.claims.len(),
            revocation_count: self.revocations.len(),
            unpublished_changes: self.unpublished_changes,
            halted: self.halted.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public summary of an identity, without trees or claim bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityInfo {
    pub identifier: Identifier,
    pub mode: IdentityMode,
    pub public_key: String,
    pub endpoint: String,
    /// Hash and status of the newest state.
    pub state_hash: Hash256,
    pub status: PublishStatus,
    /// Current tree roots, which may be ahead of `state_hash`.
    pub claims_tree_root: Hash256,
    pub revocation_tree_root: Hash256,
    pub root_of_roots: Hash256,
    pub state_count: usize,
    pub claim_count: usize,
    pub revocation_count: usize,
    pub unpublished_changes: bool,
    pub halted: Option<String>,
    pub created_at: u64,
}

/// Claims-tree key of the genesis auth claim.
pub fn auth_claim_index(public_key: &str) -> Hash256 {
    hash_data(&[b"auth", public_key.as_bytes()])
}

/// Claims-tree value of the genesis auth claim.
pub fn auth_claim_value(public_key: &str, endpoint: &str) -> Hash256 {
    hash_data(&[public_key.as_bytes(), endpoint.as_bytes()])
}
