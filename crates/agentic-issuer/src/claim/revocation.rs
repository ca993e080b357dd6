//! Revocation — marking claim nonces revoked in the revocation tree.
//!
//! Revocation never touches the claim record. The nonce is inserted into
//! the revocation tree; verifiers check a non-inclusion proof of the nonce
//! against the issuer's published revocation root.

use serde::{Deserialize, Serialize};

use crate::crypto::hash::{hash_data, Hash256};
use crate::crypto::keys::IssuerKeyPair;
use crate::crypto::signing;
use crate::error::{IssuerError, Result};
use crate::identity::{Identifier, Identity};
use crate::merkle::MerkleProof;
use crate::state::{request_transition, IdentityState, TransitionOutcome};

use super::types::ClaimId;

/// Reason for revocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RevocationReason {
    /// Holder's key or wallet has been compromised.
    Compromised,
    /// Replaced by a newer claim.
    Superseded,
    /// Holder violated the terms the claim was issued under.
    PolicyViolation,
    /// Manual revocation by the issuer.
    ManualRevocation,
    /// Holder asked for revocation.
    HolderRequest,
    /// Custom reason.
    Custom(String),
}

impl RevocationReason {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Compromised => "compromised",
            Self::Superseded => "superseded",
            Self::PolicyViolation => "policy_violation",
            Self::ManualRevocation => "manual_revocation",
            Self::HolderRequest => "holder_request",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Parse a stable string; anything unrecognized becomes `Custom`.
    pub fn parse(s: &str) -> Self {
        match s {
            "compromised" => Self::Compromised,
            "superseded" => Self::Superseded,
            "policy_violation" => Self::PolicyViolation,
            "" | "manual_revocation" => Self::ManualRevocation,
            "holder_request" => Self::HolderRequest,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// A revocation record, kept alongside the identity for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    pub nonce: u64,
    pub claim_id: ClaimId,
    pub reason: RevocationReason,
    /// Microseconds since epoch.
    pub revoked_at: u64,
    /// Issuer signature over (identifier, nonce, revoked_at, reason).
    pub signature: String,
}

impl Revocation {
    fn payload(identifier: &Identifier, nonce: u64, revoked_at: u64, reason: &RevocationReason) -> String {
        format!("revoke:{}:{nonce}:{revoked_at}:{}", identifier.0, reason.as_str())
    }

    /// Verify the issuer signature against the identity's public key.
    pub fn verify_signature(&self, identifier: &Identifier, public_key: &str) -> Result<()> {
        let key = IssuerKeyPair::verifying_key_from_base64(public_key)?;
        let payload = Self::payload(identifier, self.nonce, self.revoked_at, &self.reason);
        signing::verify_from_base64(&key, payload.as_bytes(), &self.signature)
    }
}

/// Revocation-tree key of a nonce. Hashed so keys spread over the full
/// bit range at any tree depth.
pub fn revocation_key(nonce: u64) -> Hash256 {
    hash_data(&[b"revocation-nonce", &nonce.to_be_bytes()])
}

/// Revocation-tree value stored for a revoked nonce.
pub fn revocation_marker(nonce: u64) -> Hash256 {
    hash_data(&[b"revoked", &nonce.to_be_bytes()])
}

/// Revoke the claim carrying `nonce`.
///
/// Returns `None` when the nonce was already revoked: nothing changes.
pub fn revoke_nonce(
    identity: &mut Identity,
    key_pair: &IssuerKeyPair,
    nonce: u64,
    reason: RevocationReason,
    now: u64,
) -> Result<Option<TransitionOutcome>> {
    identity.ensure_not_halted()?;
    if identity.immutable {
        return Err(IssuerError::IdentityImmutable(identity.identifier.0.clone()));
    }
    let claim_id = identity
        .claim_by_nonce(nonce)
        .map(|c| c.id.clone())
        .ok_or(IssuerError::ClaimDoesNotExist { nonce })?;

    let key = revocation_key(nonce);
    if identity.revocation_tree.contains(&key) {
        return Ok(None);
    }
    if key_pair.public_key_base64() != identity.public_key {
        return Err(IssuerError::InvalidKey(format!(
            "key does not belong to {}",
            identity.identifier
        )));
    }

    identity.revocation_tree.insert(key, revocation_marker(nonce))?;
    let signature = signing::sign_to_base64(
        key_pair.signing_key(),
        Revocation::payload(&identity.identifier, nonce, now, &reason).as_bytes(),
    );
    identity.revocations.push(Revocation {
        nonce,
        claim_id,
        reason,
        revoked_at: now,
        signature,
    });
    request_transition(identity, now).map(Some)
}

/// Revocation status of a nonce with a proof against the current
/// revocation-tree root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationStatus {
    pub identifier: Identifier,
    pub nonce: u64,
    pub revoked: bool,
    pub revocation: Option<Revocation>,
    /// Root the proof is against. May be ahead of the latest state when
    /// changes are waiting to be published.
    pub revocation_tree_root: Hash256,
    pub latest_state: Option<IdentityState>,
    pub proof: MerkleProof,
}

impl RevocationStatus {
    /// Check the proof against `revocation_tree_root`.
    pub fn verify(&self) -> Result<()> {
        let key = revocation_key(self.nonce);
        if self.revoked {
            self.proof
                .verify_inclusion(&self.revocation_tree_root, &key, &revocation_marker(self.nonce))?;
        } else {
            self.proof
                .verify_non_inclusion(&self.revocation_tree_root, &key)?;
        }
        Ok(())
    }
}

/// Build the revocation status of any nonce. Unknown nonces simply prove
/// non-revoked.
pub fn revocation_status(identity: &Identity, nonce: u64) -> RevocationStatus {
    let key = revocation_key(nonce);
    RevocationStatus {
        identifier: identity.identifier.clone(),
        nonce,
        revoked: identity.revocation_tree.contains(&key),
        revocation: identity.revocation(nonce).cloned(),
        revocation_tree_root: identity.revocation_tree.root(),
        latest_state: identity.latest_state().cloned(),
        proof: identity.revocation_tree.prove(&key),
    }
}
