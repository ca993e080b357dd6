//! Claim issuance.
//!
//! A claim occupies one slot of the claims tree. Its index is derived from
//! the schema, the subject and the position parameters, so two claims with
//! identical (schema, subject, positions) land on the same index and the
//! second is rejected as a duplicate. The value commits to everything else:
//! revocation nonce, expiration, version and whichever subject parts the
//! positions place in the value.

use serde_json::Value;

use crate::crypto::hash::{hash_data, Hash256};
use crate::crypto::keys::IssuerKeyPair;
use crate::crypto::random::random_nonce;
use crate::error::{IssuerError, Result};
use crate::identity::Identity;
use crate::state::{request_transition, TransitionOutcome};

use super::schema::ValidatedSchema;
use super::types::{
    Claim, ClaimId, ClaimProof, ClaimRequest, CredentialStatus, MerklizedRootPosition,
    SubjectPosition,
};

/// A freshly issued claim and the state transition it caused.
#[derive(Debug, Clone)]
pub struct IssuedClaim {
    pub claim: Claim,
    /// `None` for immutable issuers, which never transition.
    pub transition: Option<TransitionOutcome>,
}

/// Subject id and a digest of the remaining subject fields.
struct SubjectParts {
    id: Option<String>,
    data_root: Hash256,
}

fn split_subject(subject: &Value) -> Result<SubjectParts> {
    let object = subject.as_object().ok_or_else(|| {
        IssuerError::InvalidInput("credentialSubject must be a JSON object".into())
    })?;
    let id = match object.get("id") {
        None => None,
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(_) => {
            return Err(IssuerError::InvalidInput(
                "credentialSubject.id must be a non-empty string".into(),
            ))
        }
    };
    let mut data = object.clone();
    data.remove("id");
    // serde_json maps are key-ordered, so this encoding is canonical.
    let encoded = serde_json::to_vec(&data)
        .map_err(|e| IssuerError::SerializationError(e.to_string()))?;
    Ok(SubjectParts {
        id,
        data_root: hash_data(&[b"subject", &encoded]),
    })
}

/// Claims-tree key of a claim.
pub fn derive_index(schema_hash: &Hash256, request: &ClaimRequest) -> Result<Hash256> {
    let subject = split_subject(&request.credential_subject)?;
    if request.subject_position != SubjectPosition::None && subject.id.is_none() {
        return Err(IssuerError::InvalidInput(format!(
            "credentialSubject.id is required when subjectPosition is {}",
            request.subject_position.as_str()
        )));
    }

    let subject_id = match request.subject_position {
        SubjectPosition::Index => subject.id.as_deref().unwrap_or_default(),
        _ => "",
    };
    let data_root = match request.merklized_root_position {
        MerklizedRootPosition::Index | MerklizedRootPosition::None => subject.data_root,
        MerklizedRootPosition::Value => Hash256::zero(),
    };

    Ok(hash_data(&[
        b"claim-index",
        schema_hash.as_bytes(),
        request.subject_position.as_str().as_bytes(),
        subject_id.as_bytes(),
        request.merklized_root_position.as_str().as_bytes(),
        data_root.as_bytes(),
    ]))
}

/// Claims-tree value of a claim.
pub fn derive_value(request: &ClaimRequest, revocation_nonce: u64) -> Result<Hash256> {
    let subject = split_subject(&request.credential_subject)?;
    let subject_id = match request.subject_position {
        SubjectPosition::Value => subject.id.as_deref().unwrap_or_default(),
        _ => "",
    };
    let data_root = match request.merklized_root_position {
        MerklizedRootPosition::Value => subject.data_root,
        _ => Hash256::zero(),
    };

    Ok(hash_data(&[
        b"claim-value",
        &revocation_nonce.to_be_bytes(),
        &request.expiration.unwrap_or(0).to_be_bytes(),
        &request.version.to_be_bytes(),
        subject_id.as_bytes(),
        data_root.as_bytes(),
    ]))
}

/// Build a claim, insert it into the claims tree and request a transition.
///
/// Nothing is mutated unless every check passes. Immutable identities get
/// a signature-only claim: no tree insertion and no transition.
pub fn issue_claim(
    identity: &mut Identity,
    key_pair: &IssuerKeyPair,
    schema: &ValidatedSchema,
    request: &ClaimRequest,
    server_url: &str,
    now: u64,
) -> Result<IssuedClaim> {
    identity.ensure_not_halted()?;
    if key_pair.public_key_base64() != identity.public_key {
        return Err(IssuerError::InvalidKey(format!(
            "key does not belong to {}",
            identity.identifier
        )));
    }
    if request.credential_type.trim().is_empty() {
        return Err(IssuerError::InvalidInput("credential type is empty".into()));
    }
    schema.check_subject(&request.credential_subject)?;

    let schema_hash = schema.schema_hash(&request.credential_type);
    let index = derive_index(&schema_hash, request)?;
    let duplicate = if identity.immutable {
        identity.claims.iter().any(|c| c.index == index)
    } else {
        identity.claims_tree.contains(&index)
    };
    if duplicate {
        return Err(IssuerError::DuplicateClaim(index.to_hex()));
    }

    let revocation_nonce = fresh_nonce(identity);
    let value = derive_value(request, revocation_nonce)?;

    let (claims_tree_root, mtp, transition) = if identity.immutable {
        (None, None, None)
    } else {
        identity.claims_tree.insert(index, value)?;
        let root = identity.claims_tree.root();
        let mtp = identity.claims_tree.prove_inclusion(&index)?;
        let transition = request_transition(identity, now)?;
        (Some(root), Some(mtp), Some(transition))
    };

    let claim = Claim {
        id: ClaimId::generate(),
        identifier: identity.identifier.clone(),
        schema_url: request.schema_url.clone(),
        schema_context: schema.json_ld_context.clone(),
        credential_type: request.credential_type.clone(),
        schema_hash,
        index,
        value,
        credential_subject: request.credential_subject.clone(),
        expiration: request.expiration,
        version: request.version,
        subject_position: request.subject_position,
        merklized_root_position: request.merklized_root_position,
        revocation_nonce,
        issuance_date: now,
        credential_status: CredentialStatus::new(server_url, &identity.identifier, revocation_nonce),
        proof: ClaimProof {
            signature: Claim::sign(key_pair, &identity.identifier, &index, &value),
            issuer_public_key: identity.public_key.clone(),
            claims_tree_root,
            mtp,
            issuer_state: transition
                .as_ref()
                .and_then(|t| t.created())
                .map(|s| s.state_hash),
        },
    };
    identity.claims.push(claim.clone());

    Ok(IssuedClaim { claim, transition })
}

fn fresh_nonce(identity: &Identity) -> u64 {
    loop {
        let nonce = random_nonce();
        if identity.claim_by_nonce(nonce).is_none() {
            return nonce;
        }
    }
}
