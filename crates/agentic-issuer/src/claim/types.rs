//! Claim records and their proofs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::hash::Hash256;
use crate::crypto::keys::IssuerKeyPair;
use crate::crypto::random::random_bytes;
use crate::crypto::signing;
use crate::error::{IssuerError, Result};
use crate::identity::Identifier;
use crate::merkle::MerkleProof;
use crate::time::micros_to_rfc3339;

const CLAIM_ID_PREFIX: &str = "aclm_";

/// Credential-status type for revocation checked against the revocation tree.
pub const STATUS_TYPE_SMT: &str = "SparseMerkleTreeProof";

/// Unique identifier for a claim.
///
/// Format: `aclm_` + base58 of 16 random bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimId(pub String);

impl ClaimId {
    pub fn generate() -> Self {
        let bytes: [u8; 16] = random_bytes();
        Self(format!("{CLAIM_ID_PREFIX}{}", bs58::encode(bytes).into_string()))
    }

    /// Validate a caller-supplied claim id.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.strip_prefix(CLAIM_ID_PREFIX) {
            Some(rest) if !rest.is_empty() && bs58::decode(rest).into_vec().is_ok() => {
                Ok(Self(s.to_string()))
            }
            _ => Err(IssuerError::InvalidInput(format!("invalid claim id: {s:?}"))),
        }
    }
}

impl std::fmt::Display for ClaimId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the subject id is committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectPosition {
    /// Self-issued claim; no subject id is committed.
    None,
    #[default]
    Index,
    Value,
}

/// Where the digest of the subject's data is committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MerklizedRootPosition {
    /// The data digest is folded into the index.
    #[default]
    None,
    Index,
    Value,
}

macro_rules! position_str {
    ($ty:ident) => {
        impl $ty {
            pub fn as_str(&self) -> &str {
                match self {
                    Self::None => "none",
                    Self::Index => "index",
                    Self::Value => "value",
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = IssuerError;

            fn from_str(s: &str) -> Result<Self> {
                match s.to_ascii_lowercase().as_str() {
                    "" | "none" => Ok(Self::None),
                    "index" => Ok(Self::Index),
                    "value" => Ok(Self::Value),
                    other => Err(IssuerError::InvalidInput(format!(
                        "unknown {}: {other}",
                        stringify!($ty)
                    ))),
                }
            }
        }
    };
}

position_str!(SubjectPosition);
position_str!(MerklizedRootPosition);

/// Parameters of a claim to issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub schema_url: String,
    pub credential_type: String,
    pub credential_subject: Value,
    /// Unix seconds.
    #[serde(default)]
    pub expiration: Option<u64>,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub subject_position: SubjectPosition,
    #[serde(default)]
    pub merklized_root_position: MerklizedRootPosition,
}

impl ClaimRequest {
    pub fn new(schema_url: &str, credential_type: &str, credential_subject: Value) -> Self {
        Self {
            schema_url: schema_url.to_string(),
            credential_type: credential_type.to_string(),
            credential_subject,
            expiration: None,
            version: 0,
            subject_position: SubjectPosition::default(),
            merklized_root_position: MerklizedRootPosition::default(),
        }
    }

    pub fn expiration(mut self, unix_secs: u64) -> Self {
        self.expiration = Some(unix_secs);
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn subject_position(mut self, position: SubjectPosition) -> Self {
        self.subject_position = position;
        self
    }

    pub fn merklized_root_position(mut self, position: MerklizedRootPosition) -> Self {
        self.merklized_root_position = position;
        self
    }
}

/// Where and how a verifier checks revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStatus {
    pub id: String,
    #[serde(rename = "type")]
    pub status_type: String,
    pub revocation_nonce: u64,
}

impl CredentialStatus {
    pub fn new(server_url: &str, identifier: &Identifier, nonce: u64) -> Self {
        Self {
            id: credential_status_url(server_url, &identifier.0, nonce),
            status_type: STATUS_TYPE_SMT.to_string(),
            revocation_nonce: nonce,
        }
    }
}

/// `{server_url}/v1/{identifier}/claims/revocation/status/{nonce}`
pub fn credential_status_url(server_url: &str, identifier: &str, nonce: u64) -> String {
    format!(
        "{}/v1/{identifier}/claims/revocation/status/{nonce}",
        server_url.trim_end_matches('/')
    )
}

/// Proofs attached to a claim at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimProof {
    /// Issuer signature over the claim's index and value.
    pub signature: String,
    pub issuer_public_key: String,
    /// Claims-tree root right after insertion. Absent for immutable issuers.
    pub claims_tree_root: Option<Hash256>,
    /// Inclusion path of the claim's index under `claims_tree_root`.
    pub mtp: Option<MerkleProof>,
    /// State created by the issuance, when one was created immediately.
    pub issuer_state: Option<Hash256>,
}

/// An issued claim. Immutable once created; revocation is recorded in the
/// revocation tree, never by deleting or editing the claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    /// Issuing identity.
    pub identifier: Identifier,
    pub schema_url: String,
    pub schema_context: String,
    pub credential_type: String,
    pub schema_hash: Hash256,
    pub index: Hash256,
    pub value: Hash256,
    pub credential_subject: Value,
    pub expiration: Option<u64>,
    pub version: u32,
    pub subject_position: SubjectPosition,
    pub merklized_root_position: MerklizedRootPosition,
    pub revocation_nonce: u64,
    /// Microseconds since epoch.
    pub issuance_date: u64,
    pub credential_status: CredentialStatus,
    pub proof: ClaimProof,
}

impl Claim {
    /// Bytes covered by the issuer signature.
    pub fn signing_payload(identifier: &Identifier, index: &Hash256, value: &Hash256) -> Vec<u8> {
        format!("claim:{}:{}:{}", identifier.0, index.to_hex(), value.to_hex()).into_bytes()
    }

    pub(crate) fn sign(
        key_pair: &IssuerKeyPair,
        identifier: &Identifier,
        index: &Hash256,
        value: &Hash256,
    ) -> String {
        signing::sign_to_base64(
            key_pair.signing_key(),
            &Self::signing_payload(identifier, index, value),
        )
    }

    /// Verify the issuer signature.
    pub fn verify_signature(&self) -> Result<()> {
        let key = IssuerKeyPair::verifying_key_from_base64(&self.proof.issuer_public_key)?;
        signing::verify_from_base64(
            &key,
            &Self::signing_payload(&self.identifier, &self.index, &self.value),
            &self.proof.signature,
        )
    }

    /// Verify the attached inclusion proof against a claims-tree root.
    pub fn verify_inclusion(&self, claims_tree_root: &Hash256) -> Result<()> {
        let mtp = self.proof.mtp.as_ref().ok_or_else(|| {
            IssuerError::InvalidInput(format!("claim {} carries no inclusion proof", self.id))
        })?;
        mtp.verify_inclusion(claims_tree_root, &self.index, &self.value)?;
        Ok(())
    }

    pub fn is_expired(&self, now_unix_secs: u64) -> bool {
        self.expiration.map(|e| e <= now_unix_secs).unwrap_or(false)
    }

    /// Render as a W3C-style verifiable credential document.
    pub fn to_credential(&self) -> Value {
        serde_json::json!({
            "@context": [
                "https://www.w3.org/2018/credentials/v1",
                self.schema_context,
            ],
            "id": self.id.0,
            "type": ["VerifiableCredential", self.credential_type],
            "issuer": self.identifier.0,
            "issuanceDate": micros_to_rfc3339(self.issuance_date),
            "expirationDate": self.expiration.map(|e| micros_to_rfc3339(e.saturating_mul(1_000_000))),
            "credentialSchema": {
                "id": self.schema_url,
                "type": "JsonSchemaValidator2018",
            },
            "credentialSubject": self.credential_subject,
            "credentialStatus": self.credential_status,
            "proof": self.proof,
        })
    }
}
