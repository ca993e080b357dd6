//! Error types for AgenticIssuer.
//!
//! Every core operation returns the closed [`IssuerError`] enumeration.
//! Callers at the boundary classify errors through [`IssuerError::kind`]
//! instead of matching on message text. Private key material is never
//! included in error messages.

use crate::merkle::MerkleError;

/// Coarse classification of an [`IssuerError`], used by boundary layers to
/// map errors onto transport-specific codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller supplied malformed or conflicting input. Never retried.
    Input,
    /// The referenced identity, claim or nonce does not exist.
    NotFound,
    /// Storage, accumulator or ledger failure. May be retried.
    Infrastructure,
    /// The identity's verifiable history would be corrupted. Mutation of
    /// that identity halts until an operator clears it.
    InvariantViolation,
}

/// Issuer error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    #[error("Failed to process schema: {0}")]
    ProcessSchema(String),

    #[error("Missing JSON-LD context: {0}")]
    JsonLdContext(String),

    #[error("Duplicate claim: index {0} is already present in the claims tree")]
    DuplicateClaim(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Identity {0} is immutable and cannot change state")]
    IdentityImmutable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Invalid passphrase")]
    InvalidPassphrase,

    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("The claim does not exist: no claim carries revocation nonce {nonce}")]
    ClaimDoesNotExist { nonce: u64 },

    #[error("Identity creation failed: {0}")]
    IdentityCreation(String),

    #[error("Accumulator error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State chain broken: {0}")]
    BrokenStateChain(String),

    #[error("Identity {identifier} is halted: {reason}")]
    IdentityHalted { identifier: String, reason: String },
}

impl IssuerError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProcessSchema(_)
            | Self::JsonLdContext(_)
            | Self::DuplicateClaim(_)
            | Self::InvalidIdentifier(_)
            | Self::InvalidInput(_)
            | Self::IdentityImmutable(_)
            | Self::InvalidConfig(_)
            | Self::InvalidKey(_)
            | Self::SignatureInvalid
            | Self::InvalidPassphrase => ErrorKind::Input,

            Self::IdentityNotFound(_) | Self::ClaimNotFound(_) | Self::ClaimDoesNotExist { .. } => {
                ErrorKind::NotFound
            }

            Self::Merkle(inner) => match inner {
                MerkleError::KeyAlreadySet { .. } => ErrorKind::InvariantViolation,
                MerkleError::KeyNotFound { .. } => ErrorKind::NotFound,
                MerkleError::KeyPresent { .. }
                | MerkleError::DepthExhausted { .. }
                | MerkleError::InvalidDepth(_)
                | MerkleError::InvalidProof(_) => ErrorKind::Input,
            },

            Self::IdentityCreation(_)
            | Self::Ledger(_)
            | Self::StorageError(_)
            | Self::SerializationError(_)
            | Self::DerivationFailed(_)
            | Self::EncryptionFailed(_)
            | Self::Io(_) => ErrorKind::Infrastructure,

            Self::BrokenStateChain(_) | Self::IdentityHalted { .. } => {
                ErrorKind::InvariantViolation
            }
        }
    }

    /// Whether a caller may retry the failed operation unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, IssuerError>;
