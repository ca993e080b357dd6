//! Error types for accumulator operations.

use thiserror::Error;

use crate::crypto::hash::Hash256;

/// Result type for accumulator operations.
pub type MerkleResult<T> = std::result::Result<T, MerkleError>;

/// Errors raised by the sparse Merkle accumulator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// The key already holds a different value. Accumulators are append-only.
    #[error("Key {key} is already set to a different value")]
    KeyAlreadySet { key: Hash256 },

    /// An inclusion proof was requested for an absent key.
    #[error("Key {key} not found")]
    KeyNotFound { key: Hash256 },

    /// A non-inclusion proof was requested for a present key.
    #[error("Key {key} is present, cannot prove non-inclusion")]
    KeyPresent { key: Hash256 },

    /// Two keys share a prefix as long as the tree depth.
    #[error("Tree depth {depth} exhausted while placing key {key}")]
    DepthExhausted { key: Hash256, depth: usize },

    #[error("Invalid tree depth: {0}")]
    InvalidDepth(usize),

    #[error("Invalid proof: {0}")]
    InvalidProof(String),
}
