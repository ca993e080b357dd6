//! Sparse Merkle accumulator — the shared primitive behind the claims,
//! revocation and roots trees.
//!
//! - [`tree::SparseMerkleTree`] — append-only keyed accumulator.
//! - [`proof::MerkleProof`] — inclusion / non-inclusion paths with pure
//!   verification.

pub mod error;
pub mod proof;
pub mod tree;

pub use error::{MerkleError, MerkleResult};
pub use proof::{MerkleProof, ProofLeaf};
pub use tree::{SparseMerkleTree, DEFAULT_DEPTH};
