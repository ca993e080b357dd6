//! Accumulator proofs and their verification.
//!
//! Verification is a pure function of the proof, the claimed root and the
//! key (plus value, for inclusion). No tree access is needed.

use serde::{Deserialize, Serialize};

use crate::crypto::hash::{hash_leaf, hash_node, Hash256, HASH_BITS};

use super::error::{MerkleError, MerkleResult};

/// The leaf found at the end of a proof path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofLeaf {
    pub key: Hash256,
    pub value: Hash256,
}

impl ProofLeaf {
    pub fn hash(&self) -> Hash256 {
        hash_leaf(&self.key, &self.value)
    }
}

/// A Merkle path for a key.
///
/// `siblings` are ordered top-down: `siblings[i]` is the sibling at depth
/// `i`. The path ends either in an empty subtree (`leaf == None`) or at the
/// single leaf occupying the subtree the key falls into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub siblings: Vec<Hash256>,
    pub leaf: Option<ProofLeaf>,
}

impl MerkleProof {
    /// Whether the proof ends at the queried key itself.
    pub fn proves_existence_of(&self, key: &Hash256) -> bool {
        self.leaf.map(|l| &l.key == key).unwrap_or(false)
    }

    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    /// Verify that `key` maps to `value` under `root`.
    pub fn verify_inclusion(
        &self,
        root: &Hash256,
        key: &Hash256,
        value: &Hash256,
    ) -> MerkleResult<()> {
        let leaf = self.leaf.ok_or_else(|| {
            MerkleError::InvalidProof("inclusion proof must end at a leaf".into())
        })?;
        if &leaf.key != key {
            return Err(MerkleError::InvalidProof(format!(
                "leaf key mismatch: expected {key}, got {}",
                leaf.key
            )));
        }
        if &leaf.value != value {
            return Err(MerkleError::InvalidProof("leaf value mismatch".into()));
        }
        self.check_root(root, key, &leaf.hash())
    }

    /// Verify that `key` is absent under `root`.
    pub fn verify_non_inclusion(&self, root: &Hash256, key: &Hash256) -> MerkleResult<()> {
        match self.leaf {
            None => self.check_root(root, key, &Hash256::zero()),
            Some(leaf) => {
                if &leaf.key == key {
                    return Err(MerkleError::InvalidProof(
                        "key exists in tree, cannot prove non-inclusion".into(),
                    ));
                }
                // The other leaf must sit in the subtree `key` falls into.
                if key.common_prefix_bits(&leaf.key) < self.siblings.len() {
                    return Err(MerkleError::InvalidProof(
                        "proof path does not match key".into(),
                    ));
                }
                self.check_root(root, key, &leaf.hash())
            }
        }
    }

    fn check_root(&self, root: &Hash256, key: &Hash256, leaf_hash: &Hash256) -> MerkleResult<()> {
        if self.siblings.len() > HASH_BITS {
            return Err(MerkleError::InvalidProof(format!(
                "path of {} siblings exceeds key length",
                self.siblings.len()
            )));
        }
        let computed = self.compute_root(key, leaf_hash);
        if &computed == root {
            Ok(())
        } else {
            Err(MerkleError::InvalidProof(format!(
                "root mismatch: expected {root}, computed {computed}"
            )))
        }
    }

    fn compute_root(&self, key: &Hash256, leaf_hash: &Hash256) -> Hash256 {
        self.siblings
            .iter()
            .enumerate()
            .rev()
            .fold(*leaf_hash, |current, (depth, sibling)| {
                if key.bit(depth) {
                    hash_node(sibling, &current)
                } else {
                    hash_node(&current, sibling)
                }
            })
    }
}
