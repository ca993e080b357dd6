//! Sparse Merkle tree.
//!
//! A fixed-depth binary tree over 256-bit keys where all but a handful of
//! leaves are defined-empty. Empty subtrees hash to the zero placeholder and
//! a subtree holding exactly one leaf is collapsed to that leaf, so the
//! stored structure is proportional to the number of entries rather than
//! the key space.
//!
//! The collapsed shape of a given set of entries is unique, which makes the
//! root depend only on the set of (key, value) pairs present and never on
//! the order they were inserted in.
//!
//! # Example
//!
//! ```
//! use agentic_issuer::crypto::Hash256;
//! use agentic_issuer::merkle::SparseMerkleTree;
//!
//! let mut tree = SparseMerkleTree::new(256).unwrap();
//! let key = Hash256::from_u64(42);
//! let value = Hash256::from_u64(7);
//! let root = tree.insert(key, value).unwrap();
//!
//! let proof = tree.prove_inclusion(&key).unwrap();
//! assert!(proof.verify_inclusion(&root, &key, &value).is_ok());
//! ```

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::crypto::hash::{hash_leaf, hash_node, Hash256, HASH_BITS};

use super::error::{MerkleError, MerkleResult};
use super::proof::{MerkleProof, ProofLeaf};

/// Default accumulator depth: the full key length.
pub const DEFAULT_DEPTH: usize = HASH_BITS;

#[derive(Debug, Clone)]
enum Node {
    Empty,
    Leaf {
        key: Hash256,
        value: Hash256,
        hash: Hash256,
    },
    Branch {
        left: Box<Node>,
        right: Box<Node>,
        hash: Hash256,
    },
}

impl Node {
    fn leaf(key: Hash256, value: Hash256) -> Self {
        Node::Leaf {
            key,
            value,
            hash: hash_leaf(&key, &value),
        }
    }

    fn branch(left: Node, right: Node) -> Self {
        let hash = hash_node(&left.hash(), &right.hash());
        Node::Branch {
            left: Box::new(left),
            right: Box::new(right),
            hash,
        }
    }

    fn hash(&self) -> Hash256 {
        match self {
            Node::Empty => Hash256::zero(),
            Node::Leaf { hash, .. } | Node::Branch { hash, .. } => *hash,
        }
    }
}

/// A sparse Merkle tree mapping 256-bit keys to 256-bit values.
///
/// Append-only: a key, once set, keeps its value forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TreeSnapshot", into = "TreeSnapshot")]
pub struct SparseMerkleTree {
    depth: usize,
    entries: BTreeMap<Hash256, Hash256>,
    root: Node,
}

impl SparseMerkleTree {
    /// Create an empty tree of the given depth (1..=256).
    pub fn new(depth: usize) -> MerkleResult<Self> {
        if depth == 0 || depth > HASH_BITS {
            return Err(MerkleError::InvalidDepth(depth));
        }
        Ok(Self {
            depth,
            entries: BTreeMap::new(),
            root: Node::Empty,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn root(&self) -> Hash256 {
        self.root.hash()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Hash256) -> Option<Hash256> {
        self.entries.get(key).copied()
    }

    pub fn contains(&self, key: &Hash256) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Hash256, &Hash256)> {
        self.entries.iter()
    }

    /// Insert `value` at `key` and return the new root.
    ///
    /// Re-inserting an identical pair is a no-op. A different value for an
    /// existing key fails with `MerkleError::KeyAlreadySet` and leaves the
    /// tree untouched, as does `MerkleError::DepthExhausted`.
    pub fn insert(&mut self, key: Hash256, value: Hash256) -> MerkleResult<Hash256> {
        match self.entries.get(&key) {
            Some(existing) if *existing == value => return Ok(self.root()),
            Some(_) => return Err(MerkleError::KeyAlreadySet { key }),
            None => {}
        }

        if let Some(shared) = self.longest_shared_prefix(&key) {
            if shared >= self.depth {
                return Err(MerkleError::DepthExhausted {
                    key,
                    depth: self.depth,
                });
            }
        }

        let root = std::mem::replace(&mut self.root, Node::Empty);
        self.root = insert_at(root, key, value, 0);
        self.entries.insert(key, value);
        Ok(self.root())
    }

    /// Longest prefix `key` shares with any present key. Byte order equals
    /// path order, so the answer is always one of the two sorted neighbours.
    fn longest_shared_prefix(&self, key: &Hash256) -> Option<usize> {
        let before = self.entries.range(..*key).next_back();
        let after = self
            .entries
            .range((Bound::Excluded(*key), Bound::Unbounded))
            .next();
        before
            .into_iter()
            .chain(after)
            .map(|(k, _)| k.common_prefix_bits(key))
            .max()
    }

    /// Build the Merkle path for `key`, whether present or not.
    pub fn prove(&self, key: &Hash256) -> MerkleProof {
        let mut siblings = Vec::new();
        let mut node = &self.root;
        let mut depth = 0;
        loop {
            match node {
                Node::Empty => {
                    return MerkleProof {
                        siblings,
                        leaf: None,
                    }
                }
                Node::Leaf { key: k, value, .. } => {
                    return MerkleProof {
                        siblings,
                        leaf: Some(ProofLeaf {
                            key: *k,
                            value: *value,
                        }),
                    }
                }
                Node::Branch { left, right, .. } => {
                    if key.bit(depth) {
                        siblings.push(left.hash());
                        node = right;
                    } else {
                        siblings.push(right.hash());
                        node = left;
                    }
                    depth += 1;
                }
            }
        }
    }

    /// Prove that `key` is present.
    pub fn prove_inclusion(&self, key: &Hash256) -> MerkleResult<MerkleProof> {
        if !self.contains(key) {
            return Err(MerkleError::KeyNotFound { key: *key });
        }
        Ok(self.prove(key))
    }

    /// Prove that `key` is absent.
    pub fn prove_non_inclusion(&self, key: &Hash256) -> MerkleResult<MerkleProof> {
        if self.contains(key) {
            return Err(MerkleError::KeyPresent { key: *key });
        }
        Ok(self.prove(key))
    }
}

fn insert_at(node: Node, key: Hash256, value: Hash256, depth: usize) -> Node {
    match node {
        Node::Empty => Node::leaf(key, value),
        Node::Leaf {
            key: other_key,
            value: other_value,
            hash,
        } => {
            let existing = Node::Leaf {
                key: other_key,
                value: other_value,
                hash,
            };
            match (key.bit(depth), other_key.bit(depth)) {
                (false, true) => Node::branch(Node::leaf(key, value), existing),
                (true, false) => Node::branch(existing, Node::leaf(key, value)),
                // Same side: push both one level down.
                (true, true) => Node::branch(Node::Empty, insert_at(existing, key, value, depth + 1)),
                (false, false) => Node::branch(insert_at(existing, key, value, depth + 1), Node::Empty),
            }
        }
        Node::Branch { left, right, .. } => {
            if key.bit(depth) {
                Node::branch(*left, insert_at(*right, key, value, depth + 1))
            } else {
                Node::branch(insert_at(*left, key, value, depth + 1), *right)
            }
        }
    }
}

/// Serialized form: depth plus entries. The node structure is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct TreeSnapshot {
    depth: usize,
    entries: Vec<(Hash256, Hash256)>,
}

impl From<SparseMerkleTree> for TreeSnapshot {
    fn from(tree: SparseMerkleTree) -> Self {
        Self {
            depth: tree.depth,
            entries: tree.entries.into_iter().collect(),
        }
    }
}

impl TryFrom<TreeSnapshot> for SparseMerkleTree {
    type Error = MerkleError;

    fn try_from(snapshot: TreeSnapshot) -> MerkleResult<Self> {
        let mut tree = SparseMerkleTree::new(snapshot.depth)?;
        for (key, value) in snapshot.entries {
            tree.insert(key, value)?;
        }
        Ok(tree)
    }
}
