//! 256-bit hash values and domain-separated BLAKE3 hashing.
//!
//! Every commitment in the issuer (tree leaves, tree nodes, claim indexes,
//! state hashes) is a [`Hash256`]. Each use has its own BLAKE3 derive-key
//! context so that a value hashed for one purpose can never be replayed as
//! another.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{IssuerError, Result};

/// Length of a hash in bytes.
pub const HASH_LENGTH: usize = 32;

/// Number of bits in a hash (the maximum accumulator depth).
pub const HASH_BITS: usize = HASH_LENGTH * 8;

const CONTEXT_DATA: &str = "agentic-issuer 2024 data";
const CONTEXT_LEAF: &str = "agentic-issuer 2024 smt leaf";
const CONTEXT_NODE: &str = "agentic-issuer 2024 smt node";
const CONTEXT_STATE: &str = "agentic-issuer 2024 identity state";

/// A 256-bit hash. Serialized as lowercase hex.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256([u8; HASH_LENGTH]);

impl Hash256 {
    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The all-zero hash. Used as the empty-subtree placeholder and the
    /// genesis `previous_state` sentinel.
    pub const fn zero() -> Self {
        Self([0u8; HASH_LENGTH])
    }

    /// Build from a slice that must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; HASH_LENGTH] = bytes.try_into().map_err(|_| {
            IssuerError::InvalidInput(format!(
                "hash must be {HASH_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| IssuerError::InvalidInput(format!("invalid hex hash: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Encode a 64-bit integer as an accumulator key (big-endian, right-aligned).
    pub fn from_u64(n: u64) -> Self {
        let mut bytes = [0u8; HASH_LENGTH];
        bytes[HASH_LENGTH - 8..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LENGTH]
    }

    /// Bit `i`, most significant bit of byte 0 first.
    ///
    /// With this ordering, sorting hashes by bytes also sorts them by path.
    pub fn bit(&self, i: usize) -> bool {
        debug_assert!(i < HASH_BITS);
        (self.0[i / 8] >> (7 - (i % 8))) & 1 == 1
    }

    /// Number of leading bits shared with `other`.
    pub fn common_prefix_bits(&self, other: &Hash256) -> usize {
        for (i, (a, b)) in self.0.iter().zip(other.0.iter()).enumerate() {
            let diff = a ^ b;
            if diff != 0 {
                return i * 8 + diff.leading_zeros() as usize;
            }
        }
        HASH_BITS
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash256({})", &self.to_hex()[..16])
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash256::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

fn derive(context: &str, parts: &[&[u8]]) -> Hash256 {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        // Length-prefix each part so concatenations cannot collide.
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    Hash256(*hasher.finalize().as_bytes())
}

/// Hash arbitrary data fields into a single commitment.
pub fn hash_data(parts: &[&[u8]]) -> Hash256 {
    derive(CONTEXT_DATA, parts)
}

/// Hash an accumulator leaf.
pub fn hash_leaf(key: &Hash256, value: &Hash256) -> Hash256 {
    derive(CONTEXT_LEAF, &[key.as_bytes(), value.as_bytes()])
}

/// Hash an accumulator internal node.
pub fn hash_node(left: &Hash256, right: &Hash256) -> Hash256 {
    derive(CONTEXT_NODE, &[left.as_bytes(), right.as_bytes()])
}

/// Combine the three tree roots into an identity state hash.
pub fn hash_state(claims_root: &Hash256, revocation_root: &Hash256, roots_root: &Hash256) -> Hash256 {
    derive(
        CONTEXT_STATE,
        &[
            claims_root.as_bytes(),
            revocation_root.as_bytes(),
            roots_root.as_bytes(),
        ],
    )
}
