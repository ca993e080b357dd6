//! Identity identifiers.

use serde::{Deserialize, Serialize};

use crate::crypto::hash::Hash256;
use crate::error::{IssuerError, Result};

const DID_PREFIX: &str = "did:aiss:";

/// Unique identifier of an issuer identity.
///
/// Format: `did:aiss:` + base58 of the 32-byte genesis state hash. The
/// identifier is fixed at creation and never changes, even though the
/// identity's state does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier(pub String);

impl Identifier {
    /// Derive the identifier from a genesis state hash.
    pub fn from_genesis(genesis_state: &Hash256) -> Self {
        let encoded = bs58::encode(genesis_state.as_bytes()).into_string();
        Self(format!("{DID_PREFIX}{encoded}"))
    }

    /// Parse and validate an identifier string.
    pub fn parse(s: &str) -> Result<Self> {
        let id = Self(s.trim().to_string());
        id.genesis_state()?;
        Ok(id)
    }

    /// Recover the genesis state hash the identifier was derived from.
    pub fn genesis_state(&self) -> Result<Hash256> {
        let encoded = self.0.strip_prefix(DID_PREFIX).ok_or_else(|| {
            IssuerError::InvalidIdentifier(format!("{} does not start with {DID_PREFIX}", self.0))
        })?;
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| IssuerError::InvalidIdentifier(format!("{}: {e}", self.0)))?;
        Hash256::from_slice(&bytes)
            .map_err(|_| IssuerError::InvalidIdentifier(format!("{}: wrong length", self.0)))
    }

    /// A filesystem-safe rendering, used for per-identity file names.
    pub fn file_stem(&self) -> String {
        self.0.replace(':', "_")
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Identifier {
    type Err = IssuerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
