//! Storage layer for identity aggregates and issuer keys.
//!
//! An identity aggregate (trees, state history, claims, revocations) is
//! always written as one record, so a tree mutation and the state
//! transition it caused are durable together or not at all.
//!
//! # Directory layout
//!
//! The file-backed stores use:
//!
//! ```text
//! {root}/
//! ├── identities/
//! │   └── did_aiss_{id}.json
//! └── keys/
//!     └── did_aiss_{id}.key
//! ```
//!
//! # Modules
//!
//! - [`memory`] — in-process stores for tests and embedding.
//! - [`file_store`] — one JSON file per identity, written atomically.
//! - [`key_file`] — passphrase-sealed key files.

pub mod file_store;
pub mod key_file;
pub mod memory;

use std::path::Path;

use crate::claim::{Claim, ClaimId};
use crate::crypto::keys::IssuerKeyPair;
use crate::error::Result;
use crate::identity::{Identifier, Identity};

pub use file_store::FileStore;
pub use key_file::FileKeyStore;
pub use memory::{MemoryKeyStore, MemoryStore};

/// Durable storage of identity aggregates.
pub trait IssuerStore: Send + Sync {
    /// Persist the whole aggregate, replacing any previous version.
    fn save_identity(&self, identity: &Identity) -> Result<()>;

    /// Point lookup by identifier.
    fn load_identity(&self, identifier: &Identifier) -> Result<Option<Identity>>;

    fn list_identities(&self) -> Result<Vec<Identifier>>;

    /// Point lookup by (identifier, claim id).
    fn load_claim(&self, identifier: &Identifier, claim_id: &ClaimId) -> Result<Option<Claim>> {
        Ok(self
            .load_identity(identifier)?
            .and_then(|identity| identity.claim(claim_id).cloned()))
    }
}

/// Storage of issuer signing keys, one per identity.
pub trait KeyStore: Send + Sync {
    fn store_key(&self, identifier: &Identifier, key_pair: &IssuerKeyPair) -> Result<()>;

    /// Fails with `IdentityNotFound` when no key is stored.
    fn load_key(&self, identifier: &Identifier) -> Result<IssuerKeyPair>;
}

/// Write `data` to `path` atomically using a sibling temporary file.
///
/// Creates the parent directory if it does not exist. A crash during the
/// write cannot leave a partially-written file visible to readers.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);
    std::fs::write(&tmp_path, data)?;

    std::fs::rename(&tmp_path, path)?;

    Ok(())
}
