//! Identity persistence — one JSON file per identity aggregate.
//!
//! Each identity is stored as `{identifier_stem}.json` inside the
//! configured base directory.
//!
//! File format:
//! ```json
//! {
//!     "version": 1,
//!     "identity": { ... Identity ... }
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{IssuerError, Result};
use crate::identity::{Identifier, Identity};

use super::{write_atomic, IssuerStore};

// ── File format constants ─────────────────────────────────────────────────────

const IDENTITY_FILE_VERSION: u32 = 1;

// ── On-disk structure ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct IdentityFileRef<'a> {
    version: u32,
    identity: &'a Identity,
}

#[derive(Deserialize)]
struct IdentityFile {
    version: u32,
    identity: Identity,
}

// ── FileStore ─────────────────────────────────────────────────────────────────

/// Filesystem-backed identity store.
///
/// Writes go through a temp file and a rename. The store is safe for
/// single-process use; concurrent writers in different processes are not
/// coordinated.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `base_dir`, creating the directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn identity_path(&self, identifier: &Identifier) -> PathBuf {
        self.base_dir.join(format!("{}.json", identifier.file_stem()))
    }
}

impl IssuerStore for FileStore {
    fn save_identity(&self, identity: &Identity) -> Result<()> {
        let file = IdentityFileRef {
            version: IDENTITY_FILE_VERSION,
            identity,
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| IssuerError::SerializationError(e.to_string()))?;
        write_atomic(&self.identity_path(&identity.identifier), &json)
    }

    fn load_identity(&self, identifier: &Identifier) -> Result<Option<Identity>> {
        let path = self.identity_path(identifier);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(&path)?;
        let file: IdentityFile = serde_json::from_slice(&bytes).map_err(|e| {
            IssuerError::StorageError(format!(
                "failed to parse identity file {}: {e}",
                path.display()
            ))
        })?;
        if file.version != IDENTITY_FILE_VERSION {
            return Err(IssuerError::StorageError(format!(
                "unsupported identity file version {} in {}",
                file.version,
                path.display()
            )));
        }
        if &file.identity.identifier != identifier {
            return Err(IssuerError::StorageError(format!(
                "{} holds {} instead of {identifier}",
                path.display(),
                file.identity.identifier
            )));
        }
        Ok(Some(file.identity))
    }

    fn list_identities(&self) -> Result<Vec<Identifier>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(stem) = name_str.strip_suffix(".json") {
                if let Ok(id) = Identifier::parse(&stem.replace('_', ":")) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
