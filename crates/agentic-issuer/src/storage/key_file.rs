//! Sealed key files — issuer signing keys encrypted under a passphrase.
//!
//! File format (JSON):
//! ```json
//! {
//!     "version": 1,
//!     "format": "aiss-key-v1",
//!     "identifier": "did:aiss:...",
//!     "public_key": "<base64>",
//!     "sealed": { "salt": "...", "nonce": "...", "ciphertext": "..." }
//! }
//! ```
//!
//! The public key is stored in plaintext so a file can be matched to its
//! identity without the passphrase.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::keys::IssuerKeyPair;
use crate::crypto::sealing::{seal, unseal, SealedSecret};
use crate::error::{IssuerError, Result};
use crate::identity::Identifier;

use super::{write_atomic, KeyStore};

const KEY_FILE_VERSION: u32 = 1;
const KEY_FILE_FORMAT: &str = "aiss-key-v1";

#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    version: u32,
    format: String,
    identifier: Identifier,
    public_key: String,
    sealed: SealedSecret,
}

/// Filesystem key store sealing every key under one passphrase.
pub struct FileKeyStore {
    base_dir: PathBuf,
    passphrase: String,
}

impl FileKeyStore {
    pub fn new(base_dir: impl Into<PathBuf>, passphrase: &str) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            passphrase: passphrase.to_string(),
        })
    }

    fn key_path(&self, identifier: &Identifier) -> PathBuf {
        self.base_dir.join(format!("{}.key", identifier.file_stem()))
    }
}

impl Drop for FileKeyStore {
    fn drop(&mut self) {
        self.passphrase.zeroize();
    }
}

impl KeyStore for FileKeyStore {
    fn store_key(&self, identifier: &Identifier, key_pair: &IssuerKeyPair) -> Result<()> {
        let mut secret = key_pair.secret_bytes();
        let sealed = seal(&self.passphrase, &secret);
        secret.zeroize();

        let file = KeyFile {
            version: KEY_FILE_VERSION,
            format: KEY_FILE_FORMAT.to_string(),
            identifier: identifier.clone(),
            public_key: key_pair.public_key_base64(),
            sealed: sealed?,
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| IssuerError::SerializationError(e.to_string()))?;
        write_atomic(&self.key_path(identifier), &json)
    }

    fn load_key(&self, identifier: &Identifier) -> Result<IssuerKeyPair> {
        let path = self.key_path(identifier);
        if !path.exists() {
            return Err(IssuerError::IdentityNotFound(format!(
                "no key file for {identifier}"
            )));
        }

        let bytes = std::fs::read(&path)?;
        let file: KeyFile = serde_json::from_slice(&bytes).map_err(|e| {
            IssuerError::StorageError(format!("failed to parse key file {}: {e}", path.display()))
        })?;
        if file.version != KEY_FILE_VERSION || file.format != KEY_FILE_FORMAT {
            return Err(IssuerError::StorageError(format!(
                "unsupported key file version={} format={}",
                file.version, file.format
            )));
        }

        let mut plaintext = unseal(&self.passphrase, &file.sealed)?;
        let secret: Result<[u8; 32]> = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| IssuerError::InvalidKey("sealed key must be 32 bytes".into()));
        plaintext.zeroize();
        let mut secret = secret?;
        let key_pair = IssuerKeyPair::from_secret_bytes(&secret);
        secret.zeroize();

        if key_pair.public_key_base64() != file.public_key {
            return Err(IssuerError::InvalidKey(format!(
                "key file {} does not match its public key",
                path.display()
            )));
        }
        Ok(key_pair)
    }
}
