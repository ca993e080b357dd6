//! In-memory stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::crypto::keys::IssuerKeyPair;
use crate::error::{IssuerError, Result};
use crate::identity::{Identifier, Identity};

use super::{IssuerStore, KeyStore};

/// Identity store held in process memory.
#[derive(Default)]
pub struct MemoryStore {
    identities: RwLock<HashMap<Identifier, Identity>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl IssuerStore for MemoryStore {
    fn save_identity(&self, identity: &Identity) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(IssuerError::StorageError(format!(
                "write of {} rejected",
                identity.identifier
            )));
        }
        self.identities
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(identity.identifier.clone(), identity.clone());
        Ok(())
    }

    fn load_identity(&self, identifier: &Identifier) -> Result<Option<Identity>> {
        Ok(self
            .identities
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identifier)
            .cloned())
    }

    fn list_identities(&self) -> Result<Vec<Identifier>> {
        let mut ids: Vec<Identifier> = self
            .identities
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// Key store held in process memory.
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<Identifier, IssuerKeyPair>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn store_key(&self, identifier: &Identifier, key_pair: &IssuerKeyPair) -> Result<()> {
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(identifier.clone(), key_pair.clone());
        Ok(())
    }

    fn load_key(&self, identifier: &Identifier) -> Result<IssuerKeyPair> {
        self.keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identifier)
            .cloned()
            .ok_or_else(|| IssuerError::IdentityNotFound(format!("no key stored for {identifier}")))
    }
}
