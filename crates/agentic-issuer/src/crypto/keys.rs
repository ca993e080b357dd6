//! Issuer key material.
//!
//! Each identity owns one Ed25519 key pair. The public key is committed
//! into the genesis claims tree as the identity's auth claim; the signing
//! key signs every claim the identity issues.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{IssuerError, Result};

/// An Ed25519 key pair owned by an issuer identity.
///
/// The secret bytes are zeroized on drop.
pub struct IssuerKeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl IssuerKeyPair {
    /// Generate a fresh key pair from the operating system RNG.
    ///
    /// Fails with `IssuerError::IdentityCreation` when the RNG is unavailable.
    pub fn generate() -> Result<Self> {
        let mut secret = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut secret)
            .map_err(|e| IssuerError::IdentityCreation(format!("key generation failed: {e}")))?;
        let pair = Self::from_secret_bytes(&secret);
        secret.zeroize();
        Ok(pair)
    }

    /// Reconstruct a key pair from raw secret bytes.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Parse a verifying key from its base64 encoding.
    pub fn verifying_key_from_base64(encoded: &str) -> Result<VerifyingKey> {
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
            .map_err(|e| IssuerError::InvalidKey(format!("invalid base64 public key: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| IssuerError::InvalidKey("public key must be 32 bytes".into()))?;
        VerifyingKey::from_bytes(&arr)
            .map_err(|e| IssuerError::InvalidKey(format!("invalid verifying key: {e}")))
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Return the secret key bytes. Caller must zeroize after use.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// The public key as base64, the form stored in identity records.
    pub fn public_key_base64(&self) -> String {
        base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            self.verifying_key.to_bytes(),
        )
    }
}

impl Clone for IssuerKeyPair {
    fn clone(&self) -> Self {
        let mut secret = self.secret_bytes();
        let pair = Self::from_secret_bytes(&secret);
        secret.zeroize();
        pair
    }
}

impl std::fmt::Debug for IssuerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerKeyPair")
            .field("public_key", &self.public_key_base64())
            .finish_non_exhaustive()
    }
}

impl Drop for IssuerKeyPair {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}
