//! Passphrase sealing for key material at rest.
//!
//! passphrase → Argon2id(passphrase, salt) → master key
//! HKDF-SHA256(master key, context) → sealing key
//! ChaCha20-Poly1305(sealing key, nonce) → ciphertext

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::crypto::random::random_bytes;
use crate::error::{IssuerError, Result};

const ARGON2_M_COST: u32 = 65536; // 64 MiB
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;

/// HKDF info string. Must remain stable across versions.
const SEALING_CONTEXT: &str = "agentic-issuer/key-sealing";

/// A secret sealed under a passphrase. All fields are base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedSecret {
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
}

fn sealing_key(passphrase: &[u8], salt: &[u8; 16]) -> Result<[u8; 32]> {
    let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(32))
        .map_err(|e| IssuerError::DerivationFailed(format!("Argon2 params: {e}")))?;
    let mut master = [0u8; 32];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(passphrase, salt, &mut master)
        .map_err(|e| IssuerError::DerivationFailed(format!("Argon2 hash: {e}")))?;

    let hk = Hkdf::<Sha256>::new(None, &master);
    master.zeroize();
    let mut key = [0u8; 32];
    hk.expand(SEALING_CONTEXT.as_bytes(), &mut key)
        .map_err(|e| IssuerError::DerivationFailed(format!("HKDF expand: {e}")))?;
    Ok(key)
}

fn b64(bytes: &[u8]) -> String {
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

fn unb64(field: &str, s: &str) -> Result<Vec<u8>> {
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, s)
        .map_err(|e| IssuerError::SerializationError(format!("invalid {field} base64: {e}")))
}

/// Seal `plaintext` under `passphrase`.
pub fn seal(passphrase: &str, plaintext: &[u8]) -> Result<SealedSecret> {
    let salt: [u8; 16] = random_bytes();
    let nonce: [u8; 12] = random_bytes();
    let mut key = sealing_key(passphrase.as_bytes(), &salt)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| IssuerError::EncryptionFailed(format!("cipher init: {e}")));
    key.zeroize();
    let ciphertext = cipher?
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| IssuerError::EncryptionFailed(format!("encrypt: {e}")))?;

    Ok(SealedSecret {
        salt: b64(&salt),
        nonce: b64(&nonce),
        ciphertext: b64(&ciphertext),
    })
}

/// Open a sealed secret. A wrong passphrase fails AEAD authentication and
/// returns `IssuerError::InvalidPassphrase`.
pub fn unseal(passphrase: &str, sealed: &SealedSecret) -> Result<Vec<u8>> {
    let salt: [u8; 16] = unb64("salt", &sealed.salt)?
        .try_into()
        .map_err(|_| IssuerError::SerializationError("salt must be 16 bytes".into()))?;
    let nonce = unb64("nonce", &sealed.nonce)?;
    if nonce.len() != 12 {
        return Err(IssuerError::SerializationError(
            "nonce must be 12 bytes".into(),
        ));
    }
    let ciphertext = unb64("ciphertext", &sealed.ciphertext)?;

    let mut key = sealing_key(passphrase.as_bytes(), &salt)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| IssuerError::EncryptionFailed(format!("cipher init: {e}")));
    key.zeroize();
    cipher?
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| IssuerError::InvalidPassphrase)
}
