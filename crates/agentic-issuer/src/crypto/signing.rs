//! Ed25519 claim signatures, carried base64-encoded.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::{IssuerError, Result};

/// Sign a message and return the signature as base64.
pub fn sign_to_base64(signing_key: &SigningKey, message: &[u8]) -> String {
    let sig = signing_key.sign(message);
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, sig.to_bytes())
}

/// Verify a base64-encoded signature.
pub fn verify_from_base64(
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature_b64: &str,
) -> Result<()> {
    let sig_bytes =
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, signature_b64)
            .map_err(|e| IssuerError::InvalidKey(format!("invalid base64 signature: {e}")))?;

    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| IssuerError::InvalidKey("signature must be 64 bytes".into()))?;

    verifying_key
        .verify(message, &Signature::from_bytes(&sig_array))
        .map_err(|_| IssuerError::SignatureInvalid)
}
