//! Cryptographic primitives for AgenticIssuer.
//!
//! This module provides:
//! - 256-bit hash values with domain-separated BLAKE3 hashing
//! - Ed25519 issuer key pairs and claim signatures
//! - Passphrase sealing of key material (Argon2id, HKDF-SHA256, ChaCha20-Poly1305)
//! - Cryptographically secure random values

pub mod hash;
pub mod keys;
pub mod random;
pub mod sealing;
pub mod signing;

pub use hash::Hash256;
pub use keys::IssuerKeyPair;
