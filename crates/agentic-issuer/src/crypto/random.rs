//! Secure random values: claim identifiers, revocation nonces, salts.

use rand::RngCore;

/// Generate a fixed-size array of cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// Generate a random revocation nonce.
pub fn random_nonce() -> u64 {
    rand::thread_rng().next_u64()
}
