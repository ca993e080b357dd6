//! State history verification.
//!
//! Walks an identity's state history (oldest first) and checks that it is
//! an unbroken hash chain.

use crate::crypto::hash::Hash256;
use crate::error::{IssuerError, Result};

use super::types::IdentityState;

/// Verify a full state history, ordered oldest to newest.
///
/// Checks that:
/// - the first entry links to the zero sentinel,
/// - every `previous_state` equals the preceding entry's `state_hash`,
/// - every `state_hash` recomputes from its three roots,
/// - at most one entry is `Pending`, and only the newest.
pub fn verify_state_chain(history: &[IdentityState]) -> Result<()> {
    let Some(first) = history.first() else {
        return Ok(());
    };
    if first.previous_state != Hash256::zero() {
        return Err(IssuerError::BrokenStateChain(
            "genesis state does not link to the zero sentinel".into(),
        ));
    }

    for (i, state) in history.iter().enumerate() {
        if state.recompute_hash() != state.state_hash {
            return Err(IssuerError::BrokenStateChain(format!(
                "state {i} hash {} does not match its roots",
                state.state_hash
            )));
        }
        if i > 0 && state.previous_state != history[i - 1].state_hash {
            return Err(IssuerError::BrokenStateChain(format!(
                "state {i} links to {} instead of {}",
                state.previous_state,
                history[i - 1].state_hash
            )));
        }
        if state.is_pending() && i + 1 != history.len() {
            return Err(IssuerError::BrokenStateChain(format!(
                "state {i} is pending but is not the newest state"
            )));
        }
    }

    Ok(())
}
