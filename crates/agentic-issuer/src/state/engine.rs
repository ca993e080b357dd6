//! State transition engine.
//!
//! Turns the current roots of an identity's three trees into a new
//! [`IdentityState`], chained to the previous one, and drives the status of
//! that state as the publisher reports back.
//!
//! Only one state per identity may be `Pending`. A transition requested
//! while one is in flight is coalesced: the identity is marked as having
//! unpublished changes and the next state is produced once the pending one
//! settles, covering every mutation applied in the meantime.

use crate::crypto::hash::Hash256;
use crate::error::{IssuerError, Result};
use crate::identity::Identity;
use crate::publish::{PublishOutcome, TxId};

use super::types::{IdentityState, PublishStatus};

/// Result of asking for a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// A new state was appended to the history.
    Created(IdentityState),
    /// A state is already pending; the change rides on the next transition.
    Coalesced,
    /// The roots match the latest confirmed state; nothing to append.
    Unchanged,
}

impl TransitionOutcome {
    pub fn created(&self) -> Option<&IdentityState> {
        match self {
            Self::Created(state) => Some(state),
            _ => None,
        }
    }
}

/// Request a transition after a tree mutation.
pub fn request_transition(identity: &mut Identity, now: u64) -> Result<TransitionOutcome> {
    identity.ensure_not_halted()?;
    if identity.immutable {
        return Err(IssuerError::IdentityImmutable(identity.identifier.0.clone()));
    }
    if identity.pending_state().is_some() {
        identity.unpublished_changes = true;
        log::debug!(
            "{}: transition coalesced behind pending state",
            identity.identifier
        );
        return Ok(TransitionOutcome::Coalesced);
    }
    append_next_state(identity, now)
}

/// Return the state that should be handed to the ledger, creating one when
/// the latest state failed or coalesced changes are waiting.
///
/// Returns `None` when there is nothing to publish, which is always the case
/// for immutable and relay identities.
pub fn state_to_publish(identity: &mut Identity, now: u64) -> Result<Option<IdentityState>> {
    identity.ensure_not_halted()?;
    if identity.immutable || identity.relay {
        return Ok(None);
    }
    if let Some(pending) = identity.pending_state() {
        return Ok(Some(pending.clone()));
    }

    let latest_failed = identity
        .latest_state()
        .map(|s| s.status == PublishStatus::Failed)
        .unwrap_or(false);
    if !latest_failed && !identity.unpublished_changes {
        return Ok(None);
    }

    match append_next_state(identity, now)? {
        TransitionOutcome::Created(state) if state.is_pending() => Ok(Some(state)),
        _ => Ok(None),
    }
}

/// Attach the ledger transaction id to the pending state.
pub fn record_submission(
    identity: &mut Identity,
    state_hash: &Hash256,
    tx_id: TxId,
    now: u64,
) -> Result<()> {
    let state = pending_mut(identity, state_hash)?;
    state.tx_id = Some(tx_id);
    state.modified_at = now;
    Ok(())
}

/// Move the pending state to its terminal status.
///
/// A failed state keeps its tree mutations; they stay the identity's ground
/// truth and the next publication resubmits them. When coalesced changes
/// are waiting and the identity is not halted, the follow-up state is
/// appended right away and returned.
pub fn settle(
    identity: &mut Identity,
    state_hash: &Hash256,
    outcome: &PublishOutcome,
    now: u64,
) -> Result<Option<IdentityState>> {
    let identifier = identity.identifier.clone();
    let state = pending_mut(identity, state_hash)?;
    match outcome {
        PublishOutcome::Confirmed {
            block_number,
            block_timestamp,
        } => {
            state.status = PublishStatus::Confirmed;
            state.block_number = Some(*block_number);
            state.block_timestamp = Some(*block_timestamp);
            log::info!("{identifier}: state {state_hash} confirmed in block {block_number}");
        }
        PublishOutcome::Failed { reason } => {
            state.status = PublishStatus::Failed;
            state.failure_reason = Some(reason.clone());
            log::warn!("{identifier}: publication of state {state_hash} failed: {reason}");
        }
    }
    state.modified_at = now;

    if identity.unpublished_changes && identity.halted.is_none() {
        if let TransitionOutcome::Created(next) = append_next_state(identity, now)? {
            return Ok(Some(next));
        }
    }
    Ok(None)
}

fn pending_mut<'a>(identity: &'a mut Identity, state_hash: &Hash256) -> Result<&'a mut IdentityState> {
    let identifier = identity.identifier.0.clone();
    match identity.states.last_mut() {
        Some(state) if state.is_pending() && &state.state_hash == state_hash => Ok(state),
        _ => Err(IssuerError::InvalidInput(format!(
            "{identifier}: state {state_hash} is not the pending state"
        ))),
    }
}

/// Record the current claims root, compute the state over the three roots
/// and append it.
fn append_next_state(identity: &mut Identity, now: u64) -> Result<TransitionOutcome> {
    let (previous_hash, previous_status) = {
        let previous = identity.latest_state().ok_or_else(|| {
            IssuerError::BrokenStateChain(format!("{} has no genesis state", identity.identifier))
        })?;
        if previous.recompute_hash() != previous.state_hash {
            return Err(IssuerError::BrokenStateChain(format!(
                "latest state {} of {} does not match its roots",
                previous.state_hash, identity.identifier
            )));
        }
        (previous.state_hash, previous.status)
    };

    let claims_root = identity.claims_tree.root();
    identity.roots_tree.insert(claims_root, claims_root)?;

    let status = if identity.relay {
        PublishStatus::Confirmed
    } else {
        PublishStatus::Pending
    };
    let next = IdentityState::new(
        claims_root,
        identity.revocation_tree.root(),
        identity.roots_tree.root(),
        previous_hash,
        status,
        now,
    );

    identity.unpublished_changes = false;
    if next.state_hash == previous_hash && previous_status == PublishStatus::Confirmed {
        return Ok(TransitionOutcome::Unchanged);
    }

    log::debug!(
        "{}: new state {} (previous {})",
        identity.identifier,
        next.state_hash,
        previous_hash
    );
    identity.states.push(next.clone());
    Ok(TransitionOutcome::Created(next))
}
