//! Identity state — the hash-chained history of tree roots and the
//! engine that extends it.

pub mod chain;
pub mod engine;
pub mod types;

pub use chain::verify_state_chain;
pub use engine::{record_submission, request_transition, settle, state_to_publish, TransitionOutcome};
pub use types::{IdentityState, PublishStatus};
