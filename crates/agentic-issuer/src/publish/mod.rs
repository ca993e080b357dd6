//! Publication — anchoring state hashes on an external ledger.
//!
//! - [`ledger::LedgerClient`] is the narrow interface to the ledger.
//! - [`ledger::LocalLedger`] is an in-process ledger for development.
//! - [`publisher::Publisher`] adds bounded retries and confirmation polling.

pub mod ledger;
pub mod publisher;

pub use ledger::{AnchorRequest, LedgerClient, LedgerStatus, LocalLedger, TxId};
pub use publisher::{PublishOutcome, Publisher};
