//! AgenticIssuer — identity state and verifiable-claim engine.
//!
//! Each issuer identity owns three sparse Merkle accumulators (claims,
//! revocation and roots-of-roots) whose roots are combined into a state
//! hash, chained to the previous state and anchored on an external ledger.
//! Claims are schema-derived entries of the claims tree; revocation inserts
//! a claim's nonce into the revocation tree.

pub mod claim;
pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod issuer;
pub mod merkle;
pub mod publish;
pub mod state;
pub mod storage;
pub mod time;

pub use claim::{
    Claim, ClaimId, ClaimRequest, DirectorySchemaResolver, MerklizedRootPosition,
    RevocationReason, RevocationStatus, SchemaResolver, StaticSchemaResolver, SubjectPosition,
};
pub use config::{IssuerConfig, PublisherConfig};
pub use crypto::{Hash256, IssuerKeyPair};
pub use error::{ErrorKind, IssuerError, Result};
pub use identity::{Identifier, Identity, IdentityInfo, IdentityMetadata, IdentityMode};
pub use issuer::{Issuer, IssuerBuilder};
pub use merkle::{MerkleError, MerkleProof, SparseMerkleTree};
pub use publish::{LedgerClient, LedgerStatus, LocalLedger, PublishOutcome, TxId};
pub use state::{verify_state_chain, IdentityState, PublishStatus};
pub use storage::{FileKeyStore, FileStore, IssuerStore, KeyStore, MemoryKeyStore, MemoryStore};
