//! Claims — schema-derived entries of the claims tree, and their
//! revocation.
//!
//! The claim module provides:
//! - Claim records with signature and inclusion proofs
//! - Schema resolution and context validation
//! - Deterministic index and value derivation
//! - Nonce revocation and revocation-status proofs

pub mod engine;
pub mod revocation;
pub mod schema;
pub mod types;

pub use engine::{issue_claim, IssuedClaim};
pub use revocation::{
    revocation_status, revoke_nonce, Revocation, RevocationReason, RevocationStatus,
};
pub use schema::{
    DirectorySchemaResolver, SchemaResolver, StaticSchemaResolver, ValidatedSchema,
};
pub use types::{
    Claim, ClaimId, ClaimProof, ClaimRequest, CredentialStatus, MerklizedRootPosition,
    SubjectPosition,
};
