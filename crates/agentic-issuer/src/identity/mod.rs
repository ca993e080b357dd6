//! Issuer identities — identifiers, modes and the identity aggregate.

pub mod identifier;
#[allow(clippy::module_inception)]
pub mod identity;

pub use identifier::Identifier;
pub use identity::{Identity, IdentityInfo, IdentityMetadata, IdentityMode};
