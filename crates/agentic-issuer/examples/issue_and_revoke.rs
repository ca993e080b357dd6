//! Issue and revoke — create an issuer identity, issue a claim, publish the
//! resulting states and prove revocation.
//!
//! Run with:
//!   cargo run --example issue_and_revoke -p agentic-issuer

use std::sync::Arc;

use agentic_issuer::claim::revocation::revocation_key;
use agentic_issuer::{
    ClaimRequest, IdentityMetadata, Issuer, IssuerConfig, LocalLedger, RevocationReason,
    StaticSchemaResolver,
};
use serde_json::json;

const SCHEMA: &str = "https://schemas.example/kyc.json";

#[tokio::main]
async fn main() -> agentic_issuer::Result<()> {
    // ── 1. Assemble an issuer ───────────────────────────────────────────────
    //
    // In-memory stores, a static schema and the in-process ledger.
    let schemas = StaticSchemaResolver::new().with_schema(
        SCHEMA,
        json!({"$metadata": {"uris": {"jsonLdContext": "https://schemas.example/kyc.jsonld"}}}),
    );
    let mut config = IssuerConfig::default();
    config.publisher.poll_interval_ms = 10;
    let issuer = Issuer::builder(config)
        .schemas(Arc::new(schemas))
        .ledger(Arc::new(LocalLedger::new()))
        .build()?;

    // ── 2. Create an identity and anchor its genesis state ──────────────────
    let info = issuer.create_identity(IdentityMetadata::default()).await?;
    let id = info.identifier;
    println!("Identity created");
    println!("  ID:      {id}");
    if let Some(genesis) = issuer.publish_pending_state(&id).await? {
        println!("  Genesis: {} ({})", genesis.state_hash, genesis.status);
    }
    println!();

    // ── 3. Issue a claim ────────────────────────────────────────────────────
    let claim = issuer
        .create_claim(
            &id,
            ClaimRequest::new(
                SCHEMA,
                "KYCAgeCredential",
                json!({"id": "did:example:alice", "birthday": 19960424}),
            ),
        )
        .await?;
    let s1 = issuer.publish_pending_state(&id).await?;
    println!("Claim {} issued with nonce {}", claim.id, claim.revocation_nonce);
    if let Some(s1) = &s1 {
        println!("  Inclusion against S1: {:?}", claim.verify_inclusion(&s1.claims_tree_root).is_ok());
    }
    println!();

    // ── 4. Revoke it ────────────────────────────────────────────────────────
    //
    // A non-inclusion proof taken before revocation only verifies against
    // the revocation root it was taken from.
    let before = issuer
        .get_revocation_status(&id, claim.revocation_nonce)
        .await?;
    issuer
        .revoke_claim(&id, claim.revocation_nonce, RevocationReason::Superseded)
        .await?;
    let s2 = issuer.publish_pending_state(&id).await?;

    let key = revocation_key(claim.revocation_nonce);
    println!("Revoked nonce {}", claim.revocation_nonce);
    println!(
        "  Non-inclusion against S1: {}",
        before
            .proof
            .verify_non_inclusion(&before.revocation_tree_root, &key)
            .is_ok()
    );
    if let Some(s2) = &s2 {
        println!(
            "  Non-inclusion against S2: {}",
            before
                .proof
                .verify_non_inclusion(&s2.revocation_tree_root, &key)
                .is_ok()
        );
    }

    let states = issuer.get_states(&id).await?;
    println!();
    println!("State history ({} states):", states.len());
    for state in &states {
        println!("  {} <- {} ({})", state.state_hash, state.previous_state, state.status);
    }
    Ok(())
}
