//! Stress test: long state histories.
//!
//! Builds a chain of several hundred published states and checks it
//! verifies end to end, that every claims root is recorded in the roots
//! tree, and that tampering anywhere in the chain is detected.

use std::sync::Arc;

use serde_json::json;

use agentic_issuer::{
    verify_state_chain, ClaimRequest, Hash256, IdentityMetadata, IdentityMode, Issuer,
    IssuerConfig, IssuerError, LocalLedger, PublishStatus, PublisherConfig, RevocationReason,
    StaticSchemaResolver,
};

const SCHEMA: &str = "https://schemas.example/ticket.json";

fn issuer() -> Issuer {
    let config = IssuerConfig {
        publisher: PublisherConfig {
            poll_interval_ms: 1,
            max_wait_ms: 500,
            submit_attempts: 3,
            retry_backoff_ms: 1,
        },
        ..IssuerConfig::default()
    };
    let schemas = StaticSchemaResolver::new().with_schema(
        SCHEMA,
        json!({"$metadata": {"uris": {"jsonLdContext": "https://schemas.example/ticket.jsonld"}}}),
    );
    Issuer::builder(config)
        .schemas(Arc::new(schemas))
        .ledger(Arc::new(LocalLedger::new()))
        .build()
        .unwrap()
}

fn ticket(n: u64) -> ClaimRequest {
    ClaimRequest::new(SCHEMA, "Ticket", json!({"id": format!("did:example:t-{n}"), "seat": n}))
}

#[tokio::test]
async fn stress_300_published_transitions() {
    let issuer = issuer();
    let id = issuer
        .create_identity(IdentityMetadata::default())
        .await
        .unwrap()
        .identifier;
    issuer.publish_pending_state(&id).await.unwrap();

    let mut nonces = Vec::new();
    for n in 0..200 {
        let claim = issuer.create_claim(&id, ticket(n)).await.unwrap();
        nonces.push(claim.revocation_nonce);
        issuer.publish_pending_state(&id).await.unwrap();
    }
    for nonce in nonces.iter().step_by(2) {
        issuer
            .revoke_claim(&id, *nonce, RevocationReason::Superseded)
            .await
            .unwrap();
        issuer.publish_pending_state(&id).await.unwrap();
    }

    let identity = issuer.export_identity(&id).await.unwrap();
    assert_eq!(identity.states.len(), 301);
    assert!(verify_state_chain(&identity.states).is_ok());
    assert!(identity
        .states
        .iter()
        .all(|s| s.status == PublishStatus::Confirmed));
    for state in &identity.states {
        assert_eq!(
            identity.roots_tree.get(&state.claims_tree_root),
            Some(state.claims_tree_root),
            "claims root {} missing from roots tree",
            state.claims_tree_root
        );
    }
    // Revocations reuse the latest claims root.
    assert_eq!(identity.roots_tree.len(), 201);
    assert_eq!(identity.revocation_tree.len(), 100);
    assert!(identity.verify().is_ok());
}

#[tokio::test]
async fn stress_tampered_chain_is_detected() {
    let issuer = issuer();
    let id = issuer
        .create_identity(IdentityMetadata {
            mode: IdentityMode::Relay,
            ..IdentityMetadata::default()
        })
        .await
        .unwrap()
        .identifier;
    for n in 0..50 {
        issuer.create_claim(&id, ticket(n)).await.unwrap();
    }
    let states = issuer.get_states(&id).await.unwrap();
    assert_eq!(states.len(), 51);
    assert!(verify_state_chain(&states).is_ok());

    for i in [0usize, 1, 25, 50] {
        let mut relinked = states.clone();
        relinked[i].previous_state = Hash256::from_u64(0xdead);
        assert!(matches!(
            verify_state_chain(&relinked),
            Err(IssuerError::BrokenStateChain(_))
        ));

        let mut reroot = states.clone();
        reroot[i].claims_tree_root = Hash256::from_u64(0xbeef);
        assert!(matches!(
            verify_state_chain(&reroot),
            Err(IssuerError::BrokenStateChain(_))
        ));
    }

    let mut reordered = states.clone();
    reordered.swap(10, 11);
    assert!(verify_state_chain(&reordered).is_err());

    let mut stale_pending = states;
    stale_pending[20].status = PublishStatus::Pending;
    assert!(verify_state_chain(&stale_pending).is_err());
}
