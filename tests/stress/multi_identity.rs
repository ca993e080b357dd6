//! Stress test: create 50 identities, verify all have unique identifiers,
//! and that their trees and state chains stay independent.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use agentic_issuer::{
    verify_state_chain, ClaimRequest, IdentityMetadata, Issuer, IssuerConfig, LocalLedger,
    PublishStatus, PublisherConfig, RevocationReason, StaticSchemaResolver,
};

const SCHEMA: &str = "https://schemas.example/email.json";

fn issuer(ledger: Arc<LocalLedger>) -> Issuer {
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
        json!({"$metadata": {"uris": {"jsonLdContext": "https://schemas.example/email.jsonld"}}}),
    );
    Issuer::builder(config)
        .schemas(Arc::new(schemas))
        .ledger(ledger)
        .build()
        .unwrap()
}

fn email(holder: &str) -> ClaimRequest {
    ClaimRequest::new(
        SCHEMA,
        "EmailCredential",
        json!({"id": holder, "email": "shared@example.com"}),
    )
}

#[tokio::test]
async fn stress_50_unique_identities() {
    let issuer = issuer(Arc::new(LocalLedger::new()));
    let mut ids = HashSet::new();
    let mut public_keys = HashSet::new();

    for _ in 0..50 {
        let info = issuer
            .create_identity(IdentityMetadata::default())
            .await
            .unwrap();
        assert!(
            ids.insert(info.identifier.clone()),
            "Duplicate identifier found: {}",
            info.identifier
        );
        assert!(public_keys.insert(info.public_key.clone()));
        assert_eq!(info.identifier.genesis_state().unwrap(), info.state_hash);
    }

    assert_eq!(ids.len(), 50);
    assert_eq!(issuer.list_identities().await.unwrap().len(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_same_claim_across_identities() {
    let ledger = Arc::new(LocalLedger::new());
    let issuer = issuer(ledger.clone());

    let mut handles = Vec::new();
    for _ in 0..20 {
        let issuer = issuer.clone();
        handles.push(tokio::spawn(async move {
            let id = issuer
                .create_identity(IdentityMetadata::default())
                .await
                .unwrap()
                .identifier;
            // The same holder and subject under every issuer.
            let claim = issuer
                .create_claim(&id, email("did:example:shared-holder"))
                .await
                .unwrap();
            while issuer.publish_pending_state(&id).await.unwrap().is_some() {}
            (id, claim)
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    // Same schema and subject give the same index under every issuer.
    let first_index = results[0].1.index;
    assert!(results.iter().all(|(_, c)| c.index == first_index));

    // Revoking under one issuer leaves every other issuer untouched.
    let (revoker, revoked) = &results[0];
    issuer
        .revoke_claim(revoker, revoked.revocation_nonce, RevocationReason::Compromised)
        .await
        .unwrap();

    for (id, claim) in &results[1..] {
        let status = issuer
            .get_revocation_status(id, claim.revocation_nonce)
            .await
            .unwrap();
        assert!(!status.revoked);
        assert!(status.verify().is_ok());

        let states = issuer.get_states(id).await.unwrap();
        assert!(verify_state_chain(&states).is_ok());
        assert!(states.iter().all(|s| s.status == PublishStatus::Confirmed));
        assert!(claim.verify_inclusion(&states.last().unwrap().claims_tree_root).is_ok());
    }
    assert!(
        issuer
            .get_revocation_status(revoker, revoked.revocation_nonce)
            .await
            .unwrap()
            .revoked
    );

    // Genesis and one claim state per identity.
    assert_eq!(ledger.submission_count(), 40);
}
