//! Concurrency test: parallel claim issuance on shared identities.
//!
//! Validates that mutations of one identity are serialized: racing
//! identical claims produce exactly one success, concurrent distinct claims
//! all land in the claims tree, and no observation ever sees more than one
//! pending state.

use std::sync::Arc;

use serde_json::json;

use agentic_issuer::{
    verify_state_chain, ClaimRequest, IdentityMetadata, Issuer, IssuerConfig, IssuerError,
    LocalLedger, PublishStatus, PublisherConfig, StaticSchemaResolver,
};

const SCHEMA: &str = "https://schemas.example/badge.json";

fn issuer() -> Issuer {
    let config = IssuerConfig {
        server_url: "https://issuer.example".into(),
        tree_depth: 256,
        publisher: PublisherConfig {
            poll_interval_ms: 1,
            max_wait_ms: 500,
            submit_attempts: 3,
            retry_backoff_ms: 1,
        },
        auto_publish: false,
    };
    let schemas = StaticSchemaResolver::new().with_schema(
        SCHEMA,
        json!({"$metadata": {"uris": {"jsonLdContext": "https://schemas.example/badge.jsonld"}}}),
    );
    Issuer::builder(config)
        .schemas(Arc::new(schemas))
        .ledger(Arc::new(LocalLedger::new()))
        .build()
        .unwrap()
}

fn badge(holder: &str) -> ClaimRequest {
    ClaimRequest::new(SCHEMA, "Badge", json!({"id": holder, "level": 1}))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_identical_claims_race() {
    let issuer = issuer();

    for round in 0..20 {
        let id = issuer
            .create_identity(IdentityMetadata::default())
            .await
            .unwrap()
            .identifier;
        let holder = format!("did:example:holder-{round}");

        let a = tokio::spawn({
            let (issuer, id, req) = (issuer.clone(), id.clone(), badge(&holder));
            async move { issuer.create_claim(&id, req).await }
        });
        let b = tokio::spawn({
            let (issuer, id, req) = (issuer.clone(), id.clone(), badge(&holder));
            async move { issuer.create_claim(&id, req).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(IssuerError::DuplicateClaim(_))))
            .count();
        assert_eq!(successes, 1, "round {round}: exactly one claim should win");
        assert_eq!(duplicates, 1, "round {round}: the loser must see DuplicateClaim");

        let info = issuer.get_identity(&id).await.unwrap();
        assert_eq!(info.claim_count, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_100_concurrent_distinct_claims() {
    let issuer = issuer();
    let id = issuer
        .create_identity(IdentityMetadata::default())
        .await
        .unwrap()
        .identifier;

    let mut handles = Vec::new();
    for i in 0..100 {
        let (issuer, id) = (issuer.clone(), id.clone());
        handles.push(tokio::spawn(async move {
            issuer
                .create_claim(&id, badge(&format!("did:example:member-{i}")))
                .await
        }));
    }
    let mut claims = Vec::new();
    for handle in handles {
        claims.push(handle.await.unwrap().expect("distinct claims should all succeed"));
    }

    let mut nonces: Vec<u64> = claims.iter().map(|c| c.revocation_nonce).collect();
    nonces.sort_unstable();
    nonces.dedup();
    assert_eq!(nonces.len(), 100, "revocation nonces must be unique");

    let identity = issuer.export_identity(&id).await.unwrap();
    assert_eq!(identity.claims_tree.len(), 101);
    let root = identity.claims_tree.root();
    for claim in &claims {
        let proof = identity.claims_tree.prove_inclusion(&claim.index).unwrap();
        assert!(proof.verify_inclusion(&root, &claim.index, &claim.value).is_ok());
    }
    assert!(verify_state_chain(&identity.states).is_ok());
    assert!(identity.states.iter().filter(|s| s.is_pending()).count() <= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_publish_while_issuing() {
    let issuer = issuer();
    let id = issuer
        .create_identity(IdentityMetadata::default())
        .await
        .unwrap()
        .identifier;

    let writer = tokio::spawn({
        let (issuer, id) = (issuer.clone(), id.clone());
        async move {
            for i in 0..50 {
                issuer
                    .create_claim(&id, badge(&format!("did:example:w-{i}")))
                    .await
                    .unwrap();
            }
        }
    });
    let publisher = tokio::spawn({
        let (issuer, id) = (issuer.clone(), id.clone());
        async move {
            for _ in 0..50 {
                issuer.publish_pending_state(&id).await.unwrap();
            }
        }
    });
    let observer = tokio::spawn({
        let (issuer, id) = (issuer.clone(), id.clone());
        async move {
            for _ in 0..200 {
                let states = issuer.get_states(&id).await.unwrap();
                let pending = states.iter().filter(|s| s.is_pending()).count();
                assert!(pending <= 1, "observed {pending} pending states");
                tokio::task::yield_now().await;
            }
        }
    });

    writer.await.unwrap();
    publisher.await.unwrap();
    observer.await.unwrap();

    // Drain whatever is left.
    while issuer.publish_pending_state(&id).await.unwrap().is_some() {}

    let states = issuer.get_states(&id).await.unwrap();
    assert!(verify_state_chain(&states).is_ok());
    assert!(states.iter().all(|s| s.status == PublishStatus::Confirmed));
    let info = issuer.get_identity(&id).await.unwrap();
    assert!(!info.unpublished_changes);
    assert_eq!(info.claim_count, 50);
    assert_eq!(states.last().unwrap().claims_tree_root, info.claims_tree_root);
}
