//! Integration test: full end-to-end workflow.
//!
//! Tests the complete lifecycle:
//! 1. Create an issuer identity and confirm its genesis state
//! 2. Issue a claim and publish the resulting state
//! 3. Revoke the claim and check revocation proofs against both states
//! 4. Verify the state chain and every claim against the final roots

use std::sync::Arc;

use serde_json::json;

use agentic_issuer::claim::revocation::revocation_key;
use agentic_issuer::{
    verify_state_chain, ClaimRequest, ErrorKind, IdentityMetadata, IdentityMode, Issuer,
    IssuerConfig, IssuerError, LocalLedger, PublishStatus, PublisherConfig, RevocationReason,
    StaticSchemaResolver,
};

const KYC_SCHEMA: &str = "https://schemas.example/kyc.json";
const KYC_CONTEXT: &str = "https://schemas.example/kyc.jsonld";

fn config(tree_depth: usize) -> IssuerConfig {
    IssuerConfig {
        server_url: "https://issuer.example".into(),
        tree_depth,
        publisher: PublisherConfig {
            poll_interval_ms: 2,
            max_wait_ms: 500,
            submit_attempts: 3,
            retry_backoff_ms: 1,
        },
        auto_publish: false,
    }
}

fn issuer(ledger: Arc<LocalLedger>) -> Issuer {
    issuer_with_depth(ledger, 256)
}

fn issuer_with_depth(ledger: Arc<LocalLedger>, tree_depth: usize) -> Issuer {
    let schemas = StaticSchemaResolver::new().with_schema(
        KYC_SCHEMA,
        json!({
            "$metadata": {"uris": {"jsonLdContext": KYC_CONTEXT}},
            "properties": {"credentialSubject": {"required": ["id", "birthday"]}}
        }),
    );
    Issuer::builder(config(tree_depth))
        .schemas(Arc::new(schemas))
        .ledger(ledger)
        .build()
        .expect("issuer should build")
}

fn kyc(subject: &str, birthday: u64) -> ClaimRequest {
    ClaimRequest::new(
        KYC_SCHEMA,
        "KYCAgeCredential",
        json!({"id": subject, "birthday": birthday}),
    )
}

#[tokio::test]
async fn full_workflow_claim_publish_revoke() {
    claim_publish_revoke(256).await;
}

#[tokio::test]
async fn full_workflow_with_shallow_trees() {
    claim_publish_revoke(64).await;
    claim_publish_revoke(32).await;
}

async fn claim_publish_revoke(tree_depth: usize) {
    let ledger = Arc::new(LocalLedger::new());
    let issuer = issuer_with_depth(ledger.clone(), tree_depth);

    // ── Step 1: Create identity and confirm genesis ─────────────────────
    let info = issuer
        .create_identity(IdentityMetadata::default())
        .await
        .expect("identity creation should succeed");
    let id = info.identifier.clone();
    assert!(id.0.starts_with("did:aiss:"));
    assert_eq!(info.status, PublishStatus::Pending);

    let genesis = issuer
        .publish_pending_state(&id)
        .await
        .unwrap()
        .expect("genesis should be pending");
    assert_eq!(genesis.status, PublishStatus::Confirmed);
    assert!(genesis.previous_state.is_zero());
    assert_eq!(id.genesis_state().unwrap(), genesis.state_hash);

    // ── Step 2: Issue C1 and publish S1 ─────────────────────────────────
    let c1 = issuer
        .create_claim(&id, kyc("did:example:alice", 19960424))
        .await
        .expect("claim should be issued");
    assert!(c1.verify_signature().is_ok());
    assert_eq!(c1.schema_context, KYC_CONTEXT);
    assert_eq!(
        c1.credential_status.id,
        format!(
            "https://issuer.example/v1/{id}/claims/revocation/status/{}",
            c1.revocation_nonce
        )
    );

    let states = issuer.get_states(&id).await.unwrap();
    assert_eq!(states.len(), 2);
    assert_eq!(states[1].status, PublishStatus::Pending);
    assert_eq!(c1.proof.issuer_state, Some(states[1].state_hash));

    let s1 = issuer
        .publish_pending_state(&id)
        .await
        .unwrap()
        .expect("S1 should be pending");
    assert_eq!(s1.status, PublishStatus::Confirmed);
    assert_eq!(s1.previous_state, genesis.state_hash);
    assert!(c1.verify_inclusion(&s1.claims_tree_root).is_ok());

    // ── Step 3: Revoke C1 ───────────────────────────────────────────────
    let before = issuer
        .get_revocation_status(&id, c1.revocation_nonce)
        .await
        .unwrap();
    assert!(!before.revoked);
    assert_eq!(before.revocation_tree_root, s1.revocation_tree_root);
    assert!(before.verify().is_ok());

    let after = issuer
        .revoke_claim(&id, c1.revocation_nonce, RevocationReason::Superseded)
        .await
        .expect("revocation should succeed");
    assert!(after.revoked);
    assert!(after.verify().is_ok());
    assert_eq!(
        after.revocation.as_ref().map(|r| r.reason.clone()),
        Some(RevocationReason::Superseded)
    );

    let s2 = issuer
        .publish_pending_state(&id)
        .await
        .unwrap()
        .expect("S2 should be pending");
    assert_eq!(s2.status, PublishStatus::Confirmed);
    assert_eq!(s2.previous_state, s1.state_hash);
    assert_eq!(s2.claims_tree_root, s1.claims_tree_root);
    assert_ne!(s2.revocation_tree_root, s1.revocation_tree_root);

    // The claim record survives revocation.
    let fetched = issuer.get_claim(&id, &c1.id).await.unwrap();
    assert_eq!(fetched, c1);

    // Non-inclusion of n1 proves against S1's revocation root only.
    let key = revocation_key(c1.revocation_nonce);
    assert!(before
        .proof
        .verify_non_inclusion(&s1.revocation_tree_root, &key)
        .is_ok());
    assert!(before
        .proof
        .verify_non_inclusion(&s2.revocation_tree_root, &key)
        .is_err());
    assert!(after
        .proof
        .verify_non_inclusion(&s2.revocation_tree_root, &key)
        .is_err());

    // ── Step 4: Verify the chain ────────────────────────────────────────
    let states = issuer.get_states(&id).await.unwrap();
    assert_eq!(states.len(), 3);
    assert!(verify_state_chain(&states).is_ok());
    for state in &states {
        assert_eq!(state.recompute_hash(), state.state_hash);
        assert_eq!(state.status, PublishStatus::Confirmed);
    }
    assert_eq!(ledger.submission_count(), 3);
}

#[tokio::test]
async fn re_revocation_is_a_no_op() {
    let issuer = issuer(Arc::new(LocalLedger::new()));
    let id = issuer
        .create_identity(IdentityMetadata::default())
        .await
        .unwrap()
        .identifier;
    issuer.publish_pending_state(&id).await.unwrap();
    let claim = issuer
        .create_claim(&id, kyc("did:example:bob", 19900101))
        .await
        .unwrap();
    issuer
        .revoke_claim(&id, claim.revocation_nonce, RevocationReason::Compromised)
        .await
        .unwrap();

    let before = issuer.get_identity(&id).await.unwrap();
    let states_before = issuer.get_states(&id).await.unwrap();

    let again = issuer
        .revoke_claim(&id, claim.revocation_nonce, RevocationReason::ManualRevocation)
        .await
        .unwrap();
    assert!(again.revoked);
    // The first revocation record is kept.
    assert_eq!(
        again.revocation.map(|r| r.reason),
        Some(RevocationReason::Compromised)
    );

    let after = issuer.get_identity(&id).await.unwrap();
    assert_eq!(after.revocation_tree_root, before.revocation_tree_root);
    assert_eq!(after.state_hash, before.state_hash);
    assert_eq!(issuer.get_states(&id).await.unwrap(), states_before);
}

#[tokio::test]
async fn claims_verify_against_final_claims_root() {
    let issuer = issuer(Arc::new(LocalLedger::new()));
    let id = issuer
        .create_identity(IdentityMetadata::default())
        .await
        .unwrap()
        .identifier;

    let mut claims = Vec::new();
    for i in 0..10u64 {
        claims.push(
            issuer
                .create_claim(&id, kyc(&format!("did:example:holder-{i}"), 20000101 + i))
                .await
                .unwrap(),
        );
        issuer.publish_pending_state(&id).await.unwrap();
    }

    let identity = issuer.export_identity(&id).await.unwrap();
    let root = identity.claims_tree.root();
    for claim in &claims {
        let proof = identity.claims_tree.prove_inclusion(&claim.index).unwrap();
        assert!(proof.verify_inclusion(&root, &claim.index, &claim.value).is_ok());
    }
    // Auth claim plus ten issued claims.
    assert_eq!(identity.claims_tree.len(), 11);
    assert!(identity.verify().is_ok());
}

#[tokio::test]
async fn claims_issued_while_pending_are_coalesced() {
    let issuer = issuer(Arc::new(LocalLedger::new()));
    let id = issuer
        .create_identity(IdentityMetadata::default())
        .await
        .unwrap()
        .identifier;

    // Genesis is still pending: both claims fold into one follow-up state.
    let a = issuer
        .create_claim(&id, kyc("did:example:a", 19800101))
        .await
        .unwrap();
    let b = issuer
        .create_claim(&id, kyc("did:example:b", 19800102))
        .await
        .unwrap();
    assert!(a.proof.issuer_state.is_none());
    assert!(b.proof.issuer_state.is_none());

    let info = issuer.get_identity(&id).await.unwrap();
    assert_eq!(info.state_count, 1);
    assert!(info.unpublished_changes);

    let genesis = issuer.publish_pending_state(&id).await.unwrap().unwrap();
    assert_eq!(genesis.status, PublishStatus::Confirmed);

    let states = issuer.get_states(&id).await.unwrap();
    assert_eq!(states.len(), 2);
    assert_eq!(states[1].status, PublishStatus::Pending);
    assert_eq!(states[1].previous_state, genesis.state_hash);
    // b was the last insertion, so its proof is against the follow-up root.
    assert!(b.verify_inclusion(&states[1].claims_tree_root).is_ok());
    assert!(!issuer.get_identity(&id).await.unwrap().unpublished_changes);

    let follow_up = issuer.publish_pending_state(&id).await.unwrap().unwrap();
    assert_eq!(follow_up.state_hash, states[1].state_hash);
    assert_eq!(follow_up.status, PublishStatus::Confirmed);
    assert!(issuer.publish_pending_state(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_claim_is_rejected_without_side_effects() {
    let issuer = issuer(Arc::new(LocalLedger::new()));
    let id = issuer
        .create_identity(IdentityMetadata::default())
        .await
        .unwrap()
        .identifier;
    issuer.publish_pending_state(&id).await.unwrap();

    issuer
        .create_claim(&id, kyc("did:example:carol", 19700101))
        .await
        .unwrap();
    let before = issuer.get_identity(&id).await.unwrap();

    let err = issuer
        .create_claim(&id, kyc("did:example:carol", 19700101))
        .await
        .unwrap_err();
    assert!(matches!(err, IssuerError::DuplicateClaim(_)));
    assert_eq!(err.kind(), ErrorKind::Input);

    let after = issuer.get_identity(&id).await.unwrap();
    assert_eq!(after.claims_tree_root, before.claims_tree_root);
    assert_eq!(after.state_count, before.state_count);
    assert_eq!(after.claim_count, before.claim_count);
}

#[tokio::test]
async fn unknown_nonce_status_and_revocation() {
    let issuer = issuer(Arc::new(LocalLedger::new()));
    let id = issuer
        .create_identity(IdentityMetadata::default())
        .await
        .unwrap()
        .identifier;

    let status = issuer.get_revocation_status(&id, 42).await.unwrap();
    assert!(!status.revoked);
    assert!(status.revocation.is_none());
    assert!(status.verify().is_ok());

    let err = issuer
        .revoke_claim(&id, 42, RevocationReason::ManualRevocation)
        .await
        .unwrap_err();
    assert!(matches!(err, IssuerError::ClaimDoesNotExist { nonce: 42 }));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn missing_required_subject_field_is_rejected() {
    let issuer = issuer(Arc::new(LocalLedger::new()));
    let id = issuer
        .create_identity(IdentityMetadata::default())
        .await
        .unwrap()
        .identifier;

    let request = ClaimRequest::new(KYC_SCHEMA, "KYCAgeCredential", json!({"id": "did:example:x"}));
    let err = issuer.create_claim(&id, request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(issuer.get_claims(&id).await.unwrap().is_empty());
}

#[tokio::test]
async fn immutable_identity_issues_signature_only_claims() {
    let ledger = Arc::new(LocalLedger::new());
    let issuer = issuer(ledger.clone());
    let info = issuer
        .create_identity(IdentityMetadata {
            endpoint: String::new(),
            mode: IdentityMode::Immutable,
        })
        .await
        .unwrap();
    assert_eq!(info.status, PublishStatus::Confirmed);
    let id = info.identifier;

    let claim = issuer
        .create_claim(&id, kyc("did:example:dave", 19850505))
        .await
        .unwrap();
    assert!(claim.verify_signature().is_ok());
    assert!(claim.proof.mtp.is_none());
    assert!(claim.proof.claims_tree_root.is_none());

    let after = issuer.get_identity(&id).await.unwrap();
    assert_eq!(after.state_hash, info.state_hash);
    assert_eq!(after.claims_tree_root, info.claims_tree_root);
    assert_eq!(after.claim_count, 1);

    let err = issuer
        .create_claim(&id, kyc("did:example:dave", 19850505))
        .await
        .unwrap_err();
    assert!(matches!(err, IssuerError::DuplicateClaim(_)));

    let err = issuer
        .revoke_claim(&id, claim.revocation_nonce, RevocationReason::Compromised)
        .await
        .unwrap_err();
    assert!(matches!(err, IssuerError::IdentityImmutable(_)));

    assert!(issuer.publish_pending_state(&id).await.unwrap().is_none());
    assert_eq!(ledger.submission_count(), 0);
}

#[tokio::test]
async fn relay_identity_confirms_without_ledger() {
    let ledger = Arc::new(LocalLedger::new());
    let issuer = issuer(ledger.clone());
    let info = issuer
        .create_identity(IdentityMetadata {
            endpoint: "https://relay.example".into(),
            mode: IdentityMode::Relay,
        })
        .await
        .unwrap();
    assert_eq!(info.endpoint, "https://relay.example");
    let id = info.identifier;

    let claim = issuer
        .create_claim(&id, kyc("did:example:erin", 19920202))
        .await
        .unwrap();
    issuer
        .revoke_claim(&id, claim.revocation_nonce, RevocationReason::HolderRequest)
        .await
        .unwrap();

    let states = issuer.get_states(&id).await.unwrap();
    assert_eq!(states.len(), 3);
    assert!(states.iter().all(|s| s.status == PublishStatus::Confirmed));
    assert!(states.iter().all(|s| s.tx_id.is_none()));
    assert!(verify_state_chain(&states).is_ok());
    assert!(issuer.publish_pending_state(&id).await.unwrap().is_none());
    assert_eq!(ledger.submission_count(), 0);
}

#[tokio::test]
async fn credential_document_shape() {
    let issuer = issuer(Arc::new(LocalLedger::new()));
    let id = issuer
        .create_identity(IdentityMetadata::default())
        .await
        .unwrap()
        .identifier;
    let claim = issuer
        .create_claim(
            &id,
            kyc("did:example:frank", 19770707).expiration(4_102_444_800),
        )
        .await
        .unwrap();

    let doc = claim.to_credential();
    assert_eq!(doc["issuer"], json!(id.0));
    assert_eq!(doc["type"][1], json!("KYCAgeCredential"));
    assert_eq!(doc["@context"][1], json!(KYC_CONTEXT));
    assert_eq!(doc["credentialSubject"]["id"], json!("did:example:frank"));
    assert_eq!(
        doc["credentialStatus"]["revocationNonce"],
        json!(claim.revocation_nonce)
    );
    assert!(doc["expirationDate"].as_str().unwrap().starts_with("2100-01-01"));
    assert!(!claim.is_expired(1_700_000_000));
    assert!(claim.is_expired(4_102_444_800));
}
