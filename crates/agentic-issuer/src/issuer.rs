//! The issuer service.
//!
//! [`Issuer`] is the handle an embedding application (or the CLI) builds
//! once and clones freely. It owns the stores, the schema resolver and the
//! publisher, and serializes every mutation of an identity through that
//! identity's own async mutex. Different identities never contend.
//!
//! Every mutation runs against the locked aggregate without await points
//! and is persisted before the lock is released. A failed persist restores
//! the aggregate to its previous value. An invariant violation additionally
//! halts the identity until [`Issuer::clear_halt`] succeeds.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use crate::claim::{
    issue_claim, revocation_status, revoke_nonce, Claim, ClaimId, ClaimRequest, RevocationReason,
    RevocationStatus, SchemaResolver, StaticSchemaResolver,
};
use crate::config::IssuerConfig;
use crate::crypto::hash::Hash256;
use crate::crypto::keys::IssuerKeyPair;
use crate::error::{ErrorKind, IssuerError, Result};
use crate::identity::{Identifier, Identity, IdentityInfo, IdentityMetadata};
use crate::publish::{AnchorRequest, LedgerClient, LocalLedger, PublishOutcome, Publisher};
use crate::state::{
    record_submission, settle, state_to_publish, IdentityState, PublishStatus,
};
use crate::storage::{IssuerStore, KeyStore, MemoryKeyStore, MemoryStore};
use crate::time::now_micros;

/// One identity's serialization domain.
struct IdentitySlot {
    /// Guards the trees and the state history.
    domain: Mutex<Identity>,
    /// Held for a whole publication round so rounds never overlap.
    publish_lane: Mutex<()>,
}

impl IdentitySlot {
    fn new(identity: Identity) -> Self {
        Self {
            domain: Mutex::new(identity),
            publish_lane: Mutex::new(()),
        }
    }
}

struct IssuerInner {
    config: IssuerConfig,
    store: Arc<dyn IssuerStore>,
    keys: Arc<dyn KeyStore>,
    schemas: Arc<dyn SchemaResolver>,
    publisher: Publisher,
    slots: RwLock<HashMap<Identifier, Arc<IdentitySlot>>>,
}

/// Builder for an [`Issuer`]. Unset collaborators default to in-memory
/// implementations and the development ledger.
pub struct IssuerBuilder {
    config: IssuerConfig,
    store: Option<Arc<dyn IssuerStore>>,
    keys: Option<Arc<dyn KeyStore>>,
    schemas: Option<Arc<dyn SchemaResolver>>,
    ledger: Option<Arc<dyn LedgerClient>>,
}

impl IssuerBuilder {
    pub fn store(mut self, store: Arc<dyn IssuerStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn keys(mut self, keys: Arc<dyn KeyStore>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn schemas(mut self, schemas: Arc<dyn SchemaResolver>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn LedgerClient>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Validate the configuration and assemble the issuer.
    pub fn build(self) -> Result<Issuer> {
        self.config.validate()?;
        let ledger = self
            .ledger
            .unwrap_or_else(|| Arc::new(LocalLedger::new()) as Arc<dyn LedgerClient>);
        let publisher = Publisher::new(ledger, self.config.publisher.clone());
        Ok(Issuer {
            inner: Arc::new(IssuerInner {
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn IssuerStore>),
                keys: self
                    .keys
                    .unwrap_or_else(|| Arc::new(MemoryKeyStore::new()) as Arc<dyn KeyStore>),
                schemas: self.schemas.unwrap_or_else(|| {
                    Arc::new(StaticSchemaResolver::new()) as Arc<dyn SchemaResolver>
                }),
                publisher,
                config: self.config,
                slots: RwLock::new(HashMap::new()),
            }),
        })
    }
}

/// Identity and claim issuer. Cheap to clone.
#[derive(Clone)]
pub struct Issuer {
    inner: Arc<IssuerInner>,
}

impl Issuer {
    pub fn builder(config: IssuerConfig) -> IssuerBuilder {
        IssuerBuilder {
            config,
            store: None,
            keys: None,
            schemas: None,
            ledger: None,
        }
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.inner.config
    }

    // ── Identities ───────────────────────────────────────────────────────────

    /// Create an identity with a fresh key pair and its genesis state.
    ///
    /// An empty endpoint defaults to the configured server URL.
    pub async fn create_identity(&self, mut metadata: IdentityMetadata) -> Result<IdentityInfo> {
        if metadata.endpoint.trim().is_empty() {
            metadata.endpoint = self.inner.config.server_url.clone();
        }

        let key_pair = IssuerKeyPair::generate()?;
        let identity = Identity::genesis(
            &metadata,
            &key_pair,
            self.inner.config.tree_depth,
            now_micros(),
        )?;
        self.inner.keys.store_key(&identity.identifier, &key_pair)?;
        self.inner.store.save_identity(&identity)?;

        let info = identity.info();
        log::info!(
            "Created {} identity {} (genesis {})",
            info.mode,
            info.identifier,
            info.state_hash
        );
        self.inner
            .slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(info.identifier.clone(), Arc::new(IdentitySlot::new(identity)));

        if info.status == PublishStatus::Pending {
            self.schedule_publication(&info.identifier);
        }
        Ok(info)
    }

    pub async fn get_identity(&self, identifier: &Identifier) -> Result<IdentityInfo> {
        self.read(identifier, Identity::info).await
    }

    pub async fn list_identities(&self) -> Result<Vec<IdentityInfo>> {
        let mut infos = Vec::new();
        for identifier in self.inner.store.list_identities()? {
            infos.push(self.get_identity(&identifier).await?);
        }
        Ok(infos)
    }

    /// The full state history, oldest first.
    pub async fn get_states(&self, identifier: &Identifier) -> Result<Vec<IdentityState>> {
        self.read(identifier, |identity| identity.states.clone()).await
    }

    /// A full copy of the aggregate.
    pub async fn export_identity(&self, identifier: &Identifier) -> Result<Identity> {
        self.read(identifier, Identity::clone).await
    }

    // ── Claims ───────────────────────────────────────────────────────────────

    /// Issue a claim.
    ///
    /// The schema is resolved before the identity is locked, so dropping
    /// the returned future before the insertion commits leaves no trace.
    pub async fn create_claim(&self, identifier: &Identifier, request: ClaimRequest) -> Result<Claim> {
        let schema = self.inner.schemas.resolve(&request.schema_url).await?;
        let key_pair = self.inner.keys.load_key(identifier)?;
        let server_url = self.inner.config.server_url.clone();

        let slot = self.slot(identifier)?;
        let issued = self
            .apply(&slot, true, |identity| {
                issue_claim(identity, &key_pair, &schema, &request, &server_url, now_micros())
            })
            .await?;

        log::info!(
            "{identifier}: issued claim {} ({}, nonce {})",
            issued.claim.id,
            issued.claim.credential_type,
            issued.claim.revocation_nonce
        );
        if issued.transition.is_some() {
            self.schedule_publication(identifier);
        }
        Ok(issued.claim)
    }

    pub async fn get_claim(&self, identifier: &Identifier, claim_id: &ClaimId) -> Result<Claim> {
        self.read(identifier, |identity| identity.claim(claim_id).cloned())
            .await?
            .ok_or_else(|| IssuerError::ClaimNotFound(format!("{claim_id} of {identifier}")))
    }

    pub async fn get_claims(&self, identifier: &Identifier) -> Result<Vec<Claim>> {
        self.read(identifier, |identity| identity.claims.clone()).await
    }

    // ── Revocation ───────────────────────────────────────────────────────────

    /// Revoke the claim carrying `nonce`. Re-revoking is a no-op.
    pub async fn revoke_claim(
        &self,
        identifier: &Identifier,
        nonce: u64,
        reason: RevocationReason,
    ) -> Result<RevocationStatus> {
        let key_pair = self.inner.keys.load_key(identifier)?;
        let slot = self.slot(identifier)?;
        let (transition, status) = self
            .apply(&slot, true, |identity| {
                let transition = revoke_nonce(identity, &key_pair, nonce, reason, now_micros())?;
                Ok((transition, revocation_status(identity, nonce)))
            })
            .await?;

        match transition {
            Some(_) => {
                log::info!("{identifier}: revoked nonce {nonce}");
                self.schedule_publication(identifier);
            }
            None => log::debug!("{identifier}: nonce {nonce} already revoked"),
        }
        Ok(status)
    }

    /// Revocation status of `nonce` with a proof against the current
    /// revocation-tree root.
    pub async fn get_revocation_status(
        &self,
        identifier: &Identifier,
        nonce: u64,
    ) -> Result<RevocationStatus> {
        self.read(identifier, |identity| revocation_status(identity, nonce))
            .await
    }

    // ── Publication ──────────────────────────────────────────────────────────

    /// Run one publication round for the identity.
    ///
    /// Picks the pending state (creating one when the latest state failed or
    /// coalesced changes are waiting), submits it unless it already carries
    /// a transaction, and polls the ledger without holding the identity's
    /// lock. Returns the settled state, or `None` when there was nothing to
    /// publish. Submission exhaustion and ledger failures are returned as a
    /// `Failed` state, not as an error.
    pub async fn publish_pending_state(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<IdentityState>> {
        let slot = self.slot(identifier)?;
        let _lane = slot.publish_lane.lock().await;

        let Some(state) = self
            .apply(&slot, true, |identity| state_to_publish(identity, now_micros()))
            .await?
        else {
            return Ok(None);
        };
        let hash = state.state_hash;

        let tx_id = match state.tx_id {
            Some(tx_id) => tx_id,
            None => {
                let request = AnchorRequest {
                    identifier: identifier.clone(),
                    state_hash: hash,
                    previous_state: state.previous_state,
                };
                match self.inner.publisher.submit(&request).await {
                    Ok(tx_id) => {
                        let recorded = tx_id.clone();
                        self.apply(&slot, false, move |identity| {
                            record_submission(identity, &hash, recorded, now_micros())
                        })
                        .await?;
                        tx_id
                    }
                    Err(e) => {
                        let outcome = PublishOutcome::Failed {
                            reason: format!("submission failed: {e}"),
                        };
                        return self.finish(&slot, hash, outcome).await.map(Some);
                    }
                }
            }
        };

        let outcome = self.inner.publisher.await_confirmation(&tx_id).await;
        self.finish(&slot, hash, outcome).await.map(Some)
    }

    // ── Operator controls ────────────────────────────────────────────────────

    /// Re-verify a halted identity and accept mutations again.
    pub async fn clear_halt(&self, identifier: &Identifier) -> Result<IdentityInfo> {
        let slot = self.slot(identifier)?;
        self.apply(&slot, false, |identity| {
            if identity.halted.is_some() {
                identity.verify()?;
                identity.halted = None;
                log::info!("{}: halt cleared", identity.identifier);
            }
            Ok(identity.info())
        })
        .await
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn slot(&self, identifier: &Identifier) -> Result<Arc<IdentitySlot>> {
        if let Some(slot) = self
            .inner
            .slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identifier)
        {
            return Ok(slot.clone());
        }

        let identity = self
            .inner
            .store
            .load_identity(identifier)?
            .ok_or_else(|| IssuerError::IdentityNotFound(identifier.0.clone()))?;
        let mut slots = self.inner.slots.write().unwrap_or_else(|e| e.into_inner());
        Ok(slots
            .entry(identifier.clone())
            .or_insert_with(|| Arc::new(IdentitySlot::new(identity)))
            .clone())
    }

    async fn read<T>(&self, identifier: &Identifier, view: impl FnOnce(&Identity) -> T) -> Result<T> {
        let slot = self.slot(identifier)?;
        let identity = slot.domain.lock().await;
        Ok(view(&*identity))
    }

    /// Run `op` on the locked aggregate and persist the result.
    ///
    /// On any error the aggregate is restored; an invariant violation also
    /// halts the identity. `check_halt` is false only for ledger
    /// bookkeeping and operator controls.
    async fn apply<T, F>(&self, slot: &IdentitySlot, check_halt: bool, op: F) -> Result<T>
    where
        F: FnOnce(&mut Identity) -> Result<T> + Send,
        T: Send,
    {
        let mut identity = slot.domain.lock().await;
        if check_halt {
            identity.ensure_not_halted()?;
        }
        let snapshot = identity.clone();

        let result = op(&mut *identity);
        let result = match result {
            Ok(value) => self.inner.store.save_identity(&*identity).map(|()| value),
            Err(e) => Err(e),
        };

        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                *identity = snapshot;
                if e.kind() == ErrorKind::InvariantViolation {
                    self.halt(&mut *identity, &e);
                }
                Err(e)
            }
        }
    }

    fn halt(&self, identity: &mut Identity, cause: &IssuerError) {
        identity.halted = Some(cause.to_string());
        log::error!("{}: halted: {cause}", identity.identifier);
        if let Err(e) = self.inner.store.save_identity(identity) {
            log::warn!("{}: could not persist halt: {e}", identity.identifier);
        }
    }

    async fn finish(
        &self,
        slot: &IdentitySlot,
        hash: Hash256,
        outcome: PublishOutcome,
    ) -> Result<IdentityState> {
        self.apply(slot, false, move |identity| {
            settle(identity, &hash, &outcome, now_micros())?;
            identity
                .states
                .iter()
                .rev()
                .find(|s| s.state_hash == hash && s.status.is_terminal())
                .cloned()
                .ok_or_else(|| {
                    IssuerError::BrokenStateChain(format!("settled state {hash} is missing"))
                })
        })
        .await
    }

    async fn has_pending(&self, identifier: &Identifier) -> bool {
        self.read(identifier, |identity| identity.pending_state().is_some())
            .await
            .unwrap_or(false)
    }

    /// Publish in the background until nothing is pending, when enabled.
    fn schedule_publication(&self, identifier: &Identifier) {
        if !self.inner.config.auto_publish {
            return;
        }
        let issuer = self.clone();
        let identifier = identifier.clone();
        tokio::spawn(async move {
            loop {
                match issuer.publish_pending_state(&identifier).await {
                    Ok(Some(state)) if state.status == PublishStatus::Confirmed => {
                        if !issuer.has_pending(&identifier).await {
                            break;
                        }
                    }
                    Ok(Some(state)) => {
                        log::warn!(
                            "{identifier}: background publication of {} failed",
                            state.state_hash
                        );
                        break;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("{identifier}: background publication stopped: {e}");
                        break;
                    }
                }
            }
        });
    }
}
