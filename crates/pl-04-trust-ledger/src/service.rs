//! # Trust Ledger Service
//!
//! Local state is authoritative for this process; every mutation is
//! journalled before it becomes visible.

use crate::algorithms::{policy_from_config, TrustPolicy};
use crate::domain::config::in_unit_range;
use crate::domain::{PairKey, TrustConfig};
use crate::ports::TrustLedgerApi;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::{
    Committed, ComponentRef, EntityKind, LedgerCall, LedgerTransport, PairingError,
    PairingOutcome, ScoreUpdate, StatusChange, SystemTimeSource, TensorId, TensorStatus,
    TimeSource, TrustTensor,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type TensorCell = Arc<Mutex<TrustTensor>>;

/// Trust ledger backed by a [`LedgerTransport`].
pub struct TrustLedgerService {
    ledger: Arc<dyn LedgerTransport>,
    clock: Arc<dyn TimeSource>,
    config: TrustConfig,
    policy: Arc<dyn TrustPolicy>,
    tensors: DashMap<TensorId, TensorCell>,
    pairs: DashMap<PairKey, TensorId>,
}

impl TrustLedgerService {
    /// Create a service using the configured policy.
    pub fn new(ledger: Arc<dyn LedgerTransport>, config: TrustConfig) -> Result<Self, PairingError> {
        Self::with_clock(ledger, config, Arc::new(SystemTimeSource))
    }

    /// Create a service with an explicit clock.
    pub fn with_clock(
        ledger: Arc<dyn LedgerTransport>,
        config: TrustConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, PairingError> {
        config.validate()?;
        let policy = policy_from_config(&config.policy);
        Ok(Self {
            ledger,
            clock,
            config,
            policy,
            tensors: DashMap::new(),
            pairs: DashMap::new(),
        })
    }

    /// Replace the update policy.
    pub fn with_policy(mut self, policy: Arc<dyn TrustPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Name of the active policy.
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Number of tensors held locally.
    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    fn cell(&self, id: &TensorId) -> Option<TensorCell> {
        self.tensors.get(id).map(|entry| entry.value().clone())
    }

    fn check_creator(creator: &str) -> Result<(), PairingError> {
        if creator.trim().is_empty() {
            return Err(PairingError::invalid_input("creator", "creator is empty"));
        }
        Ok(())
    }
}

#[async_trait]
impl TrustLedgerApi for TrustLedgerService {
    async fn create(
        &self,
        creator: &str,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
        initial_score: f64,
    ) -> Result<Committed<TrustTensor>, PairingError> {
        if !in_unit_range(initial_score) {
            return Err(PairingError::InvalidScore(initial_score));
        }
        Self::check_creator(creator)?;
        ComponentRef::validate_pair(component_a, component_b)?;
        if context.trim().is_empty() {
            return Err(PairingError::invalid_input("context", "context is empty"));
        }

        let now = self.clock.now();
        let tensor = TrustTensor {
            tensor_id: TensorId::generate(),
            component_a: component_a.clone(),
            component_b: component_b.clone(),
            context: context.to_string(),
            score: initial_score,
            status: TensorStatus::Active,
            evidence_count: 0,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let id = tensor.tensor_id.clone();
        let key = PairKey::new(component_a, component_b, context);

        // Updates racing the journal write wait on this guard.
        let cell: TensorCell = Arc::new(Mutex::new(tensor.clone()));
        let guard = cell.lock().await;

        match self.pairs.entry(key.clone()) {
            Entry::Occupied(existing) => {
                return Err(PairingError::invalid_state(
                    EntityKind::Tensor,
                    existing.get(),
                    "existing",
                    "create",
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }
        self.tensors.insert(id.clone(), cell.clone());

        let call = LedgerCall::new(creator, context, tensor);
        match self.ledger.create_trust_tensor(call).await {
            Ok(committed) => {
                drop(guard);
                info!(
                    "[pl-04] Created tensor {} for {} <-> {} at {:.3}",
                    id, component_a, component_b, initial_score
                );
                Ok(committed)
            }
            Err(e) => {
                self.tensors.remove(&id);
                self.pairs.remove(&key);
                drop(guard);
                warn!("[pl-04] Tensor {} not journalled: {}", id, e);
                Err(e.into())
            }
        }
    }

    async fn update_on_outcome(
        &self,
        creator: &str,
        tensor_id: &TensorId,
        outcome: PairingOutcome,
    ) -> Result<Committed<TrustTensor>, PairingError> {
        Self::check_creator(creator)?;
        let cell = self
            .cell(tensor_id)
            .ok_or_else(|| PairingError::not_found(EntityKind::Tensor, tensor_id))?;
        let mut guard = cell.lock().await;
        if !self.tensors.contains_key(tensor_id) {
            // Creation was rolled back while we waited.
            return Err(PairingError::not_found(EntityKind::Tensor, tensor_id));
        }
        if guard.status != TensorStatus::Active {
            return Err(PairingError::invalid_state(
                EntityKind::Tensor,
                tensor_id,
                guard.status,
                "update score",
            ));
        }

        let mut next = guard.clone();
        let raw = self
            .policy
            .next_score(next.score, next.evidence_count, outcome);
        next.apply_score(raw, self.clock.now());

        let update = ScoreUpdate {
            tensor_id: tensor_id.clone(),
            score: next.score,
            evidence_count: next.evidence_count,
            version: next.version,
            outcome,
        };
        let call = LedgerCall::new(creator, next.context.clone(), update);
        let committed = self.ledger.update_trust_score(call).await?;

        *guard = next.clone();
        debug!(
            "[pl-04] Tensor {} {} -> {:.3} (evidence {}, policy {})",
            tensor_id,
            outcome,
            next.score,
            next.evidence_count,
            self.policy.name()
        );
        Ok(Committed {
            entity: next,
            receipt: committed.receipt,
        })
    }

    async fn record_outcome(
        &self,
        creator: &str,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
        outcome: PairingOutcome,
    ) -> Result<Committed<TrustTensor>, PairingError> {
        let key = PairKey::new(component_a, component_b, context);
        let existing = self.pairs.get(&key).map(|entry| entry.value().clone());
        let tensor_id = match existing {
            Some(id) => id,
            None => {
                match self
                    .create(
                        creator,
                        component_a,
                        component_b,
                        context,
                        self.config.initial_score,
                    )
                    .await
                {
                    Ok(created) => created.entity.tensor_id,
                    Err(PairingError::InvalidState {
                        entity: EntityKind::Tensor,
                        id,
                        ..
                    }) => TensorId::new(id),
                    Err(e) => return Err(e),
                }
            }
        };
        self.update_on_outcome(creator, &tensor_id, outcome).await
    }

    async fn deactivate(
        &self,
        creator: &str,
        tensor_id: &TensorId,
    ) -> Result<Committed<TrustTensor>, PairingError> {
        Self::check_creator(creator)?;
        let cell = self
            .cell(tensor_id)
            .ok_or_else(|| PairingError::not_found(EntityKind::Tensor, tensor_id))?;
        let mut guard = cell.lock().await;

        let mut next = guard.clone();
        next.transition_to(TensorStatus::Inactive, self.clock.now())?;

        let change = StatusChange::new(tensor_id, TensorStatus::Inactive, None);
        let call = LedgerCall::new(creator, next.context.clone(), change);
        let committed = self.ledger.update_tensor_status(call).await?;

        *guard = next.clone();
        info!("[pl-04] Tensor {} deactivated", tensor_id);
        Ok(Committed {
            entity: next,
            receipt: committed.receipt,
        })
    }

    async fn get(&self, tensor_id: &TensorId) -> Result<TrustTensor, PairingError> {
        if let Some(cell) = self.cell(tensor_id) {
            return Ok(cell.lock().await.clone());
        }
        self.ledger
            .get_trust_tensor(tensor_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    PairingError::not_found(EntityKind::Tensor, tensor_id)
                } else {
                    PairingError::TransportFailure(e)
                }
            })
    }

    async fn find(
        &self,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
    ) -> Result<Option<TrustTensor>, PairingError> {
        let key = PairKey::new(component_a, component_b, context);
        let Some(id) = self.pairs.get(&key).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        match self.cell(&id) {
            Some(cell) => Ok(Some(cell.lock().await.clone())),
            None => Ok(None),
        }
    }
}
