//! # Inbound Ports
//!
//! What the trust ledger can do.

use async_trait::async_trait;
use shared_types::{
    Committed, ComponentRef, PairingError, PairingOutcome, TensorId, TrustTensor,
};

/// Trust ledger API - inbound port.
#[async_trait]
pub trait TrustLedgerApi: Send + Sync {
    /// Create the tensor of a pair in a context.
    async fn create(
        &self,
        creator: &str,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
        initial_score: f64,
    ) -> Result<Committed<TrustTensor>, PairingError>;

    /// Apply a pairing outcome to an existing tensor.
    async fn update_on_outcome(
        &self,
        creator: &str,
        tensor_id: &TensorId,
        outcome: PairingOutcome,
    ) -> Result<Committed<TrustTensor>, PairingError>;

    /// Find or create the pair's tensor, then apply the outcome.
    async fn record_outcome(
        &self,
        creator: &str,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
        outcome: PairingOutcome,
    ) -> Result<Committed<TrustTensor>, PairingError>;

    /// Retire a tensor.
    async fn deactivate(
        &self,
        creator: &str,
        tensor_id: &TensorId,
    ) -> Result<Committed<TrustTensor>, PairingError>;

    /// Read a tensor.
    async fn get(&self, tensor_id: &TensorId) -> Result<TrustTensor, PairingError>;

    /// Tensor of a pair in a context, if any.
    async fn find(
        &self,
        component_a: &ComponentRef,
        component_b: &ComponentRef,
        context: &str,
    ) -> Result<Option<TrustTensor>, PairingError>;
}
