//! # Ledger RPC API
//!
//! One definition for both sides of the streaming transport: the gateway
//! implements [`LedgerRpcServer`], [`crate::RpcLedgerClient`] calls through
//! the generated [`LedgerRpcClient`]. Every method lives in the `ledger`
//! namespace and mirrors one REST route.

use jsonrpsee::core::SubscriptionResult;
use jsonrpsee::proc_macros::rpc;
use shared_types::{
    AnonymousComponentRecord, Capabilities, ChallengeStatus, Committed, ComponentRules, LctRecord,
    LctStatus,
    LedgerCall, PairingAuthorization, PairingChallenge, PairingRequest, RequestStatus,
    RevocationEvent, RevokePairing, ScoreUpdate, StatusChange, StatusUpdate, TensorStatus,
    TrustTensor,
};

pub use jsonrpsee::core::RpcResult;

/// Ledger backend over JSON-RPC.
#[rpc(server, client, namespace = "ledger")]
pub trait LedgerRpc {
    /// Backend capabilities.
    #[method(name = "capabilities")]
    async fn capabilities(&self) -> RpcResult<Capabilities>;

    /// Register an anonymous component.
    #[method(name = "registerAnonymousComponent")]
    async fn register_anonymous_component(
        &self,
        call: LedgerCall<AnonymousComponentRecord>,
    ) -> RpcResult<Committed<AnonymousComponentRecord>>;

    /// Record an anonymous revocation.
    #[method(name = "revokeAnonymousComponent")]
    async fn revoke_anonymous_component(
        &self,
        call: LedgerCall<RevocationEvent>,
    ) -> RpcResult<Committed<RevocationEvent>>;

    /// Record an anonymous pairing authorization.
    #[method(name = "authorizeAnonymousPairing")]
    async fn authorize_anonymous_pairing(
        &self,
        call: LedgerCall<PairingAuthorization>,
    ) -> RpcResult<Committed<PairingAuthorization>>;

    /// Read an anonymous component.
    #[method(name = "getAnonymousComponent")]
    async fn get_anonymous_component(
        &self,
        component_hash: String,
    ) -> RpcResult<AnonymousComponentRecord>;

    /// Replace the pairing rules of an anonymous component.
    #[method(name = "setComponentRules")]
    async fn set_component_rules(
        &self,
        call: LedgerCall<ComponentRules>,
    ) -> RpcResult<Committed<ComponentRules>>;

    /// Read the pairing rules of an anonymous component.
    #[method(name = "getComponentRules")]
    async fn get_component_rules(&self, component_hash: String) -> RpcResult<ComponentRules>;

    /// Record a new challenge.
    #[method(name = "initiatePairing")]
    async fn initiate_pairing(
        &self,
        call: LedgerCall<PairingChallenge>,
    ) -> RpcResult<Committed<PairingChallenge>>;

    /// Record a challenge status change.
    #[method(name = "updateChallengeStatus")]
    async fn update_challenge_status(
        &self,
        call: LedgerCall<StatusChange<ChallengeStatus>>,
    ) -> RpcResult<Committed<StatusChange<ChallengeStatus>>>;

    /// Read a challenge.
    #[method(name = "getChallenge")]
    async fn get_challenge(&self, challenge_id: String) -> RpcResult<PairingChallenge>;

    /// Record a completed pairing.
    #[method(name = "completePairing")]
    async fn complete_pairing(&self, call: LedgerCall<LctRecord>) -> RpcResult<Committed<LctRecord>>;

    /// Record an LCT status change.
    #[method(name = "updateLctStatus")]
    async fn update_lct_status(
        &self,
        call: LedgerCall<StatusChange<LctStatus>>,
    ) -> RpcResult<Committed<StatusChange<LctStatus>>>;

    /// Record an LCT revocation.
    #[method(name = "revokePairing")]
    async fn revoke_pairing(
        &self,
        call: LedgerCall<RevokePairing>,
    ) -> RpcResult<Committed<RevokePairing>>;

    /// Read an LCT.
    #[method(name = "getLct")]
    async fn get_lct(&self, lct_id: String) -> RpcResult<LctRecord>;

    /// Every LCT of one component.
    #[method(name = "listComponentLcts")]
    async fn list_component_lcts(&self, component_id: String) -> RpcResult<Vec<LctRecord>>;

    /// Record a queued request.
    #[method(name = "queuePairingRequest")]
    async fn queue_pairing_request(
        &self,
        call: LedgerCall<PairingRequest>,
    ) -> RpcResult<Committed<PairingRequest>>;

    /// Record a queue entry status change.
    #[method(name = "updateRequestStatus")]
    async fn update_request_status(
        &self,
        call: LedgerCall<StatusChange<RequestStatus>>,
    ) -> RpcResult<Committed<StatusChange<RequestStatus>>>;

    /// Read a queued request.
    #[method(name = "getPairingRequest")]
    async fn get_pairing_request(&self, request_id: String) -> RpcResult<PairingRequest>;

    /// Record a new trust tensor.
    #[method(name = "createTrustTensor")]
    async fn create_trust_tensor(
        &self,
        call: LedgerCall<TrustTensor>,
    ) -> RpcResult<Committed<TrustTensor>>;

    /// Record a score update.
    #[method(name = "updateTrustScore")]
    async fn update_trust_score(
        &self,
        call: LedgerCall<ScoreUpdate>,
    ) -> RpcResult<Committed<ScoreUpdate>>;

    /// Record a tensor status change.
    #[method(name = "updateTensorStatus")]
    async fn update_tensor_status(
        &self,
        call: LedgerCall<StatusChange<TensorStatus>>,
    ) -> RpcResult<Committed<StatusChange<TensorStatus>>>;

    /// Read a trust tensor.
    #[method(name = "getTrustTensor")]
    async fn get_trust_tensor(&self, tensor_id: String) -> RpcResult<TrustTensor>;

    /// Current status of any entity.
    #[method(name = "getStatus")]
    async fn get_status(&self, entity_id: String) -> RpcResult<StatusUpdate>;

    /// Status changes of one entity, starting with its current status.
    #[subscription(
        name = "subscribeStatus" => "status",
        unsubscribe = "unsubscribeStatus",
        item = StatusUpdate
    )]
    async fn subscribe_status(&self, entity_id: String) -> SubscriptionResult;
}
