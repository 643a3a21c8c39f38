//! # Inbound Ports
//!
//! What the pairing queue can do.

use crate::domain::{EnqueueRequest, ProcessReport, QueueStatus};
use crate::ports::HandshakeGateway;
use async_trait::async_trait;
use shared_types::{Committed, PairingError, PairingRequest, QueueId, RequestId};

/// Pairing queue API - inbound port.
#[async_trait]
pub trait PairingQueueApi: Send + Sync {
    /// Journal and append a request. Nothing is appended if the journal
    /// write fails.
    async fn enqueue(
        &self,
        creator: &str,
        request: EnqueueRequest,
    ) -> Result<Committed<PairingRequest>, PairingError>;

    /// Live status of a queue.
    async fn status(&self, queue_id: &QueueId) -> Result<QueueStatus, PairingError>;

    /// Entries of a queue in enqueue order.
    async fn list_requests(&self, queue_id: &QueueId) -> Result<Vec<PairingRequest>, PairingError>;

    /// Entries routed through a proxy, in enqueue order.
    async fn list_by_proxy(&self, proxy_id: &str) -> Result<Vec<PairingRequest>, PairingError>;

    /// One entry.
    async fn get_request(&self, request_id: &RequestId) -> Result<PairingRequest, PairingError>;

    /// Replay every queued entry of `queue_id` through `handshake`, FIFO.
    async fn process_offline(
        &self,
        processor: &str,
        queue_id: &QueueId,
        context: &str,
        handshake: &dyn HandshakeGateway,
    ) -> Result<ProcessReport, PairingError>;

    /// Cancel a queued or in-flight entry.
    async fn cancel(
        &self,
        creator: &str,
        request_id: &RequestId,
        reason: &str,
    ) -> Result<Committed<PairingRequest>, PairingError>;
}
