//! # Ports
//!
//! Inbound: the handshake API. Outbound: everything the handshake needs from
//! its neighbours.

pub mod inbound;
pub mod outbound;

pub use inbound::PairingHandshakeApi;
pub use outbound::{
    AuthVerifier, LivenessOracle, MockOfflineQueue, MockTrustGateway, NotificationChannel,
    OfflineQueue, RecordingNotifier, StaticLiveness, TrustGateway,
};
