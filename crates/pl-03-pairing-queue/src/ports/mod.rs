//! # Ports
//!
//! - Inbound: [`PairingQueueApi`]
//! - Outbound: [`HandshakeGateway`], supplied per `process_offline` call

pub mod inbound;
pub mod outbound;

pub use inbound::PairingQueueApi;
pub use outbound::{HandshakeGateway, MockHandshakeGateway};
