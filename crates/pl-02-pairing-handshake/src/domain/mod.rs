//! # Domain
//!
//! Handshake configuration, the in-memory LCT and the request/outcome
//! types of the handshake API.

pub mod config;
pub mod lct;
pub mod notice;
pub mod outcome;

pub use config::HandshakeConfig;
pub use lct::{AccessDecision, Lct};
pub use notice::{NoticeKind, OfflineNotice};
pub use outcome::{
    CompleteRequest, InitiateOutcome, InitiateRequest, PairingCompletion, RevokeOutcome,
};
