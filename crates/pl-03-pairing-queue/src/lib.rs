//! # PL-03 Pairing Queue
//!
//! Defers pairing requests whose peer is offline and replays them later.
//!
//! **Subsystem ID:** 03
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Queues
//!
//! A request lands in the queue of its proxy when one is given, otherwise in
//! the queue of its target component. Each queue has its own lock; there is
//! no global lock, so queues are processed independently.
//!
//! ## Processing
//!
//! [`PairingQueueApi::process_offline`] walks a queue in FIFO order and asks a
//! [`HandshakeGateway`] to start each handshake. The gateway is passed in by
//! the caller, which keeps this crate independent of the handshake crate.
//! A cancel racing with processing always wins.
//!
//! Failed entries are terminal. They are never retried; callers re-enqueue.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use domain::{
    queue_id_for, EnqueueRequest, EntryOutcome, EntryResult, ProcessReport, QueueActivity,
    QueueConfig, QueueHealth, QueueStatus,
};
pub use ports::{HandshakeGateway, MockHandshakeGateway, PairingQueueApi};
pub use service::PairingQueueService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
