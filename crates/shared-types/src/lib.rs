//! # Shared Types Crate
//!
//! Domain entities, identifiers and the ledger transport contract shared by
//! every pairing subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a subsystem or wire
//!   boundary is defined here.
//! - **One Error Taxonomy**: all core operations fail with [`PairingError`];
//!   backend and network faults are wrapped as [`TransportError`].
//! - **Transport Agnostic**: the core only ever sees
//!   `Arc<dyn LedgerTransport>`, never a concrete wire client.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entities;
pub mod errors;
pub mod ids;
pub mod ledger;
pub mod mock;
pub mod stream;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use ids::*;
pub use ledger::*;
pub use mock::{MockLedger, PausePoint, PauseHandle};
pub use stream::{StatusSender, StatusStream};
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
