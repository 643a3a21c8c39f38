//! # Domain Module
//!
//! Queue configuration, status snapshots and processing reports.

pub mod config;
pub mod queue;
pub mod report;

pub use config::QueueConfig;
pub use queue::{queue_id_for, EnqueueRequest, QueueActivity, QueueHealth, QueueStatus};
pub use report::{EntryOutcome, EntryResult, ProcessReport};
