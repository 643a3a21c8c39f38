//! Per-entry results of a processing pass.

use serde::{Deserialize, Serialize};
use shared_types::{ChallengeId, QueueId, RequestId};

/// How one entry ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EntryResult {
    /// Handshake started.
    Completed {
        /// Resulting challenge.
        challenge_id: ChallengeId,
    },
    /// Handshake or journal write failed.
    Failed {
        /// Failure description.
        reason: String,
    },
    /// Cancelled while in flight.
    Aborted,
}

/// Result for one entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOutcome {
    /// Entry.
    pub request_id: RequestId,
    /// Result.
    pub result: EntryResult,
}

/// Report of one `process_offline` pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReport {
    /// Processed queue.
    pub queue_id: QueueId,
    /// Outcomes in processing order.
    pub outcomes: Vec<EntryOutcome>,
}

impl ProcessReport {
    pub(crate) fn new(queue_id: QueueId) -> Self {
        Self {
            queue_id,
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, request_id: RequestId, result: EntryResult) {
        self.outcomes.push(EntryOutcome { request_id, result });
    }

    /// Entries that produced a challenge.
    pub fn completed(&self) -> usize {
        self.count(|r| matches!(r, EntryResult::Completed { .. }))
    }

    /// Entries that failed.
    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r, EntryResult::Failed { .. }))
    }

    /// Entries cancelled mid-flight.
    pub fn aborted(&self) -> usize {
        self.count(|r| matches!(r, EntryResult::Aborted))
    }

    /// Outcome of a given entry.
    pub fn outcome(&self, request_id: &RequestId) -> Option<&EntryResult> {
        self.outcomes
            .iter()
            .find(|o| &o.request_id == request_id)
            .map(|o| &o.result)
    }

    fn count(&self, pred: impl Fn(&EntryResult) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.result)).count()
    }
}
