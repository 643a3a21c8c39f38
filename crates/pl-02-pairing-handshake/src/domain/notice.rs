//! Notices for peers that were offline when something happened to them.

use serde::{Deserialize, Serialize};
use shared_types::{ComponentRef, LctId};

/// What the notice is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// The LCT was terminated.
    Termination,
}

/// Fire-and-forget message to an unreachable peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineNotice {
    /// Peer to inform.
    pub recipient: ComponentRef,
    /// Affected LCT.
    pub lct_id: LctId,
    /// Notice kind.
    pub kind: NoticeKind,
    /// Reason given by the revoking party.
    pub reason: String,
    /// Issue timestamp (unix seconds).
    pub issued_at: u64,
}
