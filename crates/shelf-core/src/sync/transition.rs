//! Sync status transitions.
//!
//! Every status the coordinator stamps on a record comes from [`transition`].

use crate::models::SyncStatus;

/// The mutation being replicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    Insert,
    Update,
    Delete,
}

impl SyncOp {
    /// The status a record carries while this mutation is unreplicated.
    pub const fn pending_status(self) -> SyncStatus {
        match self {
            Self::Insert => SyncStatus::PendingInsert,
            Self::Update => SyncStatus::PendingUpdate,
            Self::Delete => SyncStatus::PendingDelete,
        }
    }
}

/// What just happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The local write is about to be committed; `online` is the network flag.
    LocalWrite { online: bool },
    RemoteOk,
    RemoteFailed,
}

impl Outcome {
    pub const fn local(online: bool) -> Self {
        Self::LocalWrite { online }
    }
}

/// Next status for a record, or `None` when the record leaves the local store.
///
/// Insert and update demote symmetrically on remote failure. Field values are
/// never part of a transition.
pub const fn transition(current: SyncStatus, op: SyncOp, outcome: Outcome) -> Option<SyncStatus> {
    match (op, outcome) {
        (SyncOp::Insert | SyncOp::Update, Outcome::LocalWrite { online: true } | Outcome::RemoteOk) => {
            Some(SyncStatus::Synced)
        }
        (SyncOp::Insert | SyncOp::Update, Outcome::LocalWrite { online: false } | Outcome::RemoteFailed) => {
            Some(op.pending_status())
        }
        (SyncOp::Delete, Outcome::LocalWrite { .. } | Outcome::RemoteOk) => None,
        (SyncOp::Delete, Outcome::RemoteFailed) => Some(current),
    }
}
