//! Sync coordination between the local record store and the remote store.

mod coordinator;
mod report;
mod transition;

pub use coordinator::Coordinator;
pub use report::{BatchReport, DrainReport};
pub use transition::{transition, Outcome, SyncOp};
