//! Patch stack engine
//!
//! - Patch and stack data model
//! - Snapshot log for undo/redo
//! - Pop/push planning and in-memory transactions
//! - Squash, conflict handling and persistence

pub mod conflict;
pub mod log;
pub mod manager;
pub mod patch;
pub mod planner;
pub mod squash;
#[allow(clippy::module_inception)]
pub mod stack;
pub mod transaction;

pub use conflict::TransactionState;
pub use log::{Snapshot, SnapshotId, SnapshotLog};
pub use manager::StackManager;
pub use patch::{Identity, Patch, PatchName, PatchState};
pub use squash::{Authorship, MessageSource, SquashContext, SquashRequest};
pub use stack::{PendingConflict, Stack, StackStatus};
pub use transaction::{PushOutcome, StackTransaction};
