//! Directory reconciliation
//!
//! Pulls the remote directory state delivered by `oriel-graph` into the
//! local stores: account upserts with per-record outcomes, group
//! find-or-create with membership deltas, and cleanup of groups the
//! directory no longer has.

pub mod accounts;
pub mod groups;
pub mod result;


pub use accounts::{AccountPolicy, AccountReconciler};
pub use groups::{GroupPolicy, GroupReconciler, GroupSyncOutcome, GROUP_NAME_PREFIX};
pub use result::{SyncOperation, SyncRecord, SyncReport, SyncStatus};
