// src/audit/mod.rs
// Link operations across posts: batch checking, bulk edits, per-post locks

mod batch;
mod lock;
mod report;

pub use batch::LinkAuditor;
pub use lock::{PostLockGuard, PostLocks};
pub use report::{BulkOutcome, CheckReport, LinkResult, PostFailure, RunEvent, SelectedLink};
