// src/audit/report.rs
// =============================================================================
// What a checking run tells the outside world.
//
// - RunEvent: streamed while the run is going (progress, checkpoints, failures)
// - CheckReport: returned when the run is over
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::links::{Link, LinkStatus};

/// A link picked for checking, together with the post that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedLink {
    pub post_id: u64,
    #[serde(flatten)]
    pub link: Link,
}

impl SelectedLink {
    pub fn new(post_id: u64, link: Link) -> Self {
        Self { post_id, link }
    }
}

/// Emitted during a run, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    PostStarted { post_id: u64, urls: usize },
    /// Distinct URLs probed so far vs distinct URLs selected; never decreases
    Progress { checked: usize, total: usize },
    CheckpointSaved { post_id: u64 },
    PostFinished { post_id: u64 },
    PostFailed { post_id: u64, title: String, message: String },
}

/// Final status of one checked link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResult {
    pub post_id: u64,
    pub link_id: String,
    pub href: String,
    pub status: LinkStatus,
}

/// A post whose run was aborted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFailure {
    pub post_id: u64,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub checked_urls: usize,
    pub total_urls: usize,
    pub results: Vec<LinkResult>,
    pub failures: Vec<PostFailure>,
}

impl CheckReport {
    pub fn broken_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == LinkStatus::Broken)
            .count()
    }

    pub fn ok_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == LinkStatus::Ok)
            .count()
    }
}

/// Outcome of a bulk edit (find/replace, reset) across posts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    /// Posts that were rewritten and saved, as stored
    pub updated: Vec<crate::store::Post>,
    pub failures: Vec<PostFailure>,
}
