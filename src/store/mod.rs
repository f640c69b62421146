// src/store/mod.rs
// =============================================================================
// Where post content lives.
//
// The auditor never owns posts: it reads them from a ContentStore, rewrites
// their HTML, and writes the whole content back. Every write must be atomic
// and must not drop anything it was not asked to change.
//
// Submodules:
// - file:   a JSON array of posts on disk (what the CLI uses)
// - memory: an in-process map, handy for embedding and tests
// =============================================================================

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::StoreError;

/// A blog post as held by the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    /// Raw HTML; the system of record for link state
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_keyphrase: Option<String>,
}

impl Post {
    pub fn new(id: u64, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
            last_modified: None,
            focus_keyphrase: None,
        }
    }
}

/// Read/write access to post content
pub trait ContentStore {
    fn list(&self) -> impl Future<Output = Result<Vec<Post>, StoreError>> + Send;

    fn read(&self, post_id: u64) -> impl Future<Output = Result<Post, StoreError>> + Send;

    /// Replaces the content of one post and returns the stored snapshot
    ///
    /// `focus_keyphrase: None` leaves the stored keyphrase untouched.
    fn write(
        &self,
        post_id: u64,
        content: &str,
        focus_keyphrase: Option<&str>,
    ) -> impl Future<Output = Result<Post, StoreError>> + Send;
}

/// Applies a write to an in-memory post
pub(crate) fn apply_write(post: &mut Post, content: &str, focus_keyphrase: Option<&str>) {
    post.content = content.to_string();
    if let Some(keyphrase) = focus_keyphrase {
        post.focus_keyphrase = Some(keyphrase.to_string());
    }
    post.last_modified = Some(Utc::now());
}
