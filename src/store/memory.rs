// src/store/memory.rs
// =============================================================================
// An in-process content store.
// =============================================================================

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{apply_write, ContentStore, Post};
use crate::error::StoreError;

/// Posts kept in memory, ordered by id
///
/// Clones share the same posts.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    posts: Arc<Mutex<BTreeMap<u64, Post>>>,
}

impl MemoryStore {
    pub fn new(posts: impl IntoIterator<Item = Post>) -> Self {
        Self {
            posts: Arc::new(Mutex::new(posts.into_iter().map(|p| (p.id, p)).collect())),
        }
    }
}

impl ContentStore for MemoryStore {
    fn list(&self) -> impl Future<Output = Result<Vec<Post>, StoreError>> + Send {
        async move { Ok(self.posts.lock().await.values().cloned().collect()) }
    }

    fn read(&self, post_id: u64) -> impl Future<Output = Result<Post, StoreError>> + Send {
        async move {
            self.posts
                .lock()
                .await
                .get(&post_id)
                .cloned()
                .ok_or(StoreError::NotFound(post_id))
        }
    }

    fn write(
        &self,
        post_id: u64,
        content: &str,
        focus_keyphrase: Option<&str>,
    ) -> impl Future<Output = Result<Post, StoreError>> + Send {
        async move {
            let mut posts = self.posts.lock().await;
            let post = posts.get_mut(&post_id).ok_or(StoreError::NotFound(post_id))?;
            apply_write(post, content, focus_keyphrase);
            Ok(post.clone())
        }
    }
}
