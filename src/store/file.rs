// src/store/file.rs
// =============================================================================
// A content store backed by one JSON file.
//
// The file holds an array of posts:
//
//   [ { "id": 1, "title": "Hello", "content": "<p>...</p>" }, ... ]
//
// Writes go to a sibling temp file which is then renamed over the original,
// so a crash mid-write never leaves half a file behind. A mutex serializes
// the read-modify-write cycle within this process.
// =============================================================================

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{apply_write, ContentStore, Post};
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Post>, StoreError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save(&self, posts: &[Post]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(posts)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl ContentStore for JsonFileStore {
    fn list(&self) -> impl Future<Output = Result<Vec<Post>, StoreError>> + Send {
        self.load()
    }

    fn read(&self, post_id: u64) -> impl Future<Output = Result<Post, StoreError>> + Send {
        async move {
            self.load()
                .await?
                .into_iter()
                .find(|p| p.id == post_id)
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
            let _guard = self.write_lock.lock().await;

            let mut posts = self.load().await?;
            let post = posts
                .iter_mut()
                .find(|p| p.id == post_id)
                .ok_or(StoreError::NotFound(post_id))?;
            apply_write(post, content, focus_keyphrase);
            let saved = post.clone();

            self.save(&posts).await?;
            debug!(post_id, path = %self.path.display(), "Post saved");
            Ok(saved)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with(posts: &[Post]) -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        tokio::fs::write(&path, serde_json::to_string(posts).unwrap())
            .await
            .unwrap();
        (dir, JsonFileStore::new(path))
    }

    #[tokio::test]
    async fn test_write_persists_only_target_post() {
        let (_dir, store) = store_with(&[
            Post::new(1, "One", "<p>1</p>"),
            Post::new(2, "Two", "<p>2</p>"),
        ])
        .await;

        store.write(2, "<p>two!</p>", Some("kw")).await.unwrap();

        let posts = store.list().await.unwrap();
        assert_eq!(posts[0].content, "<p>1</p>");
        assert_eq!(posts[1].content, "<p>two!</p>");
        assert_eq!(posts[1].focus_keyphrase.as_deref(), Some("kw"));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_missing_post() {
        let (_dir, store) = store_with(&[Post::new(1, "One", "")]).await;
        assert!(matches!(store.read(5).await, Err(StoreError::NotFound(5))));
    }

    #[tokio::test]
    async fn test_minimal_json_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        std::fs::write(&path, r#"[{"id": 3, "content": "<a href=\"/x\">x</a>"}]"#).unwrap();

        let post = JsonFileStore::new(path).read(3).await.unwrap();
        assert_eq!(post.title, "");
        assert_eq!(post.last_modified, None);
    }

    #[tokio::test]
    async fn test_broken_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(JsonFileStore::new(path).list().await, Err(StoreError::Json(_))));
    }
}
