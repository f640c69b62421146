// src/error.rs
// =============================================================================
// Named errors for the library.
//
// Only two kinds of failure ever reach a caller:
// - a post's content could not be rewritten (RewriteError)
// - a post could not be read or written (StoreError)
//
// Network failures never show up here: the prober folds them into `broken`.
// AuditError wraps both with the post they belong to, so the CLI can name
// the failing post while the rest of a run keeps going.
// =============================================================================

use thiserror::Error;

/// The HTML rewriter rejected the content
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("HTML rewriting failed: {0}")]
    Html(String),

    #[error("Rewritten HTML is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failures of the content store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Post {0} not found")]
    NotFound(u64),

    #[error("Content store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Content store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The store refused the write (used by remote or test stores)
    #[error("Write to post {post_id} rejected: {message}")]
    Rejected { post_id: u64, message: String },
}

/// Errors surfaced by the audit operations
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to save post {post_id} ({title}): {source}")]
    Persistence {
        post_id: u64,
        title: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to rewrite links in post {post_id}: {source}")]
    Rewrite {
        post_id: u64,
        #[source]
        source: RewriteError,
    },

    #[error("Post {0} is already being checked by another run")]
    PostBusy(u64),

    #[error("Post {0} is not part of this run")]
    UnknownPost(u64),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl AuditError {
    /// The post this error belongs to, if any
    pub fn post_id(&self) -> Option<u64> {
        match self {
            AuditError::Persistence { post_id, .. } | AuditError::Rewrite { post_id, .. } => {
                Some(*post_id)
            }
            AuditError::PostBusy(id) | AuditError::UnknownPost(id) => Some(*id),
            AuditError::Config(_) | AuditError::HttpClient(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_names_the_post() {
        let err = AuditError::Persistence {
            post_id: 7,
            title: "Hello".to_string(),
            source: StoreError::NotFound(7),
        };
        assert_eq!(err.post_id(), Some(7));
        assert!(err.to_string().contains("post 7 (Hello)"));
    }

    #[test]
    fn test_config_error_has_no_post() {
        assert_eq!(AuditError::Config("bad".into()).post_id(), None);
    }
}
