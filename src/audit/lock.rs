// src/audit/lock.rs
// =============================================================================
// Advisory per-post locks.
//
// A checking run holds the lock of the post it is working on. A second run
// that reaches the same post in the meantime fails that post with PostBusy
// instead of interleaving its writes. Locks are per process only: another
// process writing the same store is not seen.
// =============================================================================

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct PostLocks {
    held: Arc<Mutex<HashSet<u64>>>,
}

/// Releases the post when dropped
#[derive(Debug)]
pub struct PostLockGuard {
    held: Arc<Mutex<HashSet<u64>>>,
    post_id: u64,
}

impl PostLocks {
    /// Takes the lock for `post_id`, or None if someone else holds it
    pub fn try_acquire(&self, post_id: u64) -> Option<PostLockGuard> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if !held.insert(post_id) {
            return None;
        }
        Some(PostLockGuard {
            held: Arc::clone(&self.held),
            post_id,
        })
    }

    pub fn is_locked(&self, post_id: u64) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&post_id)
    }
}

impl Drop for PostLockGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.post_id);
    }
}
