// src/audit/batch.rs
// =============================================================================
// This module checks many links across many posts.
//
// How a run works:
// 1. Keep only external links, grouped by owning post (selection order)
// 2. For each post, in turn:
//    a. mark every selected anchor `checking` and save once
//    b. dedupe hrefs, so a URL used k times is probed once
//    c. probe the hrefs in fixed-size concurrent batches
//    d. after each batch, save a checkpoint: every occurrence of every
//       settled href gets its final status
//    e. re-read the saved content and fix any occurrence that still lacks
//       its final status (normally nothing to do)
// 3. Pause between batches and between posts to go easy on remote servers
//
// Failure policy:
// - a probe never fails the run; no answer (or a panic) means broken
// - a failed save aborts that post only; the run moves on to the next post
//
// Ordering inside a post comes purely from awaiting each step in sequence.
// =============================================================================

use futures::stream::{self, StreamExt};
use futures::FutureExt; // catch_unwind
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::lock::PostLocks;
use super::report::{BulkOutcome, CheckReport, LinkResult, PostFailure, RunEvent, SelectedLink};
use crate::checker::Prober;
use crate::config::{AuditConfig, BatchPolicy};
use crate::error::AuditError;
use crate::links::{href_matches, ContentMutator, Link, LinkExtractor, LinkStatus};
use crate::store::{ContentStore, Post};

/// Runs link operations against a content store
pub struct LinkAuditor<S, P> {
    store: S,
    prober: P,
    extractor: LinkExtractor,
    mutator: ContentMutator,
    batch: BatchPolicy,
    locks: PostLocks,
    events: Option<UnboundedSender<RunEvent>>,
}

impl<S: ContentStore, P: Prober> LinkAuditor<S, P> {
    pub fn new(config: &AuditConfig, store: S, prober: P) -> Result<Self, AuditError> {
        config.validate()?;

        Ok(Self {
            store,
            prober,
            extractor: LinkExtractor::new(config)?,
            mutator: ContentMutator::new(config),
            batch: config.batch.clone(),
            locks: PostLocks::default(),
            events: None,
        })
    }

    /// Streams RunEvents to `events` while runs are in progress
    pub fn with_events(mut self, events: UnboundedSender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Shares post locks with other auditors on the same store
    pub fn with_locks(mut self, locks: PostLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn extractor(&self) -> &LinkExtractor {
        &self.extractor
    }

    /// All links of a post, in document order
    pub fn links(&self, post: &Post) -> Vec<Link> {
        self.extractor.extract(&post.content, post.id)
    }

    /// Checks a selection of links spread over any number of posts
    ///
    /// Internal links in the selection are ignored. Posts missing from
    /// `posts`, busy posts and failed saves show up in `failures`.
    pub async fn check_selected(&self, selected: &[SelectedLink], posts: &[Post]) -> CheckReport {
        let groups = group_by_post(selected);
        let total: usize = groups.iter().map(|(_, links)| distinct_hrefs(links).len()).sum();

        let mut report = CheckReport {
            total_urls: total,
            ..CheckReport::default()
        };
        let mut checked = 0;

        info!(posts = groups.len(), urls = total, "Starting link check");
        self.emit(RunEvent::Progress { checked, total });

        for (position, (post_id, links)) in groups.iter().enumerate() {
            let post = posts.iter().find(|p| p.id == *post_id);

            let outcome = match post {
                Some(post) => self.check_post(post, links, &mut checked, total).await,
                None => Err(AuditError::UnknownPost(*post_id)),
            };

            match outcome {
                Ok(results) => {
                    report.results.extend(results);
                    self.emit(RunEvent::PostFinished { post_id: *post_id });
                }
                Err(e) => {
                    let title = post.map(|p| p.title.clone()).unwrap_or_default();
                    error!(post_id, title = %title, error = %e, "Link check aborted for post");
                    self.emit(RunEvent::PostFailed {
                        post_id: *post_id,
                        title: title.clone(),
                        message: e.to_string(),
                    });
                    report.failures.push(PostFailure {
                        post_id: *post_id,
                        title,
                        message: e.to_string(),
                    });
                }
            }

            // Polite checking: small delay before the next post
            if position + 1 < groups.len() {
                tokio::time::sleep(self.batch.post_pause()).await;
            }
        }

        report.checked_urls = checked;
        info!(
            checked = report.checked_urls,
            broken = report.broken_count(),
            failed_posts = report.failures.len(),
            "Link check finished"
        );
        report
    }

    /// Checks one link of one post
    pub async fn check_link(&self, post: &Post, link: &Link) -> CheckReport {
        self.check_selected(
            &[SelectedLink::new(post.id, link.clone())],
            std::slice::from_ref(post),
        )
        .await
    }

    /// Rewrites one link (flags, href, status) and saves the post
    pub async fn update_link(&self, post: &Post, original: &Link, updated: &Link) -> Result<Post, AuditError> {
        self.persist(post, &[(original.clone(), updated.clone())]).await
    }

    /// Find/replace on hrefs across posts
    ///
    /// Only posts with at least one matching href are rewritten and saved.
    pub async fn replace_urls(&self, posts: &[Post], find: &str, replace: &str) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for post in posts {
            let affected = self
                .links(post)
                .iter()
                .any(|link| href_matches(&link.href, find));
            if !affected {
                continue;
            }

            let result = self
                .mutator
                .replace_urls(&post.content, find, replace)
                .map_err(|source| AuditError::Rewrite { post_id: post.id, source });
            self.record(post, result, &mut outcome).await;
        }

        info!(find, replace, updated = outcome.updated.len(), "URL replacement finished");
        outcome
    }

    /// Find/replace on the href of a single link
    pub async fn replace_single_url(
        &self,
        post: &Post,
        link_id: &str,
        find: &str,
        replace: &str,
    ) -> Result<Post, AuditError> {
        let content = self
            .mutator
            .replace_single_url(post.id, &post.content, link_id, find, replace)
            .map_err(|source| AuditError::Rewrite { post_id: post.id, source })?;
        self.write_content(post, content).await
    }

    /// Drops every stored status, so external links read as idle again
    pub async fn reset_statuses(&self, posts: &[Post]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for post in posts {
            let result = self
                .mutator
                .clear_all_statuses(post.id, &post.content)
                .map_err(|source| AuditError::Rewrite { post_id: post.id, source });
            self.record(post, result, &mut outcome).await;
        }

        outcome
    }

    async fn check_post(
        &self,
        post: &Post,
        links: &[Link],
        checked: &mut usize,
        total: usize,
    ) -> Result<Vec<LinkResult>, AuditError> {
        let _guard = self
            .locks
            .try_acquire(post.id)
            .ok_or(AuditError::PostBusy(post.id))?;

        let hrefs = distinct_hrefs(links);
        info!(post_id = post.id, links = links.len(), urls = hrefs.len(), "Checking post");
        self.emit(RunEvent::PostStarted {
            post_id: post.id,
            urls: hrefs.len(),
        });

        // Observers see the in-flight state before any probe returns
        let checking: Vec<(Link, Link)> = links
            .iter()
            .map(|link| (link.clone(), link.with_status(LinkStatus::Checking)))
            .collect();
        let mut current = self.persist(post, &checking).await?;

        let mut statuses: HashMap<String, LinkStatus> = HashMap::with_capacity(hrefs.len());
        let mut settled: HashSet<&str> = HashSet::with_capacity(links.len());
        let batches: Vec<&[String]> = hrefs.chunks(self.batch.batch_size.max(1)).collect();

        for (index, batch) in batches.iter().enumerate() {
            let results = self.probe_batch(batch).await;
            *checked += results.len();
            self.emit(RunEvent::Progress {
                checked: *checked,
                total,
            });
            statuses.extend(results);

            // Checkpoint: push every settled href to all of its occurrences
            let mut changes = Vec::new();
            for link in links {
                if settled.contains(link.id.as_str()) {
                    continue;
                }
                if let Some(status) = statuses.get(&link.href) {
                    changes.push((link.with_status(LinkStatus::Checking), link.with_status(*status)));
                    settled.insert(link.id.as_str());
                }
            }
            current = self.persist(&current, &changes).await?;
            debug!(post_id = post.id, batch = index, settled = settled.len(), "Checkpoint saved");
            self.emit(RunEvent::CheckpointSaved { post_id: post.id });

            if index + 1 < batches.len() {
                tokio::time::sleep(self.batch.batch_pause()).await;
            }
        }

        // Reconcile against what was actually saved
        let saved: HashMap<String, LinkStatus> = self
            .links(&current)
            .into_iter()
            .map(|link| (link.id, link.status))
            .collect();
        let missing: Vec<(Link, Link)> = links
            .iter()
            .filter_map(|link| {
                let wanted = *statuses.get(&link.href)?;
                (saved.get(&link.id) != Some(&wanted))
                    .then(|| (link.with_status(LinkStatus::Checking), link.with_status(wanted)))
            })
            .collect();
        if !missing.is_empty() {
            warn!(post_id = post.id, count = missing.len(), "Reconciling statuses missed by checkpoints");
            self.persist(&current, &missing).await?;
        }

        Ok(links
            .iter()
            .map(|link| LinkResult {
                post_id: post.id,
                link_id: link.id.clone(),
                href: link.href.clone(),
                status: statuses.get(&link.href).copied().unwrap_or(LinkStatus::Broken),
            })
            .collect())
    }

    /// Probes one batch of distinct hrefs concurrently
    async fn probe_batch(&self, hrefs: &[String]) -> Vec<(String, LinkStatus)> {
        let futures = hrefs.iter().cloned().map(|href| async move {
            let outcome = AssertUnwindSafe(self.prober.probe(&href)).catch_unwind().await;
            let status = match outcome {
                Ok(LinkStatus::Ok) => LinkStatus::Ok,
                Ok(_) => LinkStatus::Broken,
                Err(_) => {
                    warn!(href = %href, "Probe panicked, marking broken");
                    LinkStatus::Broken
                }
            };
            debug!(href = %href, %status, "Probed");
            (href, status)
        });

        stream::iter(futures)
            .buffer_unordered(hrefs.len().max(1))
            .collect()
            .await
    }

    /// Applies link changes to `current` and saves the result
    async fn persist(&self, current: &Post, changes: &[(Link, Link)]) -> Result<Post, AuditError> {
        let content = self
            .mutator
            .apply_changes(current.id, &current.content, changes)
            .map_err(|source| AuditError::Rewrite {
                post_id: current.id,
                source,
            })?;
        self.write_content(current, content).await
    }

    /// Saves new content; identical content is not written
    async fn write_content(&self, current: &Post, content: String) -> Result<Post, AuditError> {
        if content == current.content {
            return Ok(current.clone());
        }

        self.store
            .write(current.id, &content, current.focus_keyphrase.as_deref())
            .await
            .map_err(|source| AuditError::Persistence {
                post_id: current.id,
                title: current.title.clone(),
                source,
            })
    }

    async fn record(&self, post: &Post, content: Result<String, AuditError>, outcome: &mut BulkOutcome) {
        let saved = match content {
            Ok(content) if content == post.content => return,
            Ok(content) => self.write_content(post, content).await,
            Err(e) => Err(e),
        };

        match saved {
            Ok(saved) => outcome.updated.push(saved),
            Err(e) => {
                error!(post_id = post.id, error = %e, "Post update failed");
                outcome.failures.push(PostFailure {
                    post_id: post.id,
                    title: post.title.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: RunEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver just means nobody is listening
            let _ = events.send(event);
        }
    }
}

/// External links grouped by post, in order of first appearance
fn group_by_post(selected: &[SelectedLink]) -> Vec<(u64, Vec<Link>)> {
    let mut groups: Vec<(u64, Vec<Link>)> = Vec::new();
    let mut positions: HashMap<u64, usize> = HashMap::new();

    for item in selected.iter().filter(|s| s.link.is_external) {
        let position = *positions.entry(item.post_id).or_insert_with(|| {
            groups.push((item.post_id, Vec::new()));
            groups.len() - 1
        });
        let links = &mut groups[position].1;
        // The same link selected twice is still one link
        if !links.iter().any(|l| l.id == item.link.id) {
            links.push(item.link.clone());
        }
    }

    groups
}

/// Distinct hrefs in order of first appearance
fn distinct_hrefs(links: &[Link]) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .iter()
        .filter(|link| seen.insert(link.href.as_str()))
        .map(|link| link.href.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    /// Answers from a fixed table and counts calls per URL
    #[derive(Default, Clone)]
    struct FakeProber {
        broken: Vec<&'static str>,
        calls: Arc<Mutex<HashMap<String, usize>>>,
    }

    impl FakeProber {
        fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    impl Prober for FakeProber {
        async fn probe(&self, url: &str) -> LinkStatus {
            *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
            if url.contains("panic") {
                panic!("probe blew up");
            }
            if self.broken.iter().any(|b| url.contains(b)) {
                LinkStatus::Broken
            } else {
                LinkStatus::Ok
            }
        }
    }

    /// MemoryStore that starts rejecting writes to one post after a few
    #[derive(Clone)]
    struct FlakyStore {
        inner: MemoryStore,
        failing_post: u64,
        allowed_writes: usize,
        writes: Arc<AtomicUsize>,
    }

    impl ContentStore for FlakyStore {
        fn list(&self) -> impl Future<Output = Result<Vec<Post>, StoreError>> + Send {
            self.inner.list()
        }

        fn read(&self, post_id: u64) -> impl Future<Output = Result<Post, StoreError>> + Send {
            self.inner.read(post_id)
        }

        async fn write(
            &self,
            post_id: u64,
            content: &str,
            focus_keyphrase: Option<&str>,
        ) -> Result<Post, StoreError> {
            if post_id == self.failing_post
                && self.writes.fetch_add(1, Ordering::SeqCst) >= self.allowed_writes
            {
                return Err(StoreError::Rejected {
                    post_id,
                    message: "disk full".into(),
                });
            }
            self.inner.write(post_id, content, focus_keyphrase).await
        }
    }

    fn config() -> AuditConfig {
        let mut config = AuditConfig::for_site("https://mysite.com");
        config.batch.batch_pause_ms = 0;
        config.batch.post_pause_ms = 0;
        config
    }

    fn select(auditor: &LinkAuditor<impl ContentStore, impl Prober>, posts: &[Post]) -> Vec<SelectedLink> {
        posts
            .iter()
            .flat_map(|post| {
                auditor
                    .links(post)
                    .into_iter()
                    .map(move |link| SelectedLink::new(post.id, link))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_single_external_link_ends_ok() {
        let post = Post::new(1, "A", r#"<p><a href="https://good.example">t</a></p>"#);
        let store = MemoryStore::new([post.clone()]);
        let auditor = LinkAuditor::new(&config(), store.clone(), FakeProber::default()).unwrap();

        let report = auditor.check_selected(&select(&auditor, &[post.clone()]), &[post]).await;
        assert_eq!(report.ok_count(), 1);
        assert!(report.failures.is_empty());

        let saved = store.read(1).await.unwrap();
        let links = auditor.links(&saved);
        assert_eq!(links[0].status, LinkStatus::Ok);
        assert_eq!(links[0].id, "post-1-link-0");
    }

    #[tokio::test]
    async fn test_duplicate_href_is_probed_once() {
        let post = Post::new(
            5,
            "Dupes",
            r#"<a href="https://x.com">x</a> and again <a href="https://x.com">x</a>"#,
        );
        let store = MemoryStore::new([post.clone()]);
        let prober = FakeProber {
            broken: vec!["x.com"],
            ..FakeProber::default()
        };
        let auditor = LinkAuditor::new(&config(), store.clone(), prober.clone()).unwrap();

        let selected = select(&auditor, &[post.clone()]);
        assert_eq!(selected[0].link.id, "post-5-link-0");
        assert_eq!(selected[1].link.id, "post-5-link-1");

        let report = auditor.check_selected(&selected, &[post]).await;
        assert_eq!(prober.calls("https://x.com"), 1);
        assert_eq!(report.total_urls, 1);
        assert_eq!(report.checked_urls, 1);

        let links = auditor.links(&store.read(5).await.unwrap());
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.status == LinkStatus::Broken));
        assert_ne!(links[0].id, links[1].id);
    }

    #[tokio::test]
    async fn test_entity_spellings_of_one_url_are_checked_once() {
        let post = Post::new(
            10,
            "Query",
            r#"<a href="https://q.com/?a=1&amp;b=2">one</a> <a href="https://q.com/?a=1&b=2">two</a>"#,
        );
        let store = MemoryStore::new([post.clone()]);
        let prober = FakeProber::default();
        let auditor = LinkAuditor::new(&config(), store.clone(), prober.clone()).unwrap();

        let report = auditor.check_selected(&select(&auditor, &[post.clone()]), &[post]).await;
        assert_eq!(report.total_urls, 1);
        assert_eq!(prober.calls("https://q.com/?a=1&b=2"), 1);

        let links = auditor.links(&store.read(10).await.unwrap());
        assert!(links.iter().all(|l| l.status == LinkStatus::Ok));
    }

    #[tokio::test]
    async fn test_internal_links_are_never_probed() {
        let content = r#"<a href="/local">t</a>"#;
        let post = Post::new(2, "Internal", content);
        let store = MemoryStore::new([post.clone()]);
        let prober = FakeProber::default();
        let auditor = LinkAuditor::new(&config(), store.clone(), prober.clone()).unwrap();

        let report = auditor.check_selected(&select(&auditor, &[post.clone()]), &[post]).await;
        assert_eq!(report.total_urls, 0);
        assert!(report.results.is_empty());
        assert_eq!(prober.calls("/local"), 0);
        assert_eq!(store.read(2).await.unwrap().content, content);
    }

    #[tokio::test]
    async fn test_checkpoints_and_progress_events() {
        let post = Post::new(
            3,
            "Many",
            r#"<a href="https://a.com">a</a><a href="https://b.com">b</a><a href="https://c.com">c</a>"#,
        );
        let store = MemoryStore::new([post.clone()]);
        let mut config = config();
        config.batch.batch_size = 2;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let auditor = LinkAuditor::new(&config, store, FakeProber::default())
            .unwrap()
            .with_events(tx);

        auditor.check_selected(&select(&auditor, &[post.clone()]), &[post]).await;
        drop(auditor);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        let progress: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Progress { checked, .. } => Some(*checked),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![0, 2, 3]);

        let checkpoints = events
            .iter()
            .filter(|e| matches!(e, RunEvent::CheckpointSaved { post_id: 3 }))
            .count();
        assert_eq!(checkpoints, 2);
        assert_eq!(events.last(), Some(&RunEvent::PostFinished { post_id: 3 }));
    }

    #[tokio::test]
    async fn test_failed_save_only_aborts_that_post() {
        let post_a = Post::new(1, "Post A", r#"<a href="https://a.com">a</a><a href="https://a2.com">a2</a>"#);
        let post_b = Post::new(2, "Post B", r#"<a href="https://ok.com">ok</a><a href="https://dead.com">dead</a>"#);
        let posts = vec![post_a, post_b];

        // Post A: the `checking` save goes through, the first checkpoint fails
        let store = FlakyStore {
            inner: MemoryStore::new(posts.clone()),
            failing_post: 1,
            allowed_writes: 1,
            writes: Arc::new(AtomicUsize::new(0)),
        };
        let mut config = config();
        config.batch.batch_size = 1;
        let prober = FakeProber {
            broken: vec!["dead.com"],
            ..FakeProber::default()
        };
        let auditor = LinkAuditor::new(&config, store.clone(), prober).unwrap();

        let report = auditor.check_selected(&select(&auditor, &posts), &posts).await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].post_id, 1);
        assert_eq!(report.failures[0].title, "Post A");
        assert!(report.failures[0].message.contains("disk full"));

        let b = auditor.links(&store.inner.read(2).await.unwrap());
        assert_eq!(b[0].status, LinkStatus::Ok);
        assert_eq!(b[1].status, LinkStatus::Broken);

        // Post A is left in its in-flight state
        let a = auditor.links(&store.inner.read(1).await.unwrap());
        assert!(a.iter().all(|l| l.status == LinkStatus::Checking));
    }

    #[tokio::test]
    async fn test_panicking_probe_marks_only_that_url_broken() {
        let post = Post::new(4, "P", r#"<a href="https://panic.example">p</a><a href="https://fine.example">f</a>"#);
        let store = MemoryStore::new([post.clone()]);
        let auditor = LinkAuditor::new(&config(), store.clone(), FakeProber::default()).unwrap();

        let report = auditor.check_selected(&select(&auditor, &[post.clone()]), &[post]).await;
        assert!(report.failures.is_empty());

        let links = auditor.links(&store.read(4).await.unwrap());
        assert_eq!(links[0].status, LinkStatus::Broken);
        assert_eq!(links[1].status, LinkStatus::Ok);
    }

    #[tokio::test]
    async fn test_busy_post_is_reported() {
        let post = Post::new(6, "Busy", r#"<a href="https://x.com">x</a>"#);
        let store = MemoryStore::new([post.clone()]);
        let locks = PostLocks::default();
        let auditor = LinkAuditor::new(&config(), store, FakeProber::default())
            .unwrap()
            .with_locks(locks.clone());

        let _held = locks.try_acquire(6).unwrap();
        let report = auditor.check_selected(&select(&auditor, &[post.clone()]), &[post]).await;
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("already being checked"));
    }

    #[tokio::test]
    async fn test_unknown_post_is_reported() {
        let post = Post::new(7, "Here", r#"<a href="https://x.com">x</a>"#);
        let auditor = LinkAuditor::new(&config(), MemoryStore::default(), FakeProber::default()).unwrap();

        let selected = select(&auditor, &[post]);
        let report = auditor.check_selected(&selected, &[]).await;
        assert_eq!(report.failures[0].post_id, 7);
    }

    #[tokio::test]
    async fn test_replace_urls_only_saves_affected_posts() {
        let posts = vec![
            Post::new(1, "Hit", r#"<a href="https://old.com/page?x=1">a</a>"#),
            Post::new(2, "Miss", r#"<a href="https://old.com.fake">b</a>"#),
        ];
        let store = MemoryStore::new(posts.clone());
        let auditor = LinkAuditor::new(&config(), store.clone(), FakeProber::default()).unwrap();

        let outcome = auditor
            .replace_urls(&posts, "https://old.com", "https://new.com")
            .await;
        assert_eq!(outcome.updated.len(), 1);
        assert!(store.read(1).await.unwrap().content.contains("https://new.com/page?x=1"));
        assert_eq!(store.read(2).await.unwrap().content, posts[1].content);
    }

    #[tokio::test]
    async fn test_reset_returns_external_links_to_idle() {
        let post = Post::new(
            8,
            "Reset",
            r#"<a href="https://x.com" data-link-status="broken">x</a><a href="/in">in</a>"#,
        );
        let store = MemoryStore::new([post.clone()]);
        let auditor = LinkAuditor::new(&config(), store.clone(), FakeProber::default()).unwrap();

        let outcome = auditor.reset_statuses(&[post]).await;
        assert_eq!(outcome.updated.len(), 1);

        let links = auditor.links(&store.read(8).await.unwrap());
        assert_eq!(links[0].status, LinkStatus::Idle);
        assert_eq!(links[1].status, LinkStatus::Ok);
    }

    #[tokio::test]
    async fn test_update_link_toggles_flags() {
        let post = Post::new(9, "Flags", r#"<a href="https://x.com">x</a>"#);
        let store = MemoryStore::new([post.clone()]);
        let auditor = LinkAuditor::new(&config(), store, FakeProber::default()).unwrap();

        let link = auditor.links(&post).remove(0);
        let updated = Link {
            is_nofollow: true,
            is_new_tab: true,
            ..link.clone()
        };
        let saved = auditor.update_link(&post, &link, &updated).await.unwrap();

        let after = auditor.links(&saved).remove(0);
        assert!(after.is_nofollow);
        assert!(after.is_new_tab);
        assert_eq!(after.id, link.id);
    }

    #[test]
    fn test_group_by_post_keeps_order_and_skips_internal() {
        let link = |id: &str, external: bool| Link {
            id: id.into(),
            href: format!("https://{}.com", id),
            anchor_text: id.into(),
            is_external: external,
            is_nofollow: false,
            is_new_tab: false,
            status: LinkStatus::Idle,
        };
        let selected = vec![
            SelectedLink::new(2, link("a", true)),
            SelectedLink::new(1, link("b", true)),
            SelectedLink::new(2, link("c", false)),
            SelectedLink::new(2, link("a", true)),
        ];

        let groups = group_by_post(&selected);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, 2);
        assert_eq!(groups[0].1.len(), 1);
        assert_eq!(groups[1].0, 1);
    }
}
