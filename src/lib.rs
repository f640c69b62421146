// src/lib.rs
// =============================================================================
// link-auditor: audits the hyperlinks embedded in blog post HTML.
//
// Layers, leaves first:
// - links:   extract links from HTML and rewrite their attributes in place
// - checker: decide whether one URL is reachable (waterfall of strategies)
// - store:   where post content lives (JSON file or memory)
// - audit:   batch orchestration across many posts, with checkpoints
//
// The binary in src/main.rs is a thin CLI on top of these modules.
// =============================================================================

pub mod audit;
pub mod checker;
pub mod config;
pub mod error;
pub mod links;
pub mod store;

pub use audit::{CheckReport, LinkAuditor, RunEvent, SelectedLink};
pub use checker::{HttpProber, Prober};
pub use config::AuditConfig;
pub use error::{AuditError, RewriteError, StoreError};
pub use links::{ContentMutator, Link, LinkExtractor, LinkStatus};
pub use store::{ContentStore, JsonFileStore, MemoryStore, Post};
