// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Every command that touches posts takes the path of a JSON post store:
//
//   [ { "id": 1, "title": "Hello", "content": "<p>...</p>" }, ... ]
//
// Global flags (--config, --site-url, -v) may appear before or after the
// subcommand.
// =============================================================================

use clap::{Parser, Subcommand};
use std::path::PathBuf;

// #[derive(Parser)] tells clap to generate the parsing code for us
#[derive(Parser, Debug)]
#[command(
    name = "link-auditor",
    version,
    about = "Audit, check and repair the links inside blog post HTML",
    long_about = "link-auditor lists the links embedded in post content, checks external ones \
                  for reachability in polite batches, and records each link's status and flags \
                  directly on the anchor tags so the content stays the single source of truth."
)]
pub struct Cli {
    /// JSON file with engine settings (attribute names, timeouts, batching)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The site's own URL; links to other hosts count as external
    ///
    /// Overrides `site_url` from --config.
    #[arg(long, global = true)]
    pub site_url: Option<String>,

    /// Log debug details to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the links of one post, or of every post
    ///
    /// Example: link-auditor links posts.json --post 42
    Links {
        /// Path to the JSON post store
        store: PathBuf,

        /// Only list links of this post
        #[arg(long)]
        post: Option<u64>,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check external links and record their status in the content
    ///
    /// Example: link-auditor check posts.json --post 1 --post 7
    Check {
        /// Path to the JSON post store
        store: PathBuf,

        /// Only check these posts (repeatable; default: all posts)
        #[arg(long)]
        post: Vec<u64>,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Probe URLs without touching any content
    ///
    /// Example: link-auditor probe https://example.com https://example.org
    Probe {
        /// One or more URLs to probe
        #[arg(required = true)]
        urls: Vec<String>,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Replace an href prefix across posts, or on one link
    ///
    /// Example: link-auditor replace posts.json --find http://old.com --replace https://new.com
    Replace {
        /// Path to the JSON post store
        store: PathBuf,

        /// Prefix to look for
        #[arg(long)]
        find: String,

        /// Replacement prefix
        #[arg(long)]
        replace: String,

        /// Restrict to one post
        #[arg(long)]
        post: Option<u64>,

        /// Restrict to one link (requires --post)
        #[arg(long, requires = "post")]
        link_id: Option<String>,
    },

    /// Clear every recorded link status
    Reset {
        /// Path to the JSON post store
        store: PathBuf,

        /// Only reset this post
        #[arg(long)]
        post: Option<u64>,
    },

    /// Change the flags or href of one link
    ///
    /// Example: link-auditor set posts.json --post 1 --link-id post-1-link-0 --nofollow true
    Set {
        /// Path to the JSON post store
        store: PathBuf,

        #[arg(long)]
        post: u64,

        #[arg(long)]
        link_id: String,

        /// Add or remove rel="nofollow"
        #[arg(long)]
        nofollow: Option<bool>,

        /// Open in a new tab (target="_blank")
        #[arg(long)]
        new_tab: Option<bool>,

        /// New href
        #[arg(long)]
        href: Option<String>,
    },
}
