// src/main.rs
// =============================================================================
// This is the entry point of the link-auditor CLI.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (stderr) and load the engine config
// 3. Dispatch to the appropriate subcommand handler
// 4. Print results (table or JSON) to stdout
// 5. Exit with proper code (0 = success, 1 = broken links, 2 = error)
// =============================================================================

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use link_auditor::audit::{BulkOutcome, PostFailure};
use link_auditor::checker::ProbeResult;
use link_auditor::{
    AuditConfig, CheckReport, ContentStore, HttpProber, JsonFileStore, Link, LinkAuditor,
    LinkExtractor, LinkStatus, Post, RunEvent, SelectedLink,
};

type Auditor = LinkAuditor<JsonFileStore, HttpProber>;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = success
//   Ok(1) = broken links found
//   Ok(2) = some posts could not be processed
//   Err = unexpected error (also exit code 2)
async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.site_url)?;

    match cli.command {
        Commands::Links { store, post, json } => handle_links(&config, &store, post, json).await,
        Commands::Check { store, post, json } => handle_check(&config, &store, &post, json).await,
        Commands::Probe { urls, json } => handle_probe(&config, urls, json).await,
        Commands::Replace {
            store,
            find,
            replace,
            post,
            link_id,
        } => handle_replace(&config, &store, &find, &replace, post, link_id).await,
        Commands::Reset { store, post } => handle_reset(&config, &store, post).await,
        Commands::Set {
            store,
            post,
            link_id,
            nofollow,
            new_tab,
            href,
        } => handle_set(&config, &store, post, &link_id, nofollow, new_tab, href).await,
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "link_auditor=debug" } else { "link_auditor=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>, site_url: Option<String>) -> Result<AuditConfig> {
    let mut config = match path {
        Some(path) => AuditConfig::from_file(path)?,
        None => AuditConfig::default(),
    };
    if let Some(site_url) = site_url {
        config.site_url = site_url;
    }
    config.validate()?;
    Ok(config)
}

fn build_auditor(config: &AuditConfig, store: &Path) -> Result<Auditor> {
    let prober = HttpProber::new(config).context("Failed to set up the link prober")?;
    Ok(LinkAuditor::new(config, JsonFileStore::new(store), prober)?)
}

/// Loads posts, keeping only `only` when it is non-empty
async fn load_posts(store: &Path, only: &[u64]) -> Result<Vec<Post>> {
    let posts = JsonFileStore::new(store)
        .list()
        .await
        .with_context(|| format!("Failed to load posts from {}", store.display()))?;

    if only.is_empty() {
        return Ok(posts);
    }

    for id in only {
        if !posts.iter().any(|p| p.id == *id) {
            bail!("Post {} not found in {}", id, store.display());
        }
    }
    Ok(posts.into_iter().filter(|p| only.contains(&p.id)).collect())
}

// Handles the 'links' subcommand
async fn handle_links(config: &AuditConfig, store: &Path, post: Option<u64>, json: bool) -> Result<i32> {
    let posts = load_posts(store, post.as_slice()).await?;
    let extractor = LinkExtractor::new(config)?;

    let links: Vec<SelectedLink> = posts
        .iter()
        .flat_map(|post| {
            extractor
                .extract(&post.content, post.id)
                .into_iter()
                .map(move |link| SelectedLink::new(post.id, link))
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&links)?);
        return Ok(0);
    }

    println!("🔗 {} link(s) in {} post(s)\n", links.len(), posts.len());
    println!("{:<8} {:<24} {:<14} {:<9} {:<50}", "POST", "ID", "STATUS", "KIND", "URL");
    println!("{}", "=".repeat(108));
    for item in &links {
        let kind = if item.link.is_external { "external" } else { "internal" };
        println!(
            "{:<8} {:<24} {:<14} {:<9} {:<50}",
            item.post_id,
            truncate(&item.link.id, 24),
            format_status(item.link.status),
            kind,
            truncate(&item.link.href, 50)
        );
    }

    Ok(0)
}

// Handles the 'check' subcommand
async fn handle_check(config: &AuditConfig, store: &Path, only: &[u64], json: bool) -> Result<i32> {
    let posts = load_posts(store, only).await?;
    let (tx, rx) = mpsc::unbounded_channel();
    let auditor = build_auditor(config, store)?.with_events(tx);

    let selected: Vec<SelectedLink> = posts
        .iter()
        .flat_map(|post| {
            auditor
                .links(post)
                .into_iter()
                .filter(|link| link.is_external)
                .map(move |link| SelectedLink::new(post.id, link))
        })
        .collect();

    if selected.is_empty() {
        if json {
            println!("{}", serde_json::to_string_pretty(&CheckReport::default())?);
        } else {
            println!("✅ No external links found to check");
        }
        return Ok(0);
    }

    // Progress goes to stdout only in table mode so JSON stays parseable
    let printer = tokio::spawn(print_events(rx, !json));

    let report = auditor.check_selected(&selected, &posts).await;
    // Dropping the auditor closes the event channel, which ends the printer
    drop(auditor);
    printer.await.context("Progress printer crashed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(exit_code(report.broken_count(), &report.failures))
}

// Handles the 'probe' subcommand
async fn handle_probe(config: &AuditConfig, urls: Vec<String>, json: bool) -> Result<i32> {
    let prober = HttpProber::new(config).context("Failed to set up the link prober")?;

    if !json {
        println!("🌐 Probing {} URL(s)...\n", urls.len());
    }
    let results = prober.check_urls(urls, config.batch.batch_size).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_probe_table(&results);
    }

    let broken = results.iter().filter(|r| !r.is_ok()).count();
    Ok(if broken > 0 { 1 } else { 0 })
}

// Handles the 'replace' subcommand
async fn handle_replace(
    config: &AuditConfig,
    store: &Path,
    find: &str,
    replace: &str,
    post: Option<u64>,
    link_id: Option<String>,
) -> Result<i32> {
    let posts = load_posts(store, post.as_slice()).await?;
    let auditor = build_auditor(config, store)?;

    let outcome = match (link_id, posts.first()) {
        (Some(link_id), Some(post)) => {
            let saved = auditor
                .replace_single_url(post, &link_id, find, replace)
                .await?;
            BulkOutcome {
                updated: vec![saved],
                failures: Vec::new(),
            }
        }
        _ => auditor.replace_urls(&posts, find, replace).await,
    };

    println!("🔁 Replaced '{}' with '{}'", find, replace);
    Ok(print_bulk(&outcome))
}

// Handles the 'reset' subcommand
async fn handle_reset(config: &AuditConfig, store: &Path, post: Option<u64>) -> Result<i32> {
    let posts = load_posts(store, post.as_slice()).await?;
    let auditor = build_auditor(config, store)?;

    let outcome = auditor.reset_statuses(&posts).await;

    println!("🧹 Cleared link statuses");
    Ok(print_bulk(&outcome))
}

// Handles the 'set' subcommand
async fn handle_set(
    config: &AuditConfig,
    store: &Path,
    post_id: u64,
    link_id: &str,
    nofollow: Option<bool>,
    new_tab: Option<bool>,
    href: Option<String>,
) -> Result<i32> {
    let posts = load_posts(store, &[post_id]).await?;
    let post = posts
        .first()
        .with_context(|| format!("Post {} not found", post_id))?;
    let auditor = build_auditor(config, store)?;

    let original = auditor
        .links(post)
        .into_iter()
        .find(|link| link.id == link_id)
        .with_context(|| format!("Link '{}' not found in post {}", link_id, post_id))?;

    let updated = Link {
        href: href.unwrap_or_else(|| original.href.clone()),
        is_nofollow: nofollow.unwrap_or(original.is_nofollow),
        is_new_tab: new_tab.unwrap_or(original.is_new_tab),
        ..original.clone()
    };

    let saved = auditor.update_link(post, &original, &updated).await?;
    let after = auditor
        .links(&saved)
        .into_iter()
        .find(|link| link.id == link_id)
        .unwrap_or(updated);

    println!(
        "✏️  {} -> {} (nofollow: {}, new tab: {})",
        after.id, after.href, after.is_nofollow, after.is_new_tab
    );
    Ok(0)
}

/// Prints run events as they arrive
async fn print_events(mut rx: mpsc::UnboundedReceiver<RunEvent>, show: bool) {
    while let Some(event) = rx.recv().await {
        if !show {
            continue;
        }
        match event {
            RunEvent::PostStarted { post_id, urls } => {
                println!("📄 Post {}: checking {} unique URL(s)", post_id, urls)
            }
            RunEvent::Progress { checked, total } if checked > 0 => {
                println!("   {}/{} URL(s) checked", checked, total)
            }
            RunEvent::PostFailed { post_id, title, message } => {
                println!("⚠️  Post {} ({}) skipped: {}", post_id, title, message)
            }
            _ => {}
        }
    }
}

fn print_report(report: &CheckReport) {
    println!();
    println!("{:<8} {:<24} {:<60} {:<15}", "POST", "ID", "URL", "STATUS");
    println!("{}", "=".repeat(110));

    for result in &report.results {
        println!(
            "{:<8} {:<24} {:<60} {:<15}",
            result.post_id,
            truncate(&result.link_id, 24),
            truncate(&result.href, 60),
            format_status(result.status)
        );
    }

    println!();
    println!("📊 Summary:");
    println!("   ✅ OK: {}", report.ok_count());
    println!("   ❌ Broken: {}", report.broken_count());
    println!("   📋 Unique URLs checked: {}/{}", report.checked_urls, report.total_urls);
    print_failures(&report.failures);
}

fn print_probe_table(results: &[ProbeResult]) {
    println!("{:<60} {:<15}", "URL", "STATUS");
    println!("{}", "=".repeat(75));

    for result in results {
        println!("{:<60} {:<15}", truncate(&result.url, 60), format_status(result.status));
    }

    let ok_count = results.iter().filter(|r| r.is_ok()).count();
    println!();
    println!("📊 Summary:");
    println!("   ✅ OK: {}", ok_count);
    println!("   ❌ Broken: {}", results.len() - ok_count);
    println!("   📋 Total: {}", results.len());
}

fn print_bulk(outcome: &BulkOutcome) -> i32 {
    for post in &outcome.updated {
        println!("   💾 Post {} ({}) saved", post.id, post.title);
    }
    println!("📋 {} post(s) updated", outcome.updated.len());
    print_failures(&outcome.failures);
    exit_code(0, &outcome.failures)
}

fn print_failures(failures: &[PostFailure]) {
    if failures.is_empty() {
        return;
    }
    println!("⚠️  {} post(s) failed:", failures.len());
    for failure in failures {
        println!("   Post {} ({}): {}", failure.post_id, failure.title, failure.message);
    }
}

fn exit_code(broken: usize, failures: &[PostFailure]) -> i32 {
    if !failures.is_empty() {
        2
    } else if broken > 0 {
        1
    } else {
        0
    }
}

fn format_status(status: LinkStatus) -> &'static str {
    match status {
        LinkStatus::Idle => "⚪ IDLE",
        LinkStatus::Checking => "⏳ CHECKING",
        LinkStatus::Ok => "✅ OK",
        LinkStatus::Broken => "❌ BROKEN",
    }
}

/// Shortens `text` to `width` characters for table display
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let head: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", head)
}
