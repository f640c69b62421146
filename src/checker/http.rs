// src/checker/http.rs
// =============================================================================
// This module decides whether a URL is reachable.
//
// Key functionality:
// - Same-site URLs are ok without touching the network
// - A waterfall of strategies, each tried only when the previous one got
//   no response at all:
//     1. HEAD with certificate verification
//     2. GET (reading at most max_body_bytes) with certificate verification
//     3. HEAD then GET with certificate verification disabled
//     4. Raw socket HEAD then GET (see raw.rs)
// - A 200-399 answer is ok. A 400-599 answer to HEAD is retried with GET,
//   and GET decides (the HEAD verdict stands if GET gets no answer)
// - No response from any stage means broken
//
// Nothing here is shared mutably, so one HttpProber can serve many
// concurrent probes.
//
// Rust concepts:
// - Traits: Prober lets the batch runner work with a fake in tests
// - async/await: For concurrent network I/O
// - Streams: For probing many URLs with a concurrency limit
// =============================================================================

use futures::stream::{self, StreamExt}; // StreamExt gives us .buffer_unordered()
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::debug;
use url::Url;

use super::raw::RawProber;
use crate::config::{AuditConfig, ProbePolicy};
use crate::error::AuditError;
use crate::links::{LinkStatus, SiteOrigin};

/// Anything that can settle a URL as ok or broken
///
/// Implementations must return `Ok` or `Broken`; the batch runner treats
/// any other value as `Broken`.
pub trait Prober {
    fn probe(&self, url: &str) -> impl Future<Output = LinkStatus> + Send;
}

/// Result of one stage of the waterfall
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StageOutcome {
    /// The server answered with a status code
    Status(u16),
    /// The server sent bytes but no parsable status line
    Reachable,
    /// Nothing came back (timeout, DNS, TLS, refused, ...)
    NoResponse(String),
}

impl StageOutcome {
    /// The verdict of this stage, or None to move on to the next one
    pub(crate) fn verdict(&self) -> Option<LinkStatus> {
        match self {
            StageOutcome::Status(code) if (400..600).contains(code) => Some(LinkStatus::Broken),
            // 2xx/3xx, and anything exotic: the server is there
            StageOutcome::Status(_) | StageOutcome::Reachable => Some(LinkStatus::Ok),
            StageOutcome::NoResponse(_) => None,
        }
    }
}

/// Result of probing one URL, for reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub url: String,
    pub status: LinkStatus,
}

impl ProbeResult {
    pub fn is_ok(&self) -> bool {
        self.status == LinkStatus::Ok
    }
}

/// The production prober
#[derive(Debug, Clone)]
pub struct HttpProber {
    site: SiteOrigin,
    verified: Client,
    insecure: Client,
    raw: RawProber,
    max_body_bytes: usize,
}

impl HttpProber {
    pub fn new(config: &AuditConfig) -> Result<Self, AuditError> {
        Ok(Self {
            site: SiteOrigin::parse(&config.site_url)?,
            verified: build_client(&config.probe, false)?,
            insecure: build_client(&config.probe, true)?,
            raw: RawProber::new(&config.probe),
            max_body_bytes: config.probe.max_body_bytes,
        })
    }

    /// Runs the full waterfall for one URL
    pub async fn check(&self, url: &str) -> LinkStatus {
        let url = url.trim();

        let parsed = match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
            _ => {
                debug!(url, "Not an http(s) URL, marking broken");
                return LinkStatus::Broken;
            }
        };

        if self.site.is_same_host(&parsed) {
            return LinkStatus::Ok;
        }

        for (label, client) in [("verified", &self.verified), ("insecure", &self.insecure)] {
            let outcome = head(client, url).await;
            let head_verdict = outcome.verdict();
            if head_verdict == Some(LinkStatus::Ok) {
                debug!(url, stage = label, method = "HEAD", ?outcome, "Probe settled");
                return LinkStatus::Ok;
            }
            // Servers that reject or mishandle HEAD get asked again with GET
            debug!(url, stage = label, method = "HEAD", ?outcome, "HEAD failed, trying GET");

            let outcome = get(client, url, self.max_body_bytes).await;
            if let Some(status) = outcome.verdict().or(head_verdict) {
                debug!(url, stage = label, method = "GET", ?outcome, "Probe settled");
                return status;
            }
            debug!(url, stage = label, method = "GET", ?outcome, "No response, falling back");
        }

        let outcome = self.raw.probe(&parsed).await;
        debug!(url, stage = "raw", ?outcome, "Last resort probe finished");
        outcome.verdict().unwrap_or(LinkStatus::Broken)
    }

    /// Probes many URLs concurrently
    ///
    /// Results come back in completion order, not input order.
    pub async fn check_urls(&self, urls: Vec<String>, concurrency: usize) -> Vec<ProbeResult> {
        // Create a stream of futures
        // Each future represents probing one URL
        let futures = urls.into_iter().map(|url| async move {
            let status = self.check(&url).await;
            ProbeResult { url, status }
        });

        // Run up to `concurrency` at once, collecting as they finish
        stream::iter(futures)
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }
}

impl Prober for HttpProber {
    fn probe(&self, url: &str) -> impl Future<Output = LinkStatus> + Send {
        let url = url.to_string();
        async move { self.check(&url).await }
    }
}

/// Builds a reqwest client with the shared network policy
fn build_client(policy: &ProbePolicy, accept_invalid_certs: bool) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );

    Client::builder()
        .timeout(policy.timeout())
        .redirect(reqwest::redirect::Policy::limited(policy.max_redirects))
        .user_agent(policy.user_agent.as_str())
        .default_headers(headers)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
}

async fn head(client: &Client, url: &str) -> StageOutcome {
    match client.head(url).send().await {
        Ok(response) => StageOutcome::Status(response.status().as_u16()),
        Err(e) => StageOutcome::NoResponse(describe_error(&e)),
    }
}

async fn get(client: &Client, url: &str, max_body_bytes: usize) -> StageOutcome {
    match client.get(url).send().await {
        Ok(mut response) => {
            let status = response.status().as_u16();

            // Read a little of the body and drop the rest
            let mut read = 0;
            while read < max_body_bytes {
                match response.chunk().await {
                    Ok(Some(chunk)) => read += chunk.len(),
                    _ => break,
                }
            }

            StageOutcome::Status(status)
        }
        Err(e) => StageOutcome::NoResponse(describe_error(&e)),
    }
}

/// Short reason for the debug log
fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_redirect() {
        "too many redirects".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why HEAD first?
//    - HEAD asks for headers only, no body download
//    - Some servers mishandle HEAD (drop it, hang, answer 405), which is
//      what the GET stage is for
//
// 2. Why retry without certificate checks?
//    - We only want to know whether something answers at that address
//    - A self-signed or expired certificate still means the page is there
//
// 3. What is `impl Future<Output = ...> + Send` in the trait?
//    - The trait method returns "some future" without boxing it
//    - `+ Send` lets callers move the probe onto other tasks if they want
// -----------------------------------------------------------------------------
