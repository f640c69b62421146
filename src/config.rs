// src/config.rs
// =============================================================================
// Explicit configuration for the engine.
//
// Everything the engine needs to know about its surroundings travels in one
// AuditConfig value:
// - which site the content belongs to (decides internal vs external links)
// - the names of the two attributes persisted on anchors
// - the network policy of the prober
// - the pacing of batch runs
//
// Every field has a default, so a config file only needs the keys it changes:
//
//   { "site_url": "https://mysite.com", "batch": { "batch_size": 5 } }
// =============================================================================

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::AuditError;

/// A desktop Chrome user agent; some hosts reject obvious bots
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Origin of the site that owns the posts, e.g. "https://mysite.com"
    pub site_url: String,
    pub attributes: ContentAttributes,
    pub probe: ProbePolicy,
    pub batch: BatchPolicy,
}

/// Names of the custom attributes stored on every tracked anchor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentAttributes {
    pub id_attribute: String,
    pub status_attribute: String,
}

/// Network policy shared by every probe stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbePolicy {
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: String,
    /// Upper bound on body bytes read by the GET and raw stages
    pub max_body_bytes: usize,
}

/// How a batch run paces itself
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchPolicy {
    /// Distinct URLs probed concurrently per batch
    pub batch_size: usize,
    pub batch_pause_ms: u64,
    pub post_pause_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            site_url: "http://localhost".to_string(),
            attributes: ContentAttributes::default(),
            probe: ProbePolicy::default(),
            batch: BatchPolicy::default(),
        }
    }
}

impl Default for ContentAttributes {
    fn default() -> Self {
        Self {
            id_attribute: "data-link-id".to_string(),
            status_attribute: "data-link-status".to_string(),
        }
    }
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_redirects: 5,
            user_agent: BROWSER_USER_AGENT.to_string(),
            max_body_bytes: 1024,
        }
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_pause_ms: 100,
            post_pause_ms: 200,
        }
    }
}

impl ProbePolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BatchPolicy {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn post_pause(&self) -> Duration {
        Duration::from_millis(self.post_pause_ms)
    }
}

impl AuditConfig {
    /// Config for a given site with every other field defaulted
    pub fn for_site(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            ..Self::default()
        }
    }

    /// Reads a JSON config file
    pub fn from_file(path: &Path) -> Result<Self, AuditError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AuditError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: AuditConfig = serde_json::from_str(&raw)
            .map_err(|e| AuditError::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot work with
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.batch.batch_size == 0 {
            return Err(AuditError::Config("batch_size must be at least 1".into()));
        }
        if self.probe.timeout_secs == 0 {
            return Err(AuditError::Config("timeout_secs must be at least 1".into()));
        }
        if self.attributes.id_attribute.is_empty() || self.attributes.status_attribute.is_empty() {
            return Err(AuditError::Config("attribute names must not be empty".into()));
        }
        if self.attributes.id_attribute == self.attributes.status_attribute {
            return Err(AuditError::Config(
                "identity and status attributes must differ".into(),
            ));
        }
        url::Url::parse(&self.site_url)
            .map_err(|e| AuditError::Config(format!("site_url '{}': {}", self.site_url, e)))?;
        Ok(())
    }
}
