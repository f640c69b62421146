// src/links/site.rs
// =============================================================================
// Internal vs external classification.
//
// A link is external when, resolved against the site URL, it points at a
// different hostname. Hrefs that resolve to no host at all (mailto:, tel:,
// javascript:, garbage) count as external unless the raw text starts with
// "/", "#" or the site origin itself.
// =============================================================================

use url::Url;

use crate::error::AuditError;

/// The site that owns the audited posts
#[derive(Debug, Clone)]
pub struct SiteOrigin {
    base: Url,
    raw: String,
    host: String,
}

impl SiteOrigin {
    pub fn parse(site_url: &str) -> Result<Self, AuditError> {
        let base = Url::parse(site_url)
            .map_err(|e| AuditError::Config(format!("site_url '{}': {}", site_url, e)))?;
        let host = base
            .host_str()
            .ok_or_else(|| AuditError::Config(format!("site_url '{}' has no host", site_url)))?
            .to_string();

        Ok(Self {
            base,
            raw: site_url.trim_end_matches('/').to_string(),
            host,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Decides whether an href leaves the site
    pub fn is_external(&self, href: &str) -> bool {
        match self.base.join(href.trim()) {
            Ok(url) => match url.host_str() {
                Some(host) => host != self.host,
                None => !self.looks_local(href),
            },
            Err(_) => !self.looks_local(href),
        }
    }

    /// True when an absolute URL is served by this site
    pub fn is_same_host(&self, url: &Url) -> bool {
        url.host_str() == Some(self.host.as_str())
    }

    fn looks_local(&self, href: &str) -> bool {
        href.starts_with('/') || href.starts_with('#') || href.starts_with(&self.raw)
    }
}
