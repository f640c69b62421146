// src/links/extract.rs
// =============================================================================
// This module turns a post's HTML into an ordered list of Link records.
//
// What happens for each <a> element, in document order:
// 1. Resolve its identity (stored attribute or post-{id}-link-{index})
// 2. Classify it as internal or external against the site URL
// 3. Read the nofollow / new-tab flags
// 4. Read the stored status, or default it (idle external, ok internal)
//
// Extraction has no side effects. Synthesized identities are only written
// back when the mutator touches the anchor.
// =============================================================================

use tracing::warn;

use super::html::{resolve_identities, scan_anchors, RawAnchor};
use super::model::{Link, LinkStatus};
use super::site::SiteOrigin;
use crate::config::{AuditConfig, ContentAttributes};
use crate::error::AuditError;

/// Parses post content into links
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    site: SiteOrigin,
    attributes: ContentAttributes,
}

impl LinkExtractor {
    pub fn new(config: &AuditConfig) -> Result<Self, AuditError> {
        Ok(Self {
            site: SiteOrigin::parse(&config.site_url)?,
            attributes: config.attributes.clone(),
        })
    }

    pub fn site(&self) -> &SiteOrigin {
        &self.site
    }

    /// Extracts every anchor of `content` as a Link
    ///
    /// Content the HTML rewriter cannot handle yields an empty list.
    pub fn extract(&self, content: &str, post_id: u64) -> Vec<Link> {
        let anchors = match scan_anchors(
            content,
            &self.attributes.id_attribute,
            &self.attributes.status_attribute,
        ) {
            Ok(anchors) => anchors,
            Err(e) => {
                warn!(post_id, error = %e, "Could not parse post content, no links extracted");
                return Vec::new();
            }
        };

        let ids = resolve_identities(&anchors, post_id);

        anchors
            .iter()
            .zip(ids)
            .map(|(anchor, id)| self.to_link(anchor, id))
            .collect()
    }

    fn to_link(&self, anchor: &RawAnchor, id: String) -> Link {
        let is_external = self.site.is_external(&anchor.href);

        // A stored status wins if it is one of the four known values
        let status = anchor
            .status
            .as_deref()
            .and_then(|s| s.parse::<LinkStatus>().ok())
            .unwrap_or(if is_external {
                LinkStatus::Idle
            } else {
                LinkStatus::Ok
            });

        Link {
            id,
            href: anchor.href.clone(),
            anchor_text: anchor.text.clone(),
            is_external,
            is_nofollow: has_rel_token(anchor.rel.as_deref(), "nofollow"),
            is_new_tab: anchor.target.as_deref() == Some("_blank"),
            status,
        }
    }
}

/// True if the space-separated `rel` value contains `token`
pub(crate) fn has_rel_token(rel: Option<&str>, token: &str) -> bool {
    rel.map(|rel| rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case(token)))
        .unwrap_or(false)
}
