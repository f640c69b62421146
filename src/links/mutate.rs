// src/links/mutate.rs
// =============================================================================
// This module writes link changes back into post HTML.
//
// Every operation follows the same two steps:
// 1. Scan the content and resolve anchor identities (same rules as extract)
// 2. Build per-anchor attribute patches and apply them in one rewrite pass
//
// Anchors without a patch are passed through byte for byte, and a patch only
// contains attributes whose value actually changes. Applying the same update
// twice therefore leaves the content identical the second time.
//
// Matching an anchor for a Link:
// - by identity first (stored attribute or the synthesized positional id)
// - failing that, by exact (href, anchor text) among anchors that carry no
//   identity yet, preferring the position encoded in the link id. The match
//   is stamped with the link's identity, so the next lookup is by id.
// =============================================================================

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::html::{
    apply_patches, resolve_identities, scan_anchors, synthesized_index, AnchorPatch, RawAnchor,
};
use super::model::Link;
use crate::config::{AuditConfig, ContentAttributes};
use crate::error::RewriteError;

/// rel tokens owned by the auditor; any other token is left alone
const MANAGED_REL_TOKENS: [&str; 4] = ["nofollow", "external", "noopener", "noreferrer"];

/// Applies link changes to post content
#[derive(Debug, Clone)]
pub struct ContentMutator {
    attributes: ContentAttributes,
}

impl ContentMutator {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            attributes: config.attributes.clone(),
        }
    }

    /// Rewrites the anchor identified by `original` to match `updated`
    pub fn mutate(
        &self,
        post_id: u64,
        content: &str,
        original: &Link,
        updated: &Link,
    ) -> Result<String, RewriteError> {
        self.apply_changes(post_id, content, &[(original.clone(), updated.clone())])
    }

    /// Batch form of `mutate`: one scan and one rewrite for many links
    ///
    /// Fallback matches never claim the same anchor twice. When two changes
    /// hit the same anchor the later one wins.
    pub fn apply_changes(
        &self,
        post_id: u64,
        content: &str,
        changes: &[(Link, Link)],
    ) -> Result<String, RewriteError> {
        if changes.is_empty() {
            return Ok(content.to_string());
        }

        let anchors = self.scan(content)?;
        let ids = resolve_identities(&anchors, post_id);

        let mut by_id: HashMap<&str, usize> = HashMap::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            by_id.insert(id.as_str(), index);
        }

        let mut stamped: HashSet<usize> = HashSet::new();
        let mut patches: HashMap<usize, AnchorPatch> = HashMap::new();

        for (original, updated) in changes {
            let index = match by_id.get(original.id.as_str()) {
                Some(&index) => index,
                None => match fallback_match(&anchors, &ids, original, &stamped) {
                    Some(index) => {
                        debug!(
                            post_id,
                            link_id = %original.id,
                            index,
                            "Matched anchor by href and text, stamping identity"
                        );
                        stamped.insert(index);
                        index
                    }
                    None => {
                        warn!(
                            post_id,
                            link_id = %original.id,
                            href = %original.href,
                            "No anchor matches link, change skipped"
                        );
                        continue;
                    }
                },
            };

            let patch = self.diff(&anchors[index], original, updated);
            patches.insert(index, patch);
        }

        apply_patches(content, &patches)
    }

    /// Rewrites every href equal to `find` or extending it past a URL boundary
    pub fn replace_urls(&self, content: &str, find: &str, replace: &str) -> Result<String, RewriteError> {
        let anchors = self.scan(content)?;

        let patches: HashMap<usize, AnchorPatch> = anchors
            .iter()
            .filter_map(|anchor| {
                replace_prefix(&anchor.href, find, replace).map(|href| (anchor.index, href_patch(href)))
            })
            .collect();

        apply_patches(content, &patches)
    }

    /// Same boundary rule as `replace_urls`, restricted to one anchor
    pub fn replace_single_url(
        &self,
        post_id: u64,
        content: &str,
        link_id: &str,
        find: &str,
        replace: &str,
    ) -> Result<String, RewriteError> {
        let anchors = self.scan(content)?;
        let ids = resolve_identities(&anchors, post_id);

        let mut patches = HashMap::new();
        if let Some(index) = ids.iter().position(|id| id == link_id) {
            if let Some(href) = replace_prefix(&anchors[index].href, find, replace) {
                patches.insert(index, href_patch(href));
            }
        }

        apply_patches(content, &patches)
    }

    /// Drops every stored status and makes sure every anchor has an identity
    pub fn clear_all_statuses(&self, post_id: u64, content: &str) -> Result<String, RewriteError> {
        let anchors = self.scan(content)?;
        let ids = resolve_identities(&anchors, post_id);

        let patches: HashMap<usize, AnchorPatch> = anchors
            .iter()
            .zip(&ids)
            .map(|(anchor, id)| {
                let mut patch = AnchorPatch::default();
                if anchor.status.is_some() {
                    patch.remove.push(self.attributes.status_attribute.clone());
                }
                if anchor.id.as_deref() != Some(id.as_str()) {
                    patch.set.push((self.attributes.id_attribute.clone(), id.clone()));
                }
                (anchor.index, patch)
            })
            .collect();

        apply_patches(content, &patches)
    }

    fn scan(&self, content: &str) -> Result<Vec<RawAnchor>, RewriteError> {
        scan_anchors(
            content,
            &self.attributes.id_attribute,
            &self.attributes.status_attribute,
        )
    }

    /// Attribute edits that bring `anchor` in line with `updated`
    fn diff(&self, anchor: &RawAnchor, original: &Link, updated: &Link) -> AnchorPatch {
        let mut patch = AnchorPatch::default();

        if !updated.href.is_empty() && updated.href != original.href && updated.href != anchor.href {
            patch.set.push(("href".to_string(), updated.href.clone()));
        }

        if updated.is_new_tab {
            if anchor.target.as_deref() != Some("_blank") {
                patch.set.push(("target".to_string(), "_blank".to_string()));
            }
        } else if anchor.target.is_some() {
            patch.remove.push("target".to_string());
        }

        match (build_rel(anchor.rel.as_deref(), updated), anchor.rel.as_deref()) {
            (Some(rel), current) if current != Some(rel.as_str()) => {
                patch.set.push(("rel".to_string(), rel));
            }
            (None, Some(_)) => patch.remove.push("rel".to_string()),
            _ => {}
        }

        let status = updated.status.as_str();
        if anchor.status.as_deref() != Some(status) {
            patch
                .set
                .push((self.attributes.status_attribute.clone(), status.to_string()));
        }

        if anchor.id.as_deref() != Some(original.id.as_str()) {
            patch
                .set
                .push((self.attributes.id_attribute.clone(), original.id.clone()));
        }

        patch
    }
}

/// Finds an unidentified anchor with the link's exact href and text
fn fallback_match(
    anchors: &[RawAnchor],
    ids: &[String],
    link: &Link,
    taken: &HashSet<usize>,
) -> Option<usize> {
    let candidates: Vec<usize> = anchors
        .iter()
        .filter(|a| {
            a.id.as_deref() != Some(ids[a.index].as_str())
                && !taken.contains(&a.index)
                && a.href == link.href
                && a.text == link.anchor_text
        })
        .map(|a| a.index)
        .collect();

    synthesized_index(&link.id)
        .filter(|wanted| candidates.contains(wanted))
        .or_else(|| candidates.first().copied())
}

/// New rel value, or None when the attribute should disappear
fn build_rel(current: Option<&str>, updated: &Link) -> Option<String> {
    let mut tokens: Vec<&str> = current
        .unwrap_or("")
        .split_ascii_whitespace()
        .filter(|t| !MANAGED_REL_TOKENS.iter().any(|m| t.eq_ignore_ascii_case(m)))
        .collect();

    if updated.is_nofollow {
        tokens.push("nofollow");
    }
    if updated.is_external {
        tokens.push("external");
        if updated.is_new_tab {
            tokens.push("noopener");
            tokens.push("noreferrer");
        }
    }

    let mut seen = HashSet::new();
    tokens.retain(|t| seen.insert(*t));

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

/// Replacement href when `href` equals `find` or continues it with / ? or #
///
/// The boundary check keeps `https://a.com` from matching
/// `https://a.com.evil.com`.
pub(crate) fn replace_prefix(href: &str, find: &str, replace: &str) -> Option<String> {
    if find.is_empty() {
        return None;
    }
    let rest = href.strip_prefix(find)?;
    if rest.is_empty() || rest.starts_with(['/', '?', '#']) {
        Some(format!("{}{}", replace, rest))
    } else {
        None
    }
}

fn href_patch(href: String) -> AnchorPatch {
    AnchorPatch {
        set: vec![("href".to_string(), href)],
        remove: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::{LinkExtractor, LinkStatus};

    fn config() -> AuditConfig {
        AuditConfig::for_site("https://mysite.com")
    }

    fn tools() -> (LinkExtractor, ContentMutator) {
        (
            LinkExtractor::new(&config()).unwrap(),
            ContentMutator::new(&config()),
        )
    }

    #[test]
    fn test_status_change_round_trips() {
        let (extractor, mutator) = tools();
        let content = r#"<a href="https://good.example">t</a>"#;
        let link = extractor.extract(content, 1).remove(0);

        let out = mutator
            .mutate(1, content, &link, &link.with_status(LinkStatus::Ok))
            .unwrap();

        let again = extractor.extract(&out, 1);
        assert_eq!(again[0].status, LinkStatus::Ok);
        assert_eq!(again[0].id, link.id);
        assert!(out.contains(r#"data-link-id="post-1-link-0""#));
        assert!(out.contains(r#"rel="external""#));
    }

    #[test]
    fn test_second_identical_update_is_byte_identical() {
        let (extractor, mutator) = tools();
        let content = r#"<p>See <a href="https://x.com" rel="me">x</a></p>"#;
        let link = extractor.extract(content, 2).remove(0);
        let updated = Link {
            is_nofollow: true,
            is_new_tab: true,
            status: LinkStatus::Broken,
            ..link.clone()
        };

        let first = mutator.mutate(2, content, &link, &updated).unwrap();
        let second = mutator.mutate(2, &first, &link, &updated).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_untouched_anchors_are_preserved_exactly() {
        let (extractor, mutator) = tools();
        let content = "<p><a href='https://a.com'  class=x>A</a> <a href=\"https://b.com\">B</a></p>";
        let links = extractor.extract(content, 4);

        let out = mutator
            .mutate(4, content, &links[1], &links[1].with_status(LinkStatus::Ok))
            .unwrap();

        assert!(out.starts_with("<p><a href='https://a.com'  class=x>A</a> "));
        let after = extractor.extract(&out, 4);
        assert_eq!(after[0], links[0]);
        assert_eq!(after[1].status, LinkStatus::Ok);
    }

    #[test]
    fn test_rel_keeps_foreign_tokens_and_drops_when_empty() {
        let (extractor, mutator) = tools();
        let content = r#"<a href="/in" rel="nofollow sponsored noopener">in</a><a href="/in2" rel="nofollow">in2</a>"#;
        let links = extractor.extract(content, 1);

        let plain = |l: &Link| Link {
            is_nofollow: false,
            ..l.clone()
        };
        let out = mutator.mutate(1, content, &links[0], &plain(&links[0])).unwrap();
        let out = mutator.mutate(1, &out, &links[1], &plain(&links[1])).unwrap();

        assert!(out.contains(r#"rel="sponsored""#));
        assert_eq!(out.matches("rel=").count(), 1);
    }

    #[test]
    fn test_new_tab_external_adds_security_tokens() {
        let (extractor, mutator) = tools();
        let content = r#"<a href="https://x.com" target="_self">x</a>"#;
        let link = extractor.extract(content, 1).remove(0);
        let updated = Link {
            is_new_tab: true,
            is_nofollow: true,
            ..link.clone()
        };

        let out = mutator.mutate(1, content, &link, &updated).unwrap();
        assert!(out.contains(r#"target="_blank""#));
        assert!(out.contains(r#"rel="nofollow external noopener noreferrer""#));

        let back = mutator
            .mutate(1, &out, &updated, &Link { is_new_tab: false, ..updated.clone() })
            .unwrap();
        assert!(!back.contains("target="));
        assert!(back.contains(r#"rel="nofollow external""#));
    }

    #[test]
    fn test_href_only_changes_when_updated_differs() {
        let (extractor, mutator) = tools();
        let content = r#"<a href="https://old.com">x</a>"#;
        let link = extractor.extract(content, 1).remove(0);

        let same = mutator.mutate(1, content, &link, &link).unwrap();
        assert!(same.contains(r#"href="https://old.com""#));

        let cleared = Link { href: String::new(), ..link.clone() };
        let kept = mutator.mutate(1, content, &link, &cleared).unwrap();
        assert!(kept.contains(r#"href="https://old.com""#));

        let moved = Link { href: "https://new.com".into(), ..link.clone() };
        let out = mutator.mutate(1, content, &link, &moved).unwrap();
        assert!(out.contains(r#"href="https://new.com""#));
    }

    #[test]
    fn test_fallback_match_stamps_identity() {
        let (_, mutator) = tools();
        // Content rewritten elsewhere: the positional id no longer lines up
        let content = r#"<a href="/new">n</a><a href="https://x.com">x</a>"#;
        let link = Link {
            id: "legacy-7".into(),
            href: "https://x.com".into(),
            anchor_text: "x".into(),
            is_external: true,
            is_nofollow: false,
            is_new_tab: false,
            status: LinkStatus::Idle,
        };

        let out = mutator
            .mutate(9, content, &link, &link.with_status(LinkStatus::Checking))
            .unwrap();
        assert!(out.contains(r#"data-link-id="legacy-7""#));
        assert!(out.contains(r#"data-link-status="checking""#));
        assert!(out.starts_with(r#"<a href="/new">n</a>"#));
    }

    #[test]
    fn test_unmatched_link_leaves_content_alone() {
        let (_, mutator) = tools();
        let content = r#"<a href="https://y.com">y</a>"#;
        let ghost = Link {
            id: "gone".into(),
            href: "https://x.com".into(),
            anchor_text: "x".into(),
            is_external: true,
            is_nofollow: false,
            is_new_tab: false,
            status: LinkStatus::Idle,
        };
        let out = mutator
            .mutate(1, content, &ghost, &ghost.with_status(LinkStatus::Ok))
            .unwrap();
        assert_eq!(out, content);
    }

    #[test]
    fn test_duplicate_hrefs_stay_unique_after_changes() {
        let (extractor, mutator) = tools();
        let content = r#"<a href="https://x.com">x</a> <a href="https://x.com">x</a>"#;
        let links = extractor.extract(content, 5);

        let changes: Vec<_> = links
            .iter()
            .rev()
            .map(|l| (l.clone(), l.with_status(LinkStatus::Checking)))
            .collect();
        let out = mutator.apply_changes(5, content, &changes).unwrap();

        let after = extractor.extract(&out, 5);
        assert_eq!(after[0].id, "post-5-link-0");
        assert_eq!(after[1].id, "post-5-link-1");
        assert!(after.iter().all(|l| l.status == LinkStatus::Checking));
    }

    #[test]
    fn test_replace_urls_respects_boundaries() {
        let (_, mutator) = tools();
        let content = r#"<a href="https://old.com/page?x=1">a</a><a href="https://old.com.fake">b</a><a href="https://old.com">c</a>"#;
        let out = mutator
            .replace_urls(content, "https://old.com", "https://new.com")
            .unwrap();
        assert!(out.contains(r#"href="https://new.com/page?x=1""#));
        assert!(out.contains(r#"href="https://old.com.fake""#));
        assert!(out.contains(r#"href="https://new.com">c"#));
    }

    #[test]
    fn test_replace_urls_with_empty_find_is_noop() {
        let (_, mutator) = tools();
        let content = r#"<a href="">a</a>"#;
        assert_eq!(mutator.replace_urls(content, "", "https://x").unwrap(), content);
    }

    #[test]
    fn test_replace_single_url_only_touches_that_link() {
        let (extractor, mutator) = tools();
        let content = r#"<a href="https://a.com/x">1</a><a href="https://a.com/y">2</a>"#;
        let links = extractor.extract(content, 3);

        let out = mutator
            .replace_single_url(3, content, &links[1].id, "https://a.com", "https://b.com")
            .unwrap();
        assert!(out.contains(r#"href="https://a.com/x""#));
        assert!(out.contains(r#"href="https://b.com/y""#));
    }

    #[test]
    fn test_clear_all_statuses_keeps_identities() {
        let (extractor, mutator) = tools();
        let content = r#"<a href="https://x.com" data-link-id="keep" data-link-status="broken">x</a><a href="https://y.com">y</a>"#;

        let out = mutator.clear_all_statuses(8, content).unwrap();
        assert!(!out.contains("data-link-status"));
        assert!(out.contains(r#"data-link-id="keep""#));
        assert!(out.contains(r#"data-link-id="post-8-link-1""#));

        let links = extractor.extract(&out, 8);
        assert!(links.iter().all(|l| l.status == LinkStatus::Idle));
    }

    #[test]
    fn test_replace_prefix_boundary_rule() {
        assert_eq!(
            replace_prefix("https://a.com/x", "https://a.com", "https://b.com").as_deref(),
            Some("https://b.com/x")
        );
        assert_eq!(
            replace_prefix("https://a.com", "https://a.com", "https://b.com").as_deref(),
            Some("https://b.com")
        );
        assert_eq!(
            replace_prefix("https://a.com#top", "https://a.com", "https://b.com").as_deref(),
            Some("https://b.com#top")
        );
        assert_eq!(replace_prefix("https://a.com.other/x", "https://a.com", "https://b.com"), None);
    }

    #[test]
    fn test_encoded_query_string_round_trips() {
        let (extractor, mutator) = tools();
        let content = r#"<p><a href="https://x.com/?a=1&amp;b=2">x</a></p>"#;
        let link = extractor.extract(content, 3).remove(0);
        assert_eq!(link.href, "https://x.com/?a=1&b=2");

        // A status change leaves the stored spelling of the href alone
        let once = mutator
            .mutate(3, content, &link, &link.with_status(LinkStatus::Ok))
            .unwrap();
        assert!(once.contains(r#"href="https://x.com/?a=1&amp;b=2""#));
        let twice = mutator
            .mutate(3, &once, &link, &link.with_status(LinkStatus::Ok))
            .unwrap();
        assert_eq!(once, twice);

        let moved = Link {
            href: "https://z.com/?a=1&b=2".into(),
            ..link.clone()
        };
        let out = mutator.mutate(3, &once, &link, &moved).unwrap();
        assert!(out.contains(r#"href="https://z.com/?a=1&amp;b=2""#), "{}", out);
        assert_eq!(extractor.extract(&out, 3)[0].href, "https://z.com/?a=1&b=2");
    }

    #[test]
    fn test_replace_urls_matches_encoded_hrefs() {
        let (extractor, mutator) = tools();
        let content = r#"<a href="https://x.com/?a=1&amp;b=2">x</a>"#;

        let out = mutator
            .replace_urls(content, "https://x.com/?a=1&b=2", "https://y.com/?c=3&d=4")
            .unwrap();
        assert!(out.contains(r#"href="https://y.com/?c=3&amp;d=4""#), "{}", out);
        assert_eq!(extractor.extract(&out, 1)[0].href, "https://y.com/?c=3&d=4");
    }
}
