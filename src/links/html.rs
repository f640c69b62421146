// src/links/html.rs
// =============================================================================
// Low-level anchor scanning and patching on top of lol_html.
//
// Both passes walk the same tokenizer over the same content, so anchor N in
// the scan is anchor N in the rewrite. That positional agreement is what lets
// the mutator plan its edits on a scan and apply them by index.
//
// Why a streaming rewriter instead of a DOM?
// - a DOM re-serializes the whole fragment, normalizing quotes, whitespace
//   and misnested tags
// - lol_html passes untouched bytes straight through and only re-serializes
//   the start tags we actually modify
//
// Rust concepts:
// - RefCell: shared mutable state for two handler closures
// - HashMap: edits keyed by anchor position
// =============================================================================

use lol_html::{element, text, HtmlRewriter, Settings};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::error::RewriteError;

/// One `<a>` element of the raw content, values entity-decoded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RawAnchor {
    /// Zero-based position among all anchors of the fragment
    pub index: usize,
    /// Identity attribute, if present and non-empty
    pub id: Option<String>,
    pub href: String,
    pub rel: Option<String>,
    pub target: Option<String>,
    pub status: Option<String>,
    pub text: String,
}

/// Attribute edits for a single anchor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AnchorPatch {
    pub set: Vec<(String, String)>,
    pub remove: Vec<String>,
}

impl AnchorPatch {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// Reads every anchor of the fragment in document order
pub(crate) fn scan_anchors(
    content: &str,
    id_attribute: &str,
    status_attribute: &str,
) -> Result<Vec<RawAnchor>, RewriteError> {
    let anchors: RefCell<Vec<RawAnchor>> = RefCell::new(Vec::new());
    // Raw text chunks, one buffer per anchor; decoded once at the end
    let texts: RefCell<Vec<String>> = RefCell::new(Vec::new());

    {
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    element!("a", |el| {
                        let mut anchors = anchors.borrow_mut();
                        let index = anchors.len();
                        let attribute = |name: &str| el.get_attribute(name).map(|v| decode(&v));
                        anchors.push(RawAnchor {
                            index,
                            id: attribute(id_attribute).filter(|id| !id.is_empty()),
                            href: attribute("href").unwrap_or_default(),
                            rel: attribute("rel"),
                            target: attribute("target"),
                            status: attribute(status_attribute),
                            text: String::new(),
                        });
                        texts.borrow_mut().push(String::new());
                        Ok(())
                    }),
                    // Text inside an anchor (including nested tags) belongs to
                    // the most recently opened one
                    text!("a", |chunk| {
                        if let Some(buffer) = texts.borrow_mut().last_mut() {
                            buffer.push_str(chunk.as_str());
                        }
                        Ok(())
                    }),
                ],
                ..Settings::default()
            },
            |_: &[u8]| {},
        );

        rewriter
            .write(content.as_bytes())
            .map_err(|e| RewriteError::Html(e.to_string()))?;
        rewriter
            .end()
            .map_err(|e| RewriteError::Html(e.to_string()))?;
    }

    let mut anchors = anchors.into_inner();
    for (anchor, raw_text) in anchors.iter_mut().zip(texts.into_inner()) {
        anchor.text = decode(&raw_text);
    }

    Ok(anchors)
}

/// Applies patches by anchor position and re-serializes the fragment
///
/// Content with no patches comes back unchanged without being re-parsed.
pub(crate) fn apply_patches(
    content: &str,
    patches: &HashMap<usize, AnchorPatch>,
) -> Result<String, RewriteError> {
    if patches.values().all(AnchorPatch::is_empty) {
        return Ok(content.to_string());
    }

    let mut output = Vec::with_capacity(content.len() + patches.len() * 64);
    let mut index = 0usize;

    {
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![element!("a", |el| {
                    let position = index;
                    index += 1;

                    if let Some(patch) = patches.get(&position) {
                        for name in &patch.remove {
                            el.remove_attribute(name);
                        }
                        // lol_html writes values verbatim apart from quotes
                        for (name, value) in &patch.set {
                            el.set_attribute(name, &html_escape::encode_double_quoted_attribute(value))?;
                        }
                    }
                    Ok(())
                })],
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );

        rewriter
            .write(content.as_bytes())
            .map_err(|e| RewriteError::Html(e.to_string()))?;
        rewriter
            .end()
            .map_err(|e| RewriteError::Html(e.to_string()))?;
    }

    Ok(String::from_utf8(output)?)
}

/// Attribute values and text as the browser sees them (`&amp;` -> `&`)
fn decode(raw: &str) -> String {
    html_escape::decode_html_entities(raw).into_owned()
}

/// Synthesized identity for an anchor that has none yet
pub fn synthesize_link_id(post_id: u64, index: usize) -> String {
    format!("post-{}-link-{}", post_id, index)
}

/// Position encoded in a synthesized identity, if it is one
pub(crate) fn synthesized_index(link_id: &str) -> Option<usize> {
    link_id.rsplit_once("-link-")?.1.parse().ok()
}

/// Resolves the identity of every anchor of one post
///
/// - an anchor keeps its stored identity unless an earlier anchor already
///   claimed the same value (copy-pasted markup)
/// - everything else gets `post-{post}-link-{index}`, suffixed with `-N` if
///   that value is already stored elsewhere in the post
///
/// The result is unique within the post and is the same on every call for
/// the same content.
pub(crate) fn resolve_identities(anchors: &[RawAnchor], post_id: u64) -> Vec<String> {
    let stored: HashSet<&str> = anchors.iter().filter_map(|a| a.id.as_deref()).collect();
    let mut claimed: HashSet<String> = HashSet::with_capacity(anchors.len());

    anchors
        .iter()
        .map(|anchor| {
            if let Some(id) = anchor.id.as_deref() {
                if claimed.insert(id.to_string()) {
                    return id.to_string();
                }
            }

            let base = synthesize_link_id(post_id, anchor.index);
            let mut candidate = base.clone();
            let mut suffix = 1;
            while stored.contains(candidate.as_str()) || claimed.contains(&candidate) {
                candidate = format!("{}-{}", base, suffix);
                suffix += 1;
            }
            claimed.insert(candidate.clone());
            candidate
        })
        .collect()
}
