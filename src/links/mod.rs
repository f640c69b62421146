// src/links/mod.rs
// =============================================================================
// This module reads and writes the links embedded in post HTML.
//
// Submodules:
// - model:   the Link record and LinkStatus
// - site:    internal vs external classification
// - html:    anchor scanning / patching on top of lol_html
// - extract: HTML -> Vec<Link>
// - mutate:  Link changes -> HTML, find/replace, status reset
// =============================================================================

mod extract;
mod html;
mod model;
mod mutate;
mod site;

pub use extract::LinkExtractor;
pub use html::synthesize_link_id;
pub use model::{Link, LinkStatus};
pub use mutate::ContentMutator;
pub use site::SiteOrigin;

/// True if `href` equals `find` or extends it past a `/`, `?` or `#`
pub fn href_matches(href: &str, find: &str) -> bool {
    mutate::replace_prefix(href, find, "").is_some()
}
