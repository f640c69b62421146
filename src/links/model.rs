// src/links/model.rs
// =============================================================================
// The Link record and its status.
//
// A Link is never stored on its own. It is recomputed from the post HTML on
// every parse; the only persistent state is the pair of attributes written
// back onto the anchor (identity + status).
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reachability state of one link
///
/// idle --(probe requested)--> checking --> ok | broken
/// Internal links are always `ok` and never leave it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Idle,
    Checking,
    Ok,
    Broken,
}

impl LinkStatus {
    /// The value written into the status attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Idle => "idle",
            LinkStatus::Checking => "checking",
            LinkStatus::Ok => "ok",
            LinkStatus::Broken => "broken",
        }
    }

    /// True once a probe has settled the link
    pub fn is_resolved(&self) -> bool {
        matches!(self, LinkStatus::Ok | LinkStatus::Broken)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStatus {
    type Err = ();

    // Only the four exact lowercase values are valid; anything else in the
    // attribute is treated as "no status stored"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(LinkStatus::Idle),
            "checking" => Ok(LinkStatus::Checking),
            "ok" => Ok(LinkStatus::Ok),
            "broken" => Ok(LinkStatus::Broken),
            _ => Err(()),
        }
    }
}

/// One anchor as seen by the auditor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Stable identity, unique within a post
    pub id: String,
    pub href: String,
    pub anchor_text: String,
    pub is_external: bool,
    pub is_nofollow: bool,
    pub is_new_tab: bool,
    pub status: LinkStatus,
}

impl Link {
    /// Same link with a different status
    pub fn with_status(&self, status: LinkStatus) -> Link {
        Link {
            status,
            ..self.clone()
        }
    }
}
