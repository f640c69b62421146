// src/checker/mod.rs
// =============================================================================
// This module contains all reachability checking logic.
//
// Submodules:
// - http: the Prober trait and the reqwest-based waterfall
// - raw:  the last-resort socket probe used at the bottom of the waterfall
// - testing: local HTTP/HTTPS servers for the tests
//
// This file (mod.rs) is the module root - it exports the public API that
// other parts of the crate use.
// =============================================================================

mod http;
mod raw;
#[cfg(test)]
mod testing;

pub use http::{HttpProber, ProbeResult, Prober};
