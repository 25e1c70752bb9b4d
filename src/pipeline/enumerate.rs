//! Pull-based page enumeration.
//!
//! Enumeration state is explicit: offset runs precompute their offsets and
//! walk the list, link-following runs pull from a [`LinkFrontier`] that the
//! page parser feeds. Nothing here fetches; the pipeline asks for the next
//! page when, and only when, it is ready to process one.

use std::collections::{HashSet, VecDeque};

/// Offsets an offset-paginated run requests: every multiple of `page_size`
/// from zero through the ceiling page, ceiling included. The count is
/// always `ceil(max_offset / page_size) + 1`, which is also the number of
/// shards the run writes.
pub fn offsets(page_size: u32, max_offset: u32) -> Vec<u32> {
    if page_size == 0 {
        return vec![0];
    }
    let last_page = max_offset.div_ceil(page_size);
    (0..=last_page).map(|page| page * page_size).collect()
}

/// Explicit frontier for next-link enumeration. URLs come out in insertion
/// order and never twice, so a pagination cycle ends the walk instead of
/// looping it.
#[derive(Debug, Default)]
pub struct LinkFrontier {
    pending: VecDeque<String>,
    seen: HashSet<String>,
}

impl LinkFrontier {
    pub fn seeded(url: &str) -> Self {
        let mut frontier = Self::default();
        frontier.push(url.to_string());
        frontier
    }

    /// Next page to visit, if any.
    pub fn next(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    /// Offers a URL discovered on the current page. Returns false when the
    /// frontier has already seen it.
    pub fn push(&mut self, url: String) -> bool {
        if !self.seen.insert(url.clone()) {
            return false;
        }
        self.pending.push_back(url);
        true
    }
}
