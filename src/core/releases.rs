//! Release history on the target fleet.
//!
//! The list of release directories is read from the remote host on first use
//! and cached. [`ReleaseHistory::reset`] drops the cache so the next read
//! reflects whatever the remote side reports at that point.

use std::cell::RefCell;

use crate::error::Result;

#[derive(Debug, Default)]
pub struct ReleaseHistory {
    cached: RefCell<Option<Vec<String>>>,
}

impl ReleaseHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached releases, calling `fetch` on a cold cache.
    pub fn get_or_fetch<F>(&self, fetch: F) -> Result<Vec<String>>
    where
        F: FnOnce() -> Result<Vec<String>>,
    {
        if let Some(releases) = self.cached.borrow().as_ref() {
            return Ok(releases.clone());
        }

        let releases = fetch()?;
        *self.cached.borrow_mut() = Some(releases.clone());
        Ok(releases)
    }

    pub fn is_cached(&self) -> bool {
        self.cached.borrow().is_some()
    }

    pub fn reset(&self) {
        self.cached.borrow_mut().take();
    }
}

/// Parse `ls -x` output into sorted release names.
pub fn parse_listing(listing: &str) -> Vec<String> {
    let mut releases: Vec<String> = listing.split_whitespace().map(str::to_string).collect();
    releases.sort();
    releases
}
