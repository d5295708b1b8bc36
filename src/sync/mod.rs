//! URL/filter state synchronization for the feed.
//!
//! [`FieldSync`] is the one state machine. [`SearchSync`] binds it to the
//! `q` parameter, and [`FeedFilters`] adds tag operations on top.

pub mod driver;
pub mod machine;
pub mod url;

use std::time::Duration;

pub use driver::{SyncDriver, SyncEvent};
pub use machine::{FieldSync, SyncState, SyncTiming};
pub use url::{
    FeedQuery, back_to_feed_url, build_feed_url_with_tags, build_feed_url_with_tags_and_search,
    build_tags_query, parse_tags_from_query, parse_tags_param,
};

/// A URL update requested by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// New history entry.
    Push(String),
    /// Rewrite the current entry in place.
    Replace(String),
}

impl Navigation {
    pub fn url(&self) -> &str {
        match self {
            Navigation::Push(url) | Navigation::Replace(url) => url,
        }
    }
}

/// Debounced sync of the free-text search with the `q` URL parameter.
#[derive(Debug, Clone)]
pub struct SearchSync {
    field: FieldSync<String>,
    tags: Vec<String>,
    extra: Vec<(String, String)>,
}

impl SearchSync {
    pub fn new(query: &FeedQuery, timing: SyncTiming) -> Self {
        Self {
            field: FieldSync::new("q", timing, query.search_query.clone()),
            tags: query.tags.clone(),
            extra: query.extra.clone(),
        }
    }

    pub fn query(&self) -> &str {
        self.field.value()
    }

    pub fn state(&self) -> SyncState {
        self.field.state()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.field.next_deadline()
    }

    pub fn set_query(&mut self, text: impl Into<String>, now: Duration) {
        self.field.on_user_input(text.into(), now);
    }

    /// Tags to carry along when the search is written to the URL.
    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }

    pub fn poll(&mut self, now: Duration) -> Option<Navigation> {
        self.field.poll(now).map(|query| {
            Navigation::Replace(build_feed_url_with_tags_and_search(
                &self.tags,
                &query,
                &self.extra,
            ))
        })
    }

    /// Observe a new URL. Returns whether the search text was replaced.
    pub fn on_url_change(&mut self, query: &FeedQuery, now: Duration) -> bool {
        self.tags = query.tags.clone();
        self.extra = query.extra.clone();
        self.field.on_url_change(query.search_query.clone(), now)
    }
}

/// Active feed filters: an ordered set of lowercase tags plus the search.
#[derive(Debug, Clone)]
pub struct FeedFilters {
    tags: Vec<String>,
    search: SearchSync,
}

impl FeedFilters {
    pub fn new(query: &FeedQuery, timing: SyncTiming) -> Self {
        let tags = dedup_tags(query.tags.iter().cloned());
        let mut search = SearchSync::new(query, timing);
        search.set_tags(tags.clone());
        Self { tags, search }
    }

    /// Filters for `url`; non-feed URLs start unfiltered.
    pub fn from_url(url: &str, timing: SyncTiming) -> Self {
        Self::new(&FeedQuery::from_url(url).unwrap_or_default(), timing)
    }

    pub fn active_tags(&self) -> &[String] {
        &self.tags
    }

    pub fn search_query(&self) -> &str {
        self.search.query()
    }

    pub fn search(&self) -> &SearchSync {
        &self.search
    }

    pub fn is_tag_active(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.tags.iter().any(|t| *t == tag)
    }

    pub fn remove_tag(&mut self, tag: &str) -> Navigation {
        let tag = tag.to_lowercase();
        self.tags.retain(|t| *t != tag);
        self.push_current()
    }

    pub fn clear_tags(&mut self) -> Navigation {
        self.tags.clear();
        self.push_current()
    }

    /// Add the tag when absent, remove it when present.
    pub fn toggle_tag(&mut self, tag: &str) -> Navigation {
        let tag = tag.to_lowercase();
        if self.tags.contains(&tag) {
            self.tags.retain(|t| *t != tag);
        } else {
            self.tags.push(tag);
        }
        self.push_current()
    }

    pub fn type_query(&mut self, text: impl Into<String>, now: Duration) {
        self.search.set_query(text, now);
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.search.next_deadline()
    }

    pub fn poll(&mut self, now: Duration) -> Option<Navigation> {
        self.search.poll(now)
    }

    pub fn on_url_change(&mut self, url: &str, now: Duration) -> bool {
        let query = FeedQuery::from_url(url).unwrap_or_default();
        self.tags = dedup_tags(query.tags.iter().cloned());
        self.search.on_url_change(&query, now)
    }

    fn push_current(&mut self) -> Navigation {
        self.search.set_tags(self.tags.clone());
        self.search.field.mark_written();
        Navigation::Push(build_feed_url_with_tags_and_search(
            &self.tags,
            self.search.query(),
            &self.search.extra,
        ))
    }
}

fn dedup_tags(tags: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags.map(|t| t.to_lowercase()) {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
