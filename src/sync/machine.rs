use std::time::Duration;

/// Debounce and guard intervals for URL reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTiming {
    /// Quiet period after the last keystroke before the URL is rewritten.
    pub debounce: Duration,
    /// External URL changes are ignored until this long after a keystroke.
    pub guard: Duration,
}

impl Default for SyncTiming {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            guard: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    /// Input received, URL write pending.
    UserEditing,
    /// URL write emitted, waiting to observe it.
    SyncingToUrl,
    /// The last URL change was adopted into local state.
    SyncingFromUrl,
}

/// Two-way sync between one editable value and one URL parameter.
///
/// Time is passed in by the caller as an offset from any fixed epoch, so the
/// machine never reads a clock and never blocks.
#[derive(Debug, Clone)]
pub struct FieldSync<V> {
    key: &'static str,
    timing: SyncTiming,
    value: V,
    observed_url: V,
    last_input: Option<Duration>,
    write_due: Option<Duration>,
    state: SyncState,
}

impl<V: Clone + PartialEq> FieldSync<V> {
    pub fn new(key: &'static str, timing: SyncTiming, url_value: V) -> Self {
        Self {
            key,
            timing,
            value: url_value.clone(),
            observed_url: url_value,
            last_input: None,
            write_due: None,
            state: SyncState::Idle,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn timing(&self) -> SyncTiming {
        self.timing
    }

    /// When the pending URL write becomes due, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.write_due
    }

    /// Apply user input immediately and (re)start the debounce window.
    pub fn on_user_input(&mut self, value: V, now: Duration) {
        self.value = value;
        self.last_input = Some(now);
        self.write_due = Some(now + self.timing.debounce);
        self.state = SyncState::UserEditing;
    }

    /// Returns the value to write to the URL once the debounce window has
    /// elapsed and local state differs from the last observed URL value.
    pub fn poll(&mut self, now: Duration) -> Option<V> {
        match self.write_due {
            Some(due) if now >= due => {
                self.write_due = None;
                if self.value != self.observed_url {
                    tracing::debug!(key = self.key, "Writing field to URL");
                    self.mark_written();
                    Some(self.value.clone())
                } else {
                    self.state = SyncState::Idle;
                    None
                }
            }
            _ => {
                if self.state == SyncState::SyncingFromUrl {
                    self.state = SyncState::Idle;
                }
                None
            }
        }
    }

    /// Record that the current value has been written to the URL by some
    /// other navigation. Any pending debounced write is dropped.
    pub fn mark_written(&mut self) {
        self.observed_url = self.value.clone();
        self.write_due = None;
        self.state = SyncState::SyncingToUrl;
    }

    /// Observe the URL value. Local state is overwritten only when the URL
    /// really changed, differs from local state, and the user has not typed
    /// within the guard interval. Returns whether local state was replaced.
    pub fn on_url_change(&mut self, url_value: V, now: Duration) -> bool {
        let quiet = self
            .last_input
            .is_none_or(|at| now.saturating_sub(at) > self.timing.guard);
        let adopt = url_value != self.observed_url && url_value != self.value && quiet;

        if adopt {
            tracing::debug!(key = self.key, "Adopting external URL change");
            self.value = url_value.clone();
            self.write_due = None;
            self.state = SyncState::SyncingFromUrl;
        } else if self.state == SyncState::SyncingToUrl && url_value == self.value {
            self.state = SyncState::Idle;
        }

        self.observed_url = url_value;
        adopt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn search() -> FieldSync<String> {
        FieldSync::new("q", SyncTiming::default(), String::new())
    }

    #[test]
    fn test_keystrokes_coalesce_into_one_write() {
        let mut sync = search();
        sync.on_user_input("s".into(), ms(0));
        assert_eq!(sync.poll(ms(99)), None);
        sync.on_user_input("so".into(), ms(100));
        sync.on_user_input("soup".into(), ms(200));
        assert_eq!(sync.state(), SyncState::UserEditing);

        assert_eq!(sync.poll(ms(499)), None);
        assert_eq!(sync.poll(ms(500)), Some("soup".to_string()));
        assert_eq!(sync.state(), SyncState::SyncingToUrl);
        assert_eq!(sync.poll(ms(900)), None);
    }

    #[test]
    fn test_clearing_after_write_flushes_again() {
        let mut sync = search();
        sync.on_user_input("soup".into(), ms(0));
        assert_eq!(sync.poll(ms(300)), Some("soup".to_string()));

        sync.on_user_input(String::new(), ms(1000));
        assert_eq!(sync.poll(ms(1300)), Some(String::new()));

        // Retyping the value from before the first write is a change too.
        sync.on_user_input("soup".into(), ms(2000));
        assert_eq!(sync.poll(ms(2300)), Some("soup".to_string()));
    }

    #[test]
    fn test_mark_written_drops_pending_write() {
        let mut sync = search();
        sync.on_user_input("stew".into(), ms(0));
        sync.mark_written();
        assert_eq!(sync.next_deadline(), None);
        assert_eq!(sync.poll(ms(300)), None);
        assert_eq!(sync.state(), SyncState::SyncingToUrl);
        assert!(!sync.on_url_change("stew".into(), ms(320)));
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[test]
    fn test_no_write_when_value_matches_url() {
        let mut sync = FieldSync::new("q", SyncTiming::default(), "stew".to_string());
        sync.on_user_input("stew".into(), ms(0));
        assert_eq!(sync.poll(ms(300)), None);
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[test]
    fn test_external_change_during_typing_is_ignored() {
        let mut sync = search();
        sync.on_user_input("abc".into(), ms(0));
        assert!(!sync.on_url_change("xyz".into(), ms(100)));
        assert_eq!(sync.value(), "abc");
    }

    #[test]
    fn test_external_change_after_guard_is_adopted() {
        let mut sync = search();
        sync.on_user_input("abc".into(), ms(0));
        assert_eq!(sync.poll(ms(300)), Some("abc".to_string()));
        assert!(!sync.on_url_change("abc".into(), ms(320)));
        assert_eq!(sync.state(), SyncState::Idle);

        assert!(!sync.on_url_change("xyz".into(), ms(500)));
        assert!(sync.on_url_change("back".into(), ms(501)));
        assert_eq!(sync.value(), "back");
        assert_eq!(sync.state(), SyncState::SyncingFromUrl);
    }

    #[test]
    fn test_guard_boundary_is_strict() {
        let mut sync = search();
        sync.on_user_input("a".into(), ms(1000));
        assert!(!sync.on_url_change("b".into(), ms(1500)));
        assert!(sync.on_url_change("c".into(), ms(1501)));
    }

    #[test]
    fn test_unchanged_url_is_not_re_adopted() {
        let mut sync = FieldSync::new("q", SyncTiming::default(), "old".to_string());
        sync.on_user_input("new".into(), ms(0));
        // URL still reports the value observed at construction.
        assert!(!sync.on_url_change("old".into(), ms(5000)));
        assert_eq!(sync.value(), "new");
    }

    #[test]
    fn test_observed_url_always_updates() {
        let mut sync = search();
        sync.on_user_input("abc".into(), ms(0));
        assert!(!sync.on_url_change("xyz".into(), ms(100)));
        // Same URL value again, now outside the guard: not a change.
        assert!(!sync.on_url_change("xyz".into(), ms(2000)));
        assert_eq!(sync.value(), "abc");
    }

    #[test]
    fn test_debounce_longer_than_guard_still_flushes() {
        let timing = SyncTiming {
            debounce: ms(800),
            guard: ms(200),
        };
        let mut sync = FieldSync::new("q", timing, String::new());
        sync.on_user_input("late".into(), ms(0));
        assert_eq!(sync.poll(ms(500)), None);
        assert_eq!(sync.poll(ms(800)), Some("late".to_string()));
    }

    #[test]
    fn test_works_for_non_string_values() {
        let mut tags: FieldSync<Vec<String>> = FieldSync::new("tags", SyncTiming::default(), vec![]);
        tags.on_user_input(vec!["vegan".into()], ms(0));
        assert_eq!(tags.poll(ms(300)), Some(vec!["vegan".to_string()]));
        assert_eq!(tags.key(), "tags");
    }
}
