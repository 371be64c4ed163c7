//! Session title derivation and caching.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// The placeholder title used before a real title can be derived.
pub const SENTINEL_TITLE: &str = "New Conversation";

/// Derives a short display title from a message text.
///
/// Texts of at most `word_limit` whitespace-separated words are
/// returned unchanged; longer texts are cut to the first `word_limit`
/// words joined by single spaces, followed by `"..."`. Blank input
/// yields [`SENTINEL_TITLE`].
pub fn derive_title(text: &str, word_limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return SENTINEL_TITLE.to_owned();
    }
    if words.len() <= word_limit {
        return text.to_owned();
    }
    let mut title = words[..word_limit].join(" ");
    title.push_str("...");
    title
}

#[derive(Default)]
struct CacheState {
    titles: HashMap<String, String>,
    in_flight: HashSet<String>,
}

/// A per-session cache of derived titles.
///
/// Derivation for a session discovered via the remote listing needs a
/// history fetch, so the cache tracks in-flight resolutions to make
/// sure each session id is resolved at most once, no matter how many
/// callers race for it.
#[derive(Clone, Default)]
pub struct TitleCache {
    inner: Arc<Mutex<CacheState>>,
}

impl TitleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.inner.lock().expect("title cache lock poisoned")
    }

    /// Returns the cached title for a session, if any.
    pub fn get(&self, session_id: &str) -> Option<String> {
        self.state().titles.get(session_id).cloned()
    }

    /// Stores a derived title.
    pub fn insert(
        &self,
        session_id: impl Into<String>,
        title: impl Into<String>,
    ) {
        self.state().titles.insert(session_id.into(), title.into());
    }

    /// Drops the cached title for a session.
    pub fn remove(&self, session_id: &str) {
        self.state().titles.remove(session_id);
    }

    /// Marks a resolution as started.
    ///
    /// Returns `false` when the id is already cached or a resolution
    /// for it is already in flight; the caller must not issue a
    /// remote fetch in that case.
    pub fn begin_resolve(&self, session_id: &str) -> bool {
        let mut state = self.state();
        if state.titles.contains_key(session_id)
            || state.in_flight.contains(session_id)
        {
            return false;
        }
        state.in_flight.insert(session_id.to_owned());
        true
    }

    /// Completes a resolution started with
    /// [`begin_resolve`](Self::begin_resolve).
    ///
    /// The in-flight entry is cleared on every outcome; the cache is
    /// only written when a title was actually derived, so a failed
    /// resolution can be retried later.
    pub fn finish_resolve(&self, session_id: &str, title: Option<String>) {
        let mut state = self.state();
        state.in_flight.remove(session_id);
        if let Some(title) = title {
            state.titles.insert(session_id.to_owned(), title);
        }
    }
}
