//! Watch-list classification of usage batches.

use crate::usage::types::{TransitionKind, UsageEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Apps watched when no configuration says otherwise.
pub const DEFAULT_WATCHED_APPS: [&str; 4] = [
    "com.instagram.android",
    "com.twitter.android",
    "com.snapchat.android",
    "com.facebook.katana",
];

/// Set of application identifiers considered distracting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchList {
    apps: BTreeSet<String>,
}

impl Default for WatchList {
    fn default() -> Self {
        DEFAULT_WATCHED_APPS.iter().copied().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for WatchList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            apps: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl WatchList {
    pub fn empty() -> Self {
        Self {
            apps: BTreeSet::new(),
        }
    }

    pub fn contains(&self, app_id: &str) -> bool {
        self.apps.contains(app_id)
    }

    /// Returns false if the app was already watched.
    pub fn add(&mut self, app_id: impl Into<String>) -> bool {
        self.apps.insert(app_id.into())
    }

    /// Returns false if the app was not watched.
    pub fn remove(&mut self, app_id: &str) -> bool {
        self.apps.remove(app_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.apps.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

/// First event in `events` that resumed a watched app.
///
/// Batch order is preserved, so the result is deterministic for a given
/// batch. The batch is consumed and the match handed back by value.
pub fn classify(events: Vec<UsageEvent>, watch_list: &WatchList) -> Option<UsageEvent> {
    events
        .into_iter()
        .find(|e| e.kind == TransitionKind::Resumed && watch_list.contains(&e.app_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_resumed_watched_app_matches() {
        let now = Utc::now();
        let events = vec![UsageEvent::resumed(
            now - Duration::seconds(2),
            "com.instagram.android",
        )];

        let matched = classify(events, &WatchList::default()).unwrap();
        assert_eq!(matched.app_id, "com.instagram.android");
    }

    #[test]
    fn test_non_resumed_and_unwatched_are_ignored() {
        let now = Utc::now();
        let events = vec![
            UsageEvent::paused(now, "com.instagram.android"),
            UsageEvent::resumed(now, "com.android.calculator2"),
            UsageEvent::new(now, "com.twitter.android", TransitionKind::Other),
        ];

        assert!(classify(events, &WatchList::default()).is_none());
    }

    #[test]
    fn test_first_qualifying_event_wins() {
        let now = Utc::now();
        let events = vec![
            UsageEvent::resumed(now - Duration::seconds(1), "com.android.settings"),
            UsageEvent::resumed(now - Duration::seconds(3), "com.snapchat.android"),
            UsageEvent::resumed(now - Duration::seconds(5), "com.facebook.katana"),
        ];

        let matched = classify(events, &WatchList::default()).unwrap();
        assert_eq!(matched.app_id, "com.snapchat.android");
    }

    #[test]
    fn test_empty_watch_list_never_matches() {
        let events = vec![UsageEvent::resumed(Utc::now(), "com.instagram.android")];
        assert!(classify(events, &WatchList::empty()).is_none());
    }

    #[test]
    fn test_watch_list_edits() {
        let mut list = WatchList::default();
        assert_eq!(list.len(), 4);

        assert!(list.add("com.reddit.frontpage"));
        assert!(!list.add("com.reddit.frontpage"));
        assert!(list.remove("com.twitter.android"));
        assert!(!list.remove("com.twitter.android"));

        assert!(list.contains("com.reddit.frontpage"));
        assert!(!list.contains("com.twitter.android"));
        assert_eq!(list.len(), 4);
    }
}
