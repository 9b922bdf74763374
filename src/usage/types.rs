//! Usage event types for the Unscroll agent.
//!
//! Events describe foreground transitions only: which app, what kind of
//! transition, and when. Batches are short-lived and dropped after
//! classification.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Kind of foreground transition reported by the usage source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// The app moved to the foreground
    Resumed,
    /// The app left the foreground
    Paused,
    /// Any other transition the source reports
    #[serde(other)]
    Other,
}

/// A single foreground transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
    /// Application identifier (package name or bundle id)
    pub app_id: String,
    /// Transition kind
    pub kind: TransitionKind,
}

impl UsageEvent {
    pub fn new(timestamp: DateTime<Utc>, app_id: impl Into<String>, kind: TransitionKind) -> Self {
        Self {
            timestamp,
            app_id: app_id.into(),
            kind,
        }
    }

    /// Shorthand for a `Resumed` transition.
    pub fn resumed(timestamp: DateTime<Utc>, app_id: impl Into<String>) -> Self {
        Self::new(timestamp, app_id, TransitionKind::Resumed)
    }

    /// Shorthand for a `Paused` transition.
    pub fn paused(timestamp: DateTime<Utc>, app_id: impl Into<String>) -> Self {
        Self::new(timestamp, app_id, TransitionKind::Paused)
    }
}

/// The time range a single poll asks the usage source for.
///
/// Consecutive windows overlap whenever the lookback exceeds the poll
/// interval, so one transition can be delivered more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SamplingWindow {
    /// Window `[now - lookback, now]`.
    pub fn trailing(now: DateTime<Utc>, lookback: Duration) -> Self {
        Self {
            start: now - lookback,
            end: now,
        }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Bucket size for aggregate usage queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Let the source pick the finest buckets covering the range
    Best,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_window_bounds() {
        let now = Utc::now();
        let window = SamplingWindow::trailing(now, Duration::seconds(10));

        assert_eq!(window.end, now);
        assert_eq!(window.start, now - Duration::seconds(10));
        assert!(window.contains(now));
        assert!(window.contains(now - Duration::seconds(10)));
        assert!(!window.contains(now - Duration::seconds(11)));
    }

    #[test]
    fn test_unknown_kind_maps_to_other() {
        let json = r#"{"timestamp":"2024-05-01T10:00:00Z","app_id":"com.example","kind":"configuration_change"}"#;
        let event: UsageEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, TransitionKind::Other);

        let json = r#"{"timestamp":"2024-05-01T10:00:00Z","app_id":"com.example","kind":"resumed"}"#;
        let event: UsageEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, TransitionKind::Resumed);
    }
}
