//! File-backed usage source.
//!
//! Reads foreground transitions from a JSON Lines file, one [`UsageEvent`]
//! per line. The file is re-read on every query, so a feeder process can
//! append lines while the agent runs.

use super::types::{Granularity, TransitionKind, UsageEvent};
use super::{QueryError, UsageQuery};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Usage source replaying transitions recorded in a JSON Lines file.
#[derive(Debug, Clone)]
pub struct ReplayUsageSource {
    path: PathBuf,
}

impl ReplayUsageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event to the file, creating it if needed.
    pub fn append(&self, event: &UsageEvent) -> Result<(), QueryError> {
        use std::io::Write;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QueryError::IoError(e.to_string()))?;
        }

        let line =
            serde_json::to_string(event).map_err(|e| QueryError::ParseError(e.to_string()))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| QueryError::IoError(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| QueryError::IoError(e.to_string()))
    }

    /// Load every event in the file, sorted by timestamp.
    ///
    /// A missing file reads as empty. Malformed lines are skipped.
    fn load(&self) -> Result<Vec<UsageEvent>, QueryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content =
            std::fs::read_to_string(&self.path).map_err(|e| QueryError::IoError(e.to_string()))?;

        let mut events: Vec<UsageEvent> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(idx, line)| match serde_json::from_str(line) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!("Skipping malformed usage event on line {}: {}", idx + 1, e);
                    None
                }
            })
            .collect();

        // Stable, so equal timestamps keep file order
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }
}

impl UsageQuery for ReplayUsageSource {
    fn query_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageEvent>, QueryError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect())
    }

    fn query_aggregate(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _granularity: Granularity,
    ) -> Result<HashMap<String, u64>, QueryError> {
        let events = self.load()?;
        Ok(foreground_totals(&events, start, end))
    }
}

/// Foreground milliseconds per app within `[start, end]`.
///
/// Only one app is in the foreground at a time: a `Resumed` closes whatever
/// was open. An app still open at the end is clipped to `end`.
fn foreground_totals(
    events: &[UsageEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> HashMap<String, u64> {
    let mut totals: HashMap<String, u64> = HashMap::new();
    let mut open: Option<(&str, DateTime<Utc>)> = None;

    let mut add = |app: &str, since: DateTime<Utc>, until: DateTime<Utc>| {
        let from = since.max(start);
        let to = until.min(end);
        if to > from {
            *totals.entry(app.to_string()).or_default() += (to - from).num_milliseconds() as u64;
        }
    };

    for event in events.iter().take_while(|e| e.timestamp <= end) {
        match event.kind {
            TransitionKind::Resumed => {
                if let Some((app, since)) = open.take() {
                    add(app, since, event.timestamp);
                }
                open = Some((event.app_id.as_str(), event.timestamp));
            }
            TransitionKind::Paused => match open {
                Some((app, since)) if app == event.app_id => {
                    add(app, since, event.timestamp);
                    open = None;
                }
                _ => {}
            },
            TransitionKind::Other => {}
        }
    }

    if let Some((app, since)) = open {
        add(app, since, end);
    }

    totals
}
