//! Usage sampling for the Unscroll agent.
//!
//! The device-side usage query is an external capability behind the
//! [`UsageQuery`] trait. The [`UsageSampler`] polls it over a trailing window
//! and fails open: a failed or hung query yields an empty batch.

pub mod replay;
pub mod sampler;
pub mod screen_time;
pub mod types;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

pub use replay::ReplayUsageSource;
pub use sampler::UsageSampler;
pub use screen_time::{format_screen_time, screen_time_today};
pub use types::{Granularity, SamplingWindow, TransitionKind, UsageEvent};

/// Usage-query capability of the host device.
///
/// Implementations may block; callers run them on the blocking pool under a
/// timeout.
pub trait UsageQuery: Send + Sync {
    /// Foreground transitions with timestamps in `[start, end]`, oldest first.
    fn query_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageEvent>, QueryError>;

    /// Foreground time per app in milliseconds over `[start, end]`.
    fn query_aggregate(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<HashMap<String, u64>, QueryError>;
}

/// Errors from the usage-query capability. None of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    Unavailable(String),
    Timeout(Duration),
    IoError(String),
    ParseError(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Unavailable(e) => write!(f, "Usage query unavailable: {e}"),
            QueryError::Timeout(d) => write!(f, "Usage query timed out after {}ms", d.as_millis()),
            QueryError::IoError(e) => write!(f, "IO error: {e}"),
            QueryError::ParseError(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Run a blocking usage query on the blocking pool, bounded by `timeout`.
///
/// A query that outlives the timeout keeps running on its pool thread but its
/// result is discarded.
pub(crate) async fn query_bounded<T, F>(timeout: Duration, query: F) -> Result<T, QueryError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, QueryError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(query)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(QueryError::Unavailable(format!(
            "query task failed: {join_err}"
        ))),
        Err(_) => Err(QueryError::Timeout(timeout)),
    }
}
