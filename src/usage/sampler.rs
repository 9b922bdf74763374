//! Trailing-window poller over the usage-query capability.

use super::types::{SamplingWindow, UsageEvent};
use super::{query_bounded, UsageQuery};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Polls the usage source for `[now - lookback, now]`.
///
/// The permission gate is checked by the caller before every poll; the
/// sampler itself never consults it.
#[derive(Clone)]
pub struct UsageSampler {
    source: Arc<dyn UsageQuery>,
    lookback: chrono::Duration,
    timeout: Duration,
}

impl UsageSampler {
    /// Create a sampler with the given lookback and per-query timeout.
    pub fn new(source: Arc<dyn UsageQuery>, lookback: Duration, timeout: Duration) -> Self {
        let lookback = chrono::Duration::from_std(lookback)
            .unwrap_or_else(|_| chrono::Duration::seconds(10));
        Self {
            source,
            lookback,
            timeout,
        }
    }

    /// The window a poll at `now` covers.
    pub fn window(&self, now: DateTime<Utc>) -> SamplingWindow {
        SamplingWindow::trailing(now, self.lookback)
    }

    /// Fetch the events of the trailing window ending at `now`.
    ///
    /// Query failures and timeouts are logged and produce an empty batch;
    /// the next tick simply tries again.
    pub async fn poll(&self, now: DateTime<Utc>) -> Vec<UsageEvent> {
        let window = self.window(now);
        let source = Arc::clone(&self.source);

        match query_bounded(self.timeout, move || {
            source.query_events(window.start, window.end)
        })
        .await
        {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!("Usage poll failed, skipping tick: {}", e);
                Vec::new()
            }
        }
    }
}
