//! Today's total screen time from the aggregate usage query.

use super::types::Granularity;
use super::{query_bounded, UsageQuery};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Local midnight of the day containing `now`, in UTC.
fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        // Midnight skipped by a DST jump; fall back to the last 24 hours
        .unwrap_or_else(|| now.with_timezone(&Utc) - chrono::Duration::hours(24))
}

/// Total foreground time across all apps since local midnight.
///
/// Fails open: any query error or timeout reads as zero.
pub async fn screen_time_today<Tz>(
    source: Arc<dyn UsageQuery>,
    now: DateTime<Tz>,
    timeout: Duration,
) -> Duration
where
    Tz: TimeZone,
{
    let start = start_of_day(&now);
    let end = now.with_timezone(&Utc);

    match query_bounded(timeout, move || {
        source.query_aggregate(start, end, Granularity::Best)
    })
    .await
    {
        Ok(per_app) => Duration::from_millis(per_app.values().sum()),
        Err(e) => {
            tracing::warn!("Screen time query failed: {}", e);
            Duration::ZERO
        }
    }
}

/// Render a duration as `"{h}h {m}m"`, truncating seconds.
pub fn format_screen_time(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    format!("{hours}h {minutes}m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::{QueryError, UsageEvent};
    use std::collections::HashMap;

    struct FixedAggregate(Result<HashMap<String, u64>, QueryError>);

    impl UsageQuery for FixedAggregate {
        fn query_events(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<UsageEvent>, QueryError> {
            Ok(Vec::new())
        }

        fn query_aggregate(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _granularity: Granularity,
        ) -> Result<HashMap<String, u64>, QueryError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_format_screen_time() {
        assert_eq!(format_screen_time(Duration::ZERO), "0h 0m");
        assert_eq!(format_screen_time(Duration::from_secs(59)), "0h 0m");
        assert_eq!(format_screen_time(Duration::from_secs(9_000)), "2h 30m");
    }

    #[test]
    fn test_start_of_day_utc() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 15, 42, 7).unwrap();
        assert_eq!(
            start_of_day(&now),
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_screen_time_sums_apps() {
        let mut per_app = HashMap::new();
        per_app.insert("com.instagram.android".to_string(), 60_000);
        per_app.insert("com.twitter.android".to_string(), 90_000);

        let total = screen_time_today(
            Arc::new(FixedAggregate(Ok(per_app))),
            Utc::now(),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(total, Duration::from_millis(150_000));
    }

    #[tokio::test]
    async fn test_screen_time_fails_open() {
        let total = screen_time_today(
            Arc::new(FixedAggregate(Err(QueryError::Unavailable(
                "no access".to_string(),
            )))),
            Utc::now(),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(total, Duration::ZERO);
    }
}
