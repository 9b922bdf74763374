//! Focus session countdown.
//!
//! The timer is a pure state machine advanced by one-second ticks. The tick
//! source itself is scheduled by the monitor, which cancels the previous
//! source before installing a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session lengths offered to the user, in minutes.
pub const FOCUS_PRESETS_MINUTES: [u64; 3] = [10, 15, 20];

/// Externally visible timer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Idle,
    Running,
    Completed,
}

/// Snapshot of the timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub status: TimerStatus,
    pub remaining_secs: u64,
    pub total_secs: u64,
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
}

/// A started focus session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSession {
    pub id: Uuid,
    pub total_secs: u64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Running { session: FocusSession, remaining: u64 },
    Completed { session: FocusSession },
}

/// Result of delivering one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still running with this many seconds left
    Running { remaining_secs: u64 },
    /// This tick finished the session
    Completed,
    /// No session running; the tick had no effect
    Ignored,
}

/// Errors from starting a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusError {
    ZeroDuration,
}

impl std::fmt::Display for FocusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocusError::ZeroDuration => write!(f, "Focus session duration must be positive"),
        }
    }
}

impl std::error::Error for FocusError {}

/// Countdown state machine: Idle → Running → Completed.
#[derive(Debug, Clone)]
pub struct FocusTimer {
    phase: Phase,
}

impl Default for FocusTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusTimer {
    pub fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    /// Begin a session of `duration_secs`, replacing any running or
    /// completed one.
    pub fn start(
        &mut self,
        duration_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<FocusSession, FocusError> {
        if duration_secs == 0 {
            return Err(FocusError::ZeroDuration);
        }

        let session = FocusSession {
            id: Uuid::new_v4(),
            total_secs: duration_secs,
            started_at: now,
        };
        self.phase = Phase::Running {
            session: session.clone(),
            remaining: duration_secs,
        };
        Ok(session)
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> TickOutcome {
        let Phase::Running { session, remaining } = &mut self.phase else {
            return TickOutcome::Ignored;
        };

        if *remaining > 1 {
            *remaining -= 1;
            return TickOutcome::Running {
                remaining_secs: *remaining,
            };
        }

        let session = session.clone();
        self.phase = Phase::Completed { session };
        TickOutcome::Completed
    }

    /// Drop any session and return to Idle. Returns false if already idle.
    pub fn cancel(&mut self) -> bool {
        !matches!(
            std::mem::replace(&mut self.phase, Phase::Idle),
            Phase::Idle
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running { .. })
    }

    pub fn state(&self) -> TimerState {
        match &self.phase {
            Phase::Idle => TimerState {
                status: TimerStatus::Idle,
                remaining_secs: 0,
                total_secs: 0,
                session_id: None,
                started_at: None,
            },
            Phase::Running { session, remaining } => TimerState {
                status: TimerStatus::Running,
                remaining_secs: *remaining,
                total_secs: session.total_secs,
                session_id: Some(session.id),
                started_at: Some(session.started_at),
            },
            Phase::Completed { session } => TimerState {
                status: TimerStatus::Completed,
                remaining_secs: 0,
                total_secs: session.total_secs,
                session_id: Some(session.id),
                started_at: Some(session.started_at),
            },
        }
    }
}

/// Render remaining seconds as `m:ss`.
pub fn format_remaining(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_session_completes() {
        let mut timer = FocusTimer::new();
        timer.start(600, Utc::now()).unwrap();

        for _ in 0..599 {
            assert!(matches!(timer.tick(), TickOutcome::Running { .. }));
        }
        assert_eq!(timer.tick(), TickOutcome::Completed);

        let state = timer.state();
        assert_eq!(state.status, TimerStatus::Completed);
        assert_eq!(state.remaining_secs, 0);
        assert_eq!(state.total_secs, 600);
    }

    #[test]
    fn test_exactly_d_ticks_for_any_duration() {
        for duration in 1..=90 {
            let mut timer = FocusTimer::new();
            timer.start(duration, Utc::now()).unwrap();

            for _ in 0..duration {
                let state = timer.state();
                assert!(state.remaining_secs <= state.total_secs);
                timer.tick();
            }

            let state = timer.state();
            assert_eq!(state.status, TimerStatus::Completed, "duration {duration}");
            assert_eq!(state.remaining_secs, 0);
        }
    }

    #[test]
    fn test_ticks_after_completion_are_ignored() {
        let mut timer = FocusTimer::new();
        timer.start(1, Utc::now()).unwrap();

        assert_eq!(timer.tick(), TickOutcome::Completed);
        assert_eq!(timer.tick(), TickOutcome::Ignored);
        assert_eq!(timer.state().remaining_secs, 0);
    }

    #[test]
    fn test_restart_replaces_session() {
        let mut timer = FocusTimer::new();
        let first = timer.start(300, Utc::now()).unwrap();
        timer.tick();

        let second = timer.start(60, Utc::now()).unwrap();

        assert_ne!(first.id, second.id);
        let state = timer.state();
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.remaining_secs, 60);
        assert_eq!(state.total_secs, 60);
        assert_eq!(state.session_id, Some(second.id));
    }

    #[test]
    fn test_start_after_completion() {
        let mut timer = FocusTimer::new();
        let first = timer.start(1, Utc::now()).unwrap();
        assert_eq!(timer.tick(), TickOutcome::Completed);

        let second = timer.start(30, Utc::now()).unwrap();

        assert_ne!(first.id, second.id);
        let state = timer.state();
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.remaining_secs, 30);
        assert_eq!(state.session_id, Some(second.id));
        assert_eq!(timer.tick(), TickOutcome::Running { remaining_secs: 29 });
    }

    #[test]
    fn test_rejected_start_keeps_running_session() {
        let mut timer = FocusTimer::new();
        let session = timer.start(10, Utc::now()).unwrap();
        timer.tick();

        assert_eq!(timer.start(0, Utc::now()), Err(FocusError::ZeroDuration));

        let state = timer.state();
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.remaining_secs, 9);
        assert_eq!(state.session_id, Some(session.id));
    }

    #[test]
    fn test_cancel_and_zero_duration() {
        let mut timer = FocusTimer::new();
        assert_eq!(timer.start(0, Utc::now()), Err(FocusError::ZeroDuration));
        assert!(!timer.cancel());

        timer.start(10, Utc::now()).unwrap();
        assert!(timer.cancel());
        assert_eq!(timer.state().status, TimerStatus::Idle);
        assert_eq!(timer.tick(), TickOutcome::Ignored);
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(600), "10:00");
        assert_eq!(format_remaining(65), "1:05");
        assert_eq!(format_remaining(0), "0:00");
    }
}
