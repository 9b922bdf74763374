//! Break-reminder debouncing.
//!
//! # State Machine
//!
//! ```text
//!            match (effects fire once)
//!   Idle ───────────────────────────────► Alerting ──┐
//!    ▲                                      │  ▲      │ match
//!    │        dismiss / max duration        │  └──────┘ (suppressed)
//!    └──────────────────────────────────────┘
//! ```
//!
//! Overlapping sampling windows re-deliver the same transition on
//! consecutive polls. While alerting, every further match is suppressed, so
//! one app switch plays the cue once and shows one reminder until the user
//! dismisses it.

use crate::usage::types::UsageEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Side effects of raising and clearing a break reminder.
pub trait AlertEffects {
    /// Start the audio cue. Failures are reported but never block the alert.
    fn play_cue(&self) -> Result<(), crate::audio::AudioError>;

    /// Make the reminder visible.
    fn show_alert(&self, trigger: &UsageEvent, at: DateTime<Utc>);

    /// Withdraw the reminder.
    fn hide_alert(&self, reason: ClearReason);
}

/// Current alert phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum AlertPhase {
    Idle,
    Alerting {
        /// App whose resume raised the alert
        app_id: String,
        /// When the alert was raised
        entered_at: DateTime<Utc>,
    },
}

/// What a classifier match did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Idle → Alerting, effects fired
    Triggered,
    /// Already alerting, nothing fired
    Suppressed,
}

/// Why an alert left the Alerting phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    Dismissed,
    Expired,
}

/// Two-phase alert state machine owning its side effects.
pub struct AlertDebouncer<E: AlertEffects> {
    phase: AlertPhase,
    effects: E,
    max_active: Option<chrono::Duration>,
}

impl<E: AlertEffects> AlertDebouncer<E> {
    pub fn new(effects: E) -> Self {
        Self {
            phase: AlertPhase::Idle,
            effects,
            max_active: None,
        }
    }

    /// Let an alert clear itself after `max_active` (see [`expire`](Self::expire)).
    pub fn with_max_active(mut self, max_active: Option<std::time::Duration>) -> Self {
        self.max_active = max_active.and_then(|d| chrono::Duration::from_std(d).ok());
        self
    }

    pub fn phase(&self) -> &AlertPhase {
        &self.phase
    }

    pub fn is_alerting(&self) -> bool {
        matches!(self.phase, AlertPhase::Alerting { .. })
    }

    pub fn effects(&self) -> &E {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut E {
        &mut self.effects
    }

    /// Feed a classifier match.
    pub fn on_match(&mut self, trigger: &UsageEvent, now: DateTime<Utc>) -> MatchOutcome {
        if self.is_alerting() {
            tracing::debug!("Alert already active, suppressing {}", trigger.app_id);
            return MatchOutcome::Suppressed;
        }

        if let Err(e) = self.effects.play_cue() {
            tracing::warn!("Break cue failed, showing silent reminder: {}", e);
        }
        self.effects.show_alert(trigger, now);
        self.phase = AlertPhase::Alerting {
            app_id: trigger.app_id.clone(),
            entered_at: now,
        };
        tracing::info!("Break reminder raised for {}", trigger.app_id);
        MatchOutcome::Triggered
    }

    /// User dismissal. Returns false if no alert was active.
    pub fn dismiss(&mut self) -> bool {
        self.clear(ClearReason::Dismissed)
    }

    /// Clear an alert that has been active longer than the configured
    /// maximum. Without a maximum this never clears anything.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        let expired = match (&self.phase, self.max_active) {
            (AlertPhase::Alerting { entered_at, .. }, Some(max)) => now - *entered_at >= max,
            _ => false,
        };
        expired && self.clear(ClearReason::Expired)
    }

    fn clear(&mut self, reason: ClearReason) -> bool {
        match std::mem::replace(&mut self.phase, AlertPhase::Idle) {
            AlertPhase::Idle => false,
            AlertPhase::Alerting { app_id, .. } => {
                self.effects.hide_alert(reason);
                tracing::info!("Break reminder for {} cleared ({:?})", app_id, reason);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioError;
    use chrono::Duration;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct CountingEffects {
        cues: Cell<u32>,
        shown: Cell<u32>,
        hidden: RefCell<Vec<ClearReason>>,
        fail_audio: bool,
    }

    impl AlertEffects for CountingEffects {
        fn play_cue(&self) -> Result<(), AudioError> {
            self.cues.set(self.cues.get() + 1);
            if self.fail_audio {
                Err(AudioError::PlaybackError("no output device".to_string()))
            } else {
                Ok(())
            }
        }

        fn show_alert(&self, _trigger: &UsageEvent, _at: DateTime<Utc>) {
            self.shown.set(self.shown.get() + 1);
        }

        fn hide_alert(&self, reason: ClearReason) {
            self.hidden.borrow_mut().push(reason);
        }
    }

    #[test]
    fn test_overlapping_polls_fire_once() {
        let t0 = Utc::now();
        let event = UsageEvent::resumed(t0 - Duration::seconds(2), "com.instagram.android");
        let mut debouncer = AlertDebouncer::new(CountingEffects::default());

        assert_eq!(debouncer.on_match(&event, t0), MatchOutcome::Triggered);
        // Same event re-delivered by the next overlapping window
        assert_eq!(
            debouncer.on_match(&event, t0 + Duration::seconds(5)),
            MatchOutcome::Suppressed
        );
        assert_eq!(
            debouncer.on_match(&event, t0 + Duration::seconds(10)),
            MatchOutcome::Suppressed
        );

        assert_eq!(debouncer.effects().cues.get(), 1);
        assert_eq!(debouncer.effects().shown.get(), 1);
        assert_eq!(
            debouncer.phase(),
            &AlertPhase::Alerting {
                app_id: "com.instagram.android".to_string(),
                entered_at: t0,
            }
        );
    }

    #[test]
    fn test_dismiss_rearms_detection() {
        let now = Utc::now();
        let event = UsageEvent::resumed(now, "com.twitter.android");
        let mut debouncer = AlertDebouncer::new(CountingEffects::default());

        assert!(!debouncer.dismiss());

        debouncer.on_match(&event, now);
        assert!(debouncer.dismiss());
        assert!(!debouncer.is_alerting());
        assert_eq!(*debouncer.effects().hidden.borrow(), vec![ClearReason::Dismissed]);

        assert_eq!(debouncer.on_match(&event, now), MatchOutcome::Triggered);
        assert_eq!(debouncer.effects().cues.get(), 2);
        assert_eq!(debouncer.effects().shown.get(), 2);
    }

    #[test]
    fn test_audio_failure_still_shows_alert() {
        let now = Utc::now();
        let effects = CountingEffects {
            fail_audio: true,
            ..Default::default()
        };
        let mut debouncer = AlertDebouncer::new(effects);

        let outcome = debouncer.on_match(&UsageEvent::resumed(now, "com.facebook.katana"), now);

        assert_eq!(outcome, MatchOutcome::Triggered);
        assert!(debouncer.is_alerting());
        assert_eq!(debouncer.effects().shown.get(), 1);
    }

    #[test]
    fn test_expire_only_with_max_duration() {
        let t0 = Utc::now();
        let event = UsageEvent::resumed(t0, "com.snapchat.android");

        let mut unbounded = AlertDebouncer::new(CountingEffects::default());
        unbounded.on_match(&event, t0);
        assert!(!unbounded.expire(t0 + Duration::hours(12)));
        assert!(unbounded.is_alerting());

        let mut bounded = AlertDebouncer::new(CountingEffects::default())
            .with_max_active(Some(std::time::Duration::from_secs(60)));
        bounded.on_match(&event, t0);
        assert!(!bounded.expire(t0 + Duration::seconds(59)));
        assert!(bounded.expire(t0 + Duration::seconds(60)));
        assert!(!bounded.is_alerting());
        assert_eq!(*bounded.effects().hidden.borrow(), vec![ClearReason::Expired]);
    }
}
