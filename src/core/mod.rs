//! Core state machines for the Unscroll agent.
//!
//! This module contains:
//! - Watch-list classification of usage batches
//! - The break-reminder debouncer
//! - The focus session countdown

pub mod classifier;
pub mod debouncer;
pub mod focus;

// Re-export commonly used types
pub use classifier::{classify, WatchList, DEFAULT_WATCHED_APPS};
pub use debouncer::{AlertDebouncer, AlertEffects, AlertPhase, ClearReason, MatchOutcome};
pub use focus::{
    format_remaining, FocusError, FocusSession, FocusTimer, TickOutcome, TimerState, TimerStatus,
    FOCUS_PRESETS_MINUTES,
};
