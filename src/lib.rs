//! Unscroll Agent - break reminders for distracting apps.
//!
//! This library watches foreground-app transitions, raises a single break
//! reminder (visual alert plus audio cue) when a watched app is opened, and
//! runs an independent focus countdown.
//!
//! # Guarantees
//!
//! - **One reminder per episode**: overlapping sampling windows never replay
//!   the cue or stack reminders; only a dismissal re-arms detection
//! - **No sampling without access**: the usage source is never queried while
//!   the permission gate is closed
//! - **Fail open**: query, playback and permission failures only make the
//!   feature quietly inactive
//! - **One countdown**: starting a focus session replaces the previous tick
//!   source
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Unscroll Agent                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ Permission  │──▶│   Usage     │──▶│  Watch-list │       │
//! │  │    Gate     │   │  Sampler    │   │ Classifier  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                              │              │
//! │                                              ▼              │
//! │  ┌─────────────┐    command queue    ┌─────────────┐       │
//! │  │ Focus Timer │◀───────────────────▶│   Alert     │       │
//! │  │ (1s ticks)  │                     │ Debouncer   │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use unscroll_agent::{
//!     AlwaysGranted, Capabilities, Monitor, MonitorConfig, ReplayUsageSource, TerminalBell,
//! };
//!
//! # async fn run() {
//! let capabilities = Capabilities {
//!     usage: Arc::new(ReplayUsageSource::new("events.jsonl")),
//!     permission: Arc::new(AlwaysGranted),
//!     audio: Arc::new(TerminalBell),
//! };
//! let mut monitor = Monitor::spawn(MonitorConfig::default(), capabilities, CancellationToken::new());
//!
//! while let Ok(event) = monitor.events.recv().await {
//!     println!("{event:?}");
//! }
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod core;
pub mod monitor;
pub mod permission;
pub mod scheduler;
pub mod usage;

// Re-export key types at crate root for convenience
pub use audio::{AudioCue, AudioError, AudioPlayback, AudioResource, TerminalBell};
pub use config::{Config, ConfigError};
pub use core::{classify, AlertDebouncer, AlertPhase, FocusTimer, TimerState, WatchList};
pub use monitor::{
    Capabilities, Monitor, MonitorConfig, MonitorEvent, MonitorHandle, MonitorSnapshot,
    MonitorStopped, RunningMonitor,
};
pub use permission::{AlwaysGranted, ManualPermission, PermissionGate, PermissionProvider};
pub use usage::{QueryError, ReplayUsageSource, UsageEvent, UsageQuery, UsageSampler};

#[cfg(feature = "audio")]
pub use audio::RodioPlayer;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lines shown with a break reminder, one picked per alert.
pub const MOTIVATIONAL_QUOTES: [&str; 4] = [
    "Disconnect to reconnect.",
    "Your mind deserves a break.",
    "Be present, not just online.",
    "Small steps, big changes.",
];

/// Pick a motivational line at random.
pub fn pick_quote() -> &'static str {
    use rand::seq::SliceRandom;

    MOTIVATIONAL_QUOTES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(MOTIVATIONAL_QUOTES[0])
}

/// Render the break reminder box around `quote`.
pub fn break_reminder(quote: &str) -> String {
    const WIDTH: usize = 66;
    let line = |text: &str| format!("║  {:<width$}║", text, width = WIDTH - 2);

    [
        format!("╔{}╗", "═".repeat(WIDTH)),
        format!("║{:^width$}║", "TAKE A BREAK!", width = WIDTH),
        format!("╠{}╣", "═".repeat(WIDTH)),
        line(""),
        line("You just opened a social app."),
        line(""),
        line(&format!("  \"{quote}\"")),
        line(""),
        line("Type `d` and press Enter to dismiss."),
        format!("╚{}╝", "═".repeat(WIDTH)),
    ]
    .join("\n")
}
