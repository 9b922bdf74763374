//! The monitor: one serialized action queue driving both state machines.
//!
//! # Architecture
//!
//! ```text
//!  sampler trigger ──(gate → poll → classify)──┐
//!                                              ▼
//!  focus tick trigger ──────────────────▶ command queue ──▶ consumer task
//!                                              ▲            (AlertDebouncer,
//!  MonitorHandle (dismiss, focus, ...) ────────┘             FocusTimer)
//! ```
//!
//! Triggers only enqueue commands. All alert and timer state lives in the
//! consumer task, so transitions never interleave no matter how poll results
//! and ticks race.

use crate::audio::{AudioCue, AudioPlayback, AudioResource};
use crate::config::Config;
use crate::core::{
    classify, AlertDebouncer, AlertEffects, AlertPhase, ClearReason, FocusTimer, TickOutcome,
    TimerState, WatchList,
};
use crate::permission::{AccessChange, PermissionGate, PermissionProvider};
use crate::scheduler::{self, TriggerSlot};
use crate::usage::{UsageEvent, UsageQuery, UsageSampler};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

/// External capabilities the monitor consumes.
#[derive(Clone)]
pub struct Capabilities {
    pub usage: Arc<dyn UsageQuery>,
    pub permission: Arc<dyn PermissionProvider>,
    pub audio: Arc<dyn AudioPlayback>,
}

/// Runtime settings for a monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub lookback: Duration,
    pub capability_timeout: Duration,
    pub max_alert_duration: Option<Duration>,
    pub watch_list: WatchList,
    pub sound: AudioResource,
    /// Period of the focus tick source
    pub focus_tick: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for MonitorConfig {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            lookback: config.lookback,
            capability_timeout: config.capability_timeout,
            max_alert_duration: config.max_alert_duration,
            watch_list: config.watch_list.clone(),
            sound: config
                .alert_sound
                .clone()
                .map(AudioResource::File)
                .unwrap_or(AudioResource::Bell),
            focus_tick: Duration::from_secs(1),
        }
    }
}

/// Notifications for the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    AccessGranted,
    AccessDenied,
    AlertRaised {
        app_id: String,
        at: DateTime<Utc>,
        /// Motivational line to show with the reminder
        quote: String,
    },
    AlertCleared {
        reason: ClearReason,
    },
    FocusStarted {
        session_id: Uuid,
        total_secs: u64,
    },
    FocusTick {
        remaining_secs: u64,
    },
    FocusCompleted {
        session_id: Uuid,
    },
    FocusCancelled,
    FocusRejected {
        reason: String,
    },
}

/// Latest view of both state machines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub alert: AlertPhase,
    pub timer: TimerState,
    /// Last answer of the permission gate, if checked yet
    pub access_granted: Option<bool>,
}

/// The monitor has shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorStopped;

impl std::fmt::Display for MonitorStopped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Monitor is not running")
    }
}

impl std::error::Error for MonitorStopped {}

#[derive(Debug)]
enum Command {
    Sampled {
        at: DateTime<Utc>,
        matched: Option<UsageEvent>,
    },
    Access(AccessChange),
    Dismiss,
    StartFocus {
        duration_secs: u64,
    },
    CancelFocus,
    FocusTick {
        generation: u64,
    },
    Shutdown,
}

/// Cloneable handle for talking to a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    queue: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<MonitorEvent>,
    snapshot: watch::Receiver<MonitorSnapshot>,
    permission: Arc<dyn PermissionProvider>,
}

impl MonitorHandle {
    fn send(&self, command: Command) -> Result<(), MonitorStopped> {
        self.queue.send(command).map_err(|_| MonitorStopped)
    }

    /// User dismissed the break reminder.
    pub fn dismiss(&self) -> Result<(), MonitorStopped> {
        self.send(Command::Dismiss)
    }

    /// Start (or restart) a focus session.
    pub fn start_focus(&self, duration_secs: u64) -> Result<(), MonitorStopped> {
        self.send(Command::StartFocus { duration_secs })
    }

    pub fn cancel_focus(&self) -> Result<(), MonitorStopped> {
        self.send(Command::CancelFocus)
    }

    /// Ask the OS for usage access. The next sampler tick observes the result.
    pub fn request_access(&self) {
        tracing::info!("Requesting usage access");
        self.permission.request_access();
    }

    /// Stop the monitor and cancel all triggers. Dropping every handle
    /// (including the one in [`RunningMonitor`]) stops it too.
    pub fn shutdown(&self) -> Result<(), MonitorStopped> {
        self.send(Command::Shutdown)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshot.borrow().clone()
    }
}

/// A spawned monitor.
pub struct RunningMonitor {
    pub handle: MonitorHandle,
    /// Subscribed before the monitor started, so no event is missed
    pub events: broadcast::Receiver<MonitorEvent>,
    pub task: JoinHandle<()>,
}

/// Alert side effects: the audio cue and a notification to the shell.
struct ReminderEffects {
    cue: AudioCue,
    events: broadcast::Sender<MonitorEvent>,
}

impl AlertEffects for ReminderEffects {
    fn play_cue(&self) -> Result<(), crate::audio::AudioError> {
        self.cue.fire()
    }

    fn show_alert(&self, trigger: &UsageEvent, at: DateTime<Utc>) {
        let _ = self.events.send(MonitorEvent::AlertRaised {
            app_id: trigger.app_id.clone(),
            at,
            quote: crate::pick_quote().to_string(),
        });
    }

    fn hide_alert(&self, reason: ClearReason) {
        let _ = self.events.send(MonitorEvent::AlertCleared { reason });
    }
}

pub struct Monitor {
    config: MonitorConfig,
    capabilities: Capabilities,
    /// Weak so that dropping every handle ends the consumer
    queue: mpsc::WeakUnboundedSender<Command>,
    events: broadcast::Sender<MonitorEvent>,
    snapshot: watch::Sender<MonitorSnapshot>,
    debouncer: AlertDebouncer<ReminderEffects>,
    timer: FocusTimer,
    access_granted: Option<bool>,
    sampling: TriggerSlot,
    focus_ticks: TriggerSlot,
}

impl Monitor {
    /// Start sampling and return a handle to the running monitor.
    ///
    /// Must be called from within a Tokio runtime. The monitor stops on
    /// [`MonitorHandle::shutdown`] or when `shutdown` is cancelled.
    pub fn spawn(
        config: MonitorConfig,
        capabilities: Capabilities,
        shutdown: CancellationToken,
    ) -> RunningMonitor {
        let (queue, commands) = mpsc::unbounded_channel();
        let (events, first_subscriber) = broadcast::channel(EVENT_CAPACITY);

        let cue = AudioCue::new(Arc::clone(&capabilities.audio), config.capability_timeout);
        let debouncer = AlertDebouncer::new(ReminderEffects {
            cue,
            events: events.clone(),
        })
        .with_max_active(config.max_alert_duration);

        let timer = FocusTimer::new();
        let (snapshot, snapshot_rx) = watch::channel(MonitorSnapshot {
            alert: debouncer.phase().clone(),
            timer: timer.state(),
            access_granted: None,
        });

        let monitor_queue = queue.downgrade();
        let handle = MonitorHandle {
            queue,
            events: events.clone(),
            snapshot: snapshot_rx,
            permission: Arc::clone(&capabilities.permission),
        };

        let monitor = Monitor {
            config,
            capabilities,
            queue: monitor_queue,
            events,
            snapshot,
            debouncer,
            timer,
            access_granted: None,
            sampling: TriggerSlot::new("sampler"),
            focus_ticks: TriggerSlot::new("focus tick"),
        };
        let task = tokio::spawn(monitor.run(commands, shutdown));

        RunningMonitor {
            handle,
            events: first_subscriber,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) {
        // A failed or timed-out load leaves the cue silent
        let sound = self.config.sound.clone();
        let _ = self.debouncer.effects_mut().cue.load(&sound).await;

        self.start_sampling();
        tracing::info!(
            "Monitoring {} apps every {}s (lookback {}s)",
            self.config.watch_list.len(),
            self.config.poll_interval.as_secs_f32(),
            self.config.lookback.as_secs_f32()
        );

        loop {
            let command = tokio::select! {
                _ = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            if !self.handle(command) {
                break;
            }
            self.publish_snapshot();
        }

        self.sampling.cancel();
        self.focus_ticks.cancel();
        tracing::info!("Monitor stopped");
    }

    /// Apply one command. Returns false on shutdown.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Sampled { at, matched } => {
                self.debouncer.expire(at);
                if let Some(event) = matched {
                    self.debouncer.on_match(&event, at);
                }
            }
            Command::Access(change) => {
                let (granted, event) = match change {
                    AccessChange::Granted => (true, MonitorEvent::AccessGranted),
                    AccessChange::Denied => (false, MonitorEvent::AccessDenied),
                };
                self.access_granted = Some(granted);
                self.emit(event);
            }
            Command::Dismiss => {
                self.debouncer.dismiss();
            }
            Command::StartFocus { duration_secs } => self.start_focus(duration_secs),
            Command::CancelFocus => {
                self.focus_ticks.cancel();
                if self.timer.cancel() {
                    tracing::info!("Focus session cancelled");
                    self.emit(MonitorEvent::FocusCancelled);
                }
            }
            Command::FocusTick { generation } => self.on_focus_tick(generation),
            Command::Shutdown => return false,
        }
        true
    }

    fn start_sampling(&mut self) {
        let sampler = UsageSampler::new(
            Arc::clone(&self.capabilities.usage),
            self.config.lookback,
            self.config.capability_timeout,
        );
        let gate = PermissionGate::new(Arc::clone(&self.capabilities.permission));
        let watch_list = self.config.watch_list.clone();
        let period = self.config.poll_interval;
        let queue = self.queue.clone();

        self.sampling.install(move |_generation, cancel| {
            sampling_loop(sampler, gate, watch_list, period, queue, cancel)
        });
    }

    fn start_focus(&mut self, duration_secs: u64) {
        // A rejected start leaves the current session and its tick source alone
        let session = match self.timer.start(duration_secs, Utc::now()) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Focus session not started: {}", e);
                self.emit(MonitorEvent::FocusRejected {
                    reason: e.to_string(),
                });
                return;
            }
        };

        // install() cancels the previous source before the new one starts
        let queue = self.queue.clone();
        let period = self.config.focus_tick;
        self.focus_ticks.install(move |generation, cancel| {
            scheduler::run_periodic(period, false, cancel, move || {
                let delivered = enqueue(&queue, Command::FocusTick { generation });
                async move { delivered }
            })
        });

        tracing::info!(
            "Focus session {} started ({}s)",
            session.id,
            session.total_secs
        );
        self.emit(MonitorEvent::FocusStarted {
            session_id: session.id,
            total_secs: session.total_secs,
        });
    }

    fn on_focus_tick(&mut self, generation: u64) {
        if self.focus_ticks.generation() != Some(generation) {
            tracing::debug!("Dropping tick from superseded source #{}", generation);
            return;
        }

        match self.timer.tick() {
            TickOutcome::Running { remaining_secs } => {
                self.emit(MonitorEvent::FocusTick { remaining_secs });
            }
            TickOutcome::Completed => {
                self.focus_ticks.cancel();
                let state = self.timer.state();
                tracing::info!("Focus session completed ({}s)", state.total_secs);
                if let Some(session_id) = state.session_id {
                    self.emit(MonitorEvent::FocusCompleted { session_id });
                }
            }
            TickOutcome::Ignored => {}
        }
    }

    fn emit(&self, event: MonitorEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(MonitorSnapshot {
            alert: self.debouncer.phase().clone(),
            timer: self.timer.state(),
            access_granted: self.access_granted,
        });
    }
}

/// Send from a trigger. False once the monitor has stopped.
fn enqueue(queue: &mpsc::WeakUnboundedSender<Command>, command: Command) -> bool {
    match queue.upgrade() {
        Some(queue) => queue.send(command).is_ok(),
        None => false,
    }
}

/// Sampler trigger body: gate, poll, classify, enqueue.
async fn sampling_loop(
    sampler: UsageSampler,
    mut gate: PermissionGate,
    watch_list: WatchList,
    period: Duration,
    queue: mpsc::WeakUnboundedSender<Command>,
    cancel: CancellationToken,
) {
    let mut ticker = scheduler::ticker(period, true);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let (granted, change) = gate.check();
                if let Some(change) = change {
                    if !enqueue(&queue, Command::Access(change)) {
                        break;
                    }
                }
                if !granted {
                    continue;
                }

                let now = Utc::now();
                let matched = classify(sampler.poll(now).await, &watch_list);
                if !enqueue(&queue, Command::Sampled { at: now, matched }) {
                    break;
                }
            }
        }
    }
}
