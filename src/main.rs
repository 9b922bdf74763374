//! Unscroll Agent CLI
//!
//! Break reminders for distracting apps, with a focus countdown.

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use unscroll_agent::{
    audio::AudioPlayback,
    config::Config,
    core::{format_remaining, ClearReason, TimerStatus},
    monitor::{Capabilities, Monitor, MonitorConfig, MonitorEvent, MonitorHandle, RunningMonitor},
    permission::AlwaysGranted,
    usage::{format_screen_time, screen_time_today, ReplayUsageSource},
    break_reminder, VERSION,
};

#[derive(Parser)]
#[command(name = "unscroll")]
#[command(author = "Unscroll")]
#[command(version = VERSION)]
#[command(about = "Break reminders for distracting apps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch for distracting apps and show break reminders
    Watch {
        /// Usage events file (JSON Lines); defaults to the configured path
        #[arg(long)]
        events: Option<PathBuf>,

        /// Start a focus session of this many minutes right away
        #[arg(long)]
        focus: Option<u64>,
    },

    /// Show today's screen time
    ScreenTime {
        /// Usage events file (JSON Lines); defaults to the configured path
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Manage the watch-list
    Apps {
        #[command(subcommand)]
        action: AppsAction,
    },

    /// Show focus session presets
    Presets,

    /// Show configuration
    Config,
}

#[derive(Subcommand)]
enum AppsAction {
    /// List watched apps
    List,
    /// Watch an app
    Add { app_id: String },
    /// Stop watching an app
    Remove { app_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { events, focus } => cmd_watch(events, focus).await,
        Commands::ScreenTime { events } => cmd_screen_time(events).await,
        Commands::Apps { action } => cmd_apps(action),
        Commands::Presets => cmd_presets(),
        Commands::Config => cmd_config(),
    }
}

async fn cmd_watch(events_path: Option<PathBuf>, focus: Option<u64>) -> anyhow::Result<()> {
    println!("Unscroll Agent v{VERSION}");
    println!();

    let config = Config::load().context("Could not load configuration")?;
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let events_path = events_path.unwrap_or_else(|| config.events_path.clone());
    if config.watch_list.is_empty() {
        eprintln!("Warning: The watch-list is empty, no reminders will be shown.");
        eprintln!("Add apps with `unscroll apps add <app-id>`.");
    }

    println!("Starting monitor...");
    println!("  Watched apps: {}", config.watch_list.len());
    println!("  Events file: {events_path:?}");
    println!(
        "  Poll interval: {}s (lookback {}s)",
        config.poll_interval.as_secs(),
        config.lookback.as_secs()
    );
    println!();
    println!("Commands: d = dismiss, f <minutes> = focus, c = cancel focus, s = status, q = quit");
    println!("Press Ctrl+C to stop");
    println!();

    let capabilities = Capabilities {
        usage: Arc::new(ReplayUsageSource::new(&events_path)),
        permission: Arc::new(AlwaysGranted),
        audio: audio_player(&config),
    };

    let shutdown = CancellationToken::new();
    ctrlc_handler(shutdown.clone())?;

    let RunningMonitor {
        handle,
        mut events,
        task,
    } = Monitor::spawn(MonitorConfig::from(&config), capabilities, shutdown.clone());

    if let Some(minutes) = focus {
        let secs = focus_secs(minutes)
            .with_context(|| format!("--focus {minutes} is out of range"))?;
        handle.start_focus(secs)?;
    }

    spawn_stdin_reader(handle.clone(), shutdown.clone());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => render_event(&event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Display fell behind, {} notifications skipped", missed);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    println!();
    println!("Stopping monitor...");
    let _ = handle.shutdown();
    if let Err(e) = task.await {
        eprintln!("Monitor task failed: {e}");
    }

    Ok(())
}

async fn cmd_screen_time(events_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load().context("Could not load configuration")?;
    let events_path = events_path.unwrap_or(config.events_path.clone());

    let total = screen_time_today(
        Arc::new(ReplayUsageSource::new(events_path)),
        Local::now(),
        config.capability_timeout,
    )
    .await;

    println!("Screen time today: {}", format_screen_time(total));
    Ok(())
}

fn cmd_apps(action: AppsAction) -> anyhow::Result<()> {
    let mut config = Config::load().context("Could not load configuration")?;

    match action {
        AppsAction::List => {
            println!("Watched apps");
            println!("============");
            for app in config.watch_list.iter() {
                println!("  {app}");
            }
            return Ok(());
        }
        AppsAction::Add { app_id } => {
            if config.watch_list.add(app_id.clone()) {
                println!("Now watching {app_id}.");
            } else {
                println!("{app_id} is already watched.");
                return Ok(());
            }
        }
        AppsAction::Remove { app_id } => {
            if config.watch_list.remove(&app_id) {
                println!("Stopped watching {app_id}.");
            } else {
                println!("{app_id} is not on the watch-list.");
                return Ok(());
            }
        }
    }

    config.save().context("Could not save configuration")?;
    Ok(())
}

fn cmd_presets() -> anyhow::Result<()> {
    let config = Config::load().context("Could not load configuration")?;

    println!("Focus presets");
    println!("=============");
    for minutes in &config.focus_presets_minutes {
        if let Some(secs) = focus_secs(*minutes) {
            println!("  {:>3} min  ({})", minutes, format_remaining(secs));
        }
    }
    println!();
    println!("Start one with `unscroll watch --focus <minutes>`.");
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().context("Could not load configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn render_event(event: &MonitorEvent) {
    let now = Local::now().format("%H:%M:%S");

    match event {
        MonitorEvent::AccessGranted => println!("[{now}] Usage access granted, monitoring."),
        MonitorEvent::AccessDenied => {
            println!("[{now}] Usage access not granted. Monitoring paused until it is.")
        }
        MonitorEvent::AlertRaised { app_id, quote, .. } => {
            println!();
            println!("{}", break_reminder(quote));
            println!("[{now}] Opened {app_id}");
        }
        MonitorEvent::AlertCleared { reason } => match reason {
            ClearReason::Dismissed => println!("[{now}] Reminder dismissed."),
            ClearReason::Expired => println!("[{now}] Reminder expired."),
        },
        MonitorEvent::FocusStarted { total_secs, .. } => {
            println!("[{now}] Focus session started ({})", format_remaining(*total_secs));
        }
        MonitorEvent::FocusTick { remaining_secs } => {
            if remaining_secs % 60 == 0 || *remaining_secs <= 5 {
                println!("[{now}] {} remaining", format_remaining(*remaining_secs));
            }
        }
        MonitorEvent::FocusCompleted { .. } => println!("[{now}] Focus session complete!"),
        MonitorEvent::FocusCancelled => println!("[{now}] Focus session cancelled."),
        MonitorEvent::FocusRejected { reason } => eprintln!("Error: {reason}"),
    }
}

fn print_status(handle: &MonitorHandle) {
    let snapshot = handle.snapshot();

    println!("Status");
    println!("======");
    println!(
        "  Usage access: {}",
        match snapshot.access_granted {
            Some(true) => "Granted ✓",
            Some(false) => "Not Granted ✗",
            None => "Unknown",
        }
    );
    match snapshot.alert {
        unscroll_agent::AlertPhase::Idle => println!("  Reminder: none"),
        unscroll_agent::AlertPhase::Alerting { app_id, entered_at } => println!(
            "  Reminder: showing for {app_id} since {}",
            entered_at.with_timezone(&Local).format("%H:%M:%S")
        ),
    }
    match snapshot.timer.status {
        TimerStatus::Idle => println!("  Focus: idle"),
        TimerStatus::Running => println!(
            "  Focus: {} of {} remaining",
            format_remaining(snapshot.timer.remaining_secs),
            format_remaining(snapshot.timer.total_secs)
        ),
        TimerStatus::Completed => println!(
            "  Focus: completed ({})",
            format_remaining(snapshot.timer.total_secs)
        ),
    }
}

/// Session length in seconds, or None if `minutes` overflows.
fn focus_secs(minutes: u64) -> Option<u64> {
    minutes.checked_mul(60)
}

/// Read interactive commands from stdin on a background thread.
fn spawn_stdin_reader(handle: MonitorHandle, shutdown: CancellationToken) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let mut parts = line.split_whitespace();

            let result = match (parts.next(), parts.next()) {
                (Some("d" | "dismiss"), _) => handle.dismiss(),
                (Some("c" | "cancel"), _) => handle.cancel_focus(),
                (Some("f" | "focus"), Some(minutes)) => {
                    match minutes.parse::<u64>().ok().and_then(focus_secs) {
                        Some(secs) => handle.start_focus(secs),
                        None => {
                            eprintln!("Usage: f <minutes>");
                            Ok(())
                        }
                    }
                }
                (Some("f" | "focus"), None) => {
                    eprintln!("Usage: f <minutes>");
                    Ok(())
                }
                (Some("a" | "access"), _) => {
                    handle.request_access();
                    Ok(())
                }
                (Some("s" | "status"), _) => {
                    print_status(&handle);
                    Ok(())
                }
                (Some("q" | "quit"), _) => {
                    shutdown.cancel();
                    break;
                }
                (Some(other), _) => {
                    eprintln!("Unknown command: {other}");
                    Ok(())
                }
                (None, _) => Ok(()),
            };

            if result.is_err() {
                break;
            }
        }
    });
}

/// Pick the cue player for this build.
fn audio_player(config: &Config) -> Arc<dyn AudioPlayback> {
    #[cfg(feature = "audio")]
    {
        let _ = config;
        Arc::new(unscroll_agent::RodioPlayer::new())
    }

    #[cfg(not(feature = "audio"))]
    {
        if config.alert_sound.is_some() {
            eprintln!("Warning: alert_sound ignored (audio feature not enabled at compile time)");
        }
        Arc::new(unscroll_agent::TerminalBell)
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(shutdown: CancellationToken) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        shutdown.cancel();
    })
    .context("Error setting Ctrl+C handler")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_secs_rejects_overflow() {
        assert_eq!(focus_secs(25), Some(1_500));
        assert_eq!(focus_secs(0), Some(0));
        assert_eq!(focus_secs(307_445_734_561_825_861), None);
        assert_eq!(focus_secs(u64::MAX / 60), Some(u64::MAX / 60 * 60));
    }

    #[test]
    fn test_watch_args_parse() {
        let cli = Cli::try_parse_from(["unscroll", "watch", "--focus", "15"]).unwrap();
        match cli.command {
            Commands::Watch { focus, events } => {
                assert_eq!(focus, Some(15));
                assert!(events.is_none());
            }
            _ => panic!("expected watch"),
        }
    }
}
