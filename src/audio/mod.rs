//! Audio cue playback.
//!
//! Playback is best-effort everywhere: a missing sound, a failed decode or a
//! stuck output device only costs the audio cue, never the reminder.

#[cfg(feature = "audio")]
pub mod rodio_player;

#[cfg(feature = "audio")]
pub use rodio_player::RodioPlayer;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Sound the cue should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioResource {
    /// The terminal/system bell
    Bell,
    /// A sound file on disk
    File(PathBuf),
}

/// Opaque handle to a loaded sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioHandle(pub u64);

/// Audio-playback capability.
pub trait AudioPlayback: Send + Sync {
    fn load(&self, resource: &AudioResource) -> Result<AudioHandle, AudioError>;

    /// Start playing a loaded sound. May block until playback is queued.
    fn play(&self, handle: AudioHandle) -> Result<(), AudioError>;
}

/// Errors that can occur during audio playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    LoadError(String),
    PlaybackError(String),
    Timeout(Duration),
    NotLoaded,
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::LoadError(e) => write!(f, "Could not load sound: {e}"),
            AudioError::PlaybackError(e) => write!(f, "Playback failed: {e}"),
            AudioError::Timeout(d) => write!(f, "Playback timed out after {}ms", d.as_millis()),
            AudioError::NotLoaded => write!(f, "No sound loaded"),
        }
    }
}

impl std::error::Error for AudioError {}

/// Rings the terminal bell. Ignores sound files.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl AudioPlayback for TerminalBell {
    fn load(&self, _resource: &AudioResource) -> Result<AudioHandle, AudioError> {
        Ok(AudioHandle(0))
    }

    fn play(&self, _handle: AudioHandle) -> Result<(), AudioError> {
        let mut stdout = std::io::stdout();
        stdout
            .write_all(b"\x07")
            .and_then(|_| stdout.flush())
            .map_err(|e| AudioError::PlaybackError(e.to_string()))
    }
}

/// The break cue: a sound loaded once, fired in the background.
#[derive(Clone)]
pub struct AudioCue {
    player: Arc<dyn AudioPlayback>,
    handle: Option<AudioHandle>,
    timeout: Duration,
}

impl AudioCue {
    /// A silent cue on `player`. Call [`load`](Self::load) to give it a sound.
    pub fn new(player: Arc<dyn AudioPlayback>, timeout: Duration) -> Self {
        Self {
            player,
            handle: None,
            timeout,
        }
    }

    /// Load `resource` on the blocking pool, bounded by the cue timeout.
    ///
    /// A failed or timed-out load leaves the cue silent.
    pub async fn load(&mut self, resource: &AudioResource) -> Result<(), AudioError> {
        let player = Arc::clone(&self.player);
        let resource = resource.clone();

        let load = tokio::task::spawn_blocking(move || player.load(&resource));
        let loaded = match tokio::time::timeout(self.timeout, load).await {
            Ok(Ok(loaded)) => loaded,
            Ok(Err(e)) => Err(AudioError::LoadError(format!("load task failed: {e}"))),
            Err(_) => Err(AudioError::Timeout(self.timeout)),
        };

        match loaded {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Break cue unavailable, reminders will be silent: {}", e);
                self.handle = None;
                Err(e)
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    /// Start playback without waiting for it.
    ///
    /// Must be called from within a Tokio runtime. Errors after scheduling
    /// are logged by the background task.
    pub fn fire(&self) -> Result<(), AudioError> {
        let handle = self.handle.ok_or(AudioError::NotLoaded)?;
        let player = Arc::clone(&self.player);
        let timeout = self.timeout;

        tokio::spawn(async move {
            let result =
                tokio::time::timeout(timeout, tokio::task::spawn_blocking(move || player.play(handle)))
                    .await;
            match result {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => tracing::warn!("Break cue failed: {}", e),
                Ok(Err(e)) => tracing::warn!("Break cue task failed: {}", e),
                Err(_) => tracing::warn!("Break cue failed: {}", AudioError::Timeout(timeout)),
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyPlayer {
        loads_ok: bool,
        plays: AtomicU32,
    }

    impl AudioPlayback for FlakyPlayer {
        fn load(&self, resource: &AudioResource) -> Result<AudioHandle, AudioError> {
            if self.loads_ok {
                Ok(AudioHandle(7))
            } else {
                Err(AudioError::LoadError(format!("{resource:?} missing")))
            }
        }

        fn play(&self, handle: AudioHandle) -> Result<(), AudioError> {
            assert_eq!(handle, AudioHandle(7));
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SlowLoader;

    impl AudioPlayback for SlowLoader {
        fn load(&self, _resource: &AudioResource) -> Result<AudioHandle, AudioError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(AudioHandle(1))
        }

        fn play(&self, _handle: AudioHandle) -> Result<(), AudioError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_load_failure_leaves_cue_silent() {
        let player = Arc::new(FlakyPlayer {
            loads_ok: false,
            plays: AtomicU32::new(0),
        });
        let mut cue = AudioCue::new(player.clone(), Duration::from_secs(1));

        let result = cue
            .load(&AudioResource::File(PathBuf::from("calm.mp3")))
            .await;

        assert!(matches!(result, Err(AudioError::LoadError(_))));
        assert!(!cue.is_loaded());
        assert_eq!(cue.fire(), Err(AudioError::NotLoaded));
        assert_eq!(player.plays.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hung_load_times_out_silent() {
        let mut cue = AudioCue::new(Arc::new(SlowLoader), Duration::from_millis(20));

        let result = cue.load(&AudioResource::Bell).await;

        assert_eq!(result, Err(AudioError::Timeout(Duration::from_millis(20))));
        assert!(!cue.is_loaded());
    }

    #[tokio::test]
    async fn test_fire_plays_in_background() {
        let player = Arc::new(FlakyPlayer {
            loads_ok: true,
            plays: AtomicU32::new(0),
        });
        let mut cue = AudioCue::new(player.clone(), Duration::from_secs(1));
        cue.load(&AudioResource::Bell).await.unwrap();
        assert!(cue.is_loaded());

        cue.fire().unwrap();

        for _ in 0..100 {
            if player.plays.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(player.plays.load(Ordering::SeqCst), 1);
    }
}
