//! Sound playback through `rodio`.
//!
//! Output streams are not `Send`, so a dedicated thread owns the stream and
//! sink and receives commands over a channel.

use super::{AudioError, AudioHandle, AudioPlayback, AudioResource};
use crossbeam_channel::{unbounded, Sender};
use rodio::source::{SineWave, Source};
use rodio::{Decoder, OutputStream, Sink};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const BELL_FREQUENCY_HZ: f32 = 880.0;
const BELL_LENGTH: Duration = Duration::from_millis(300);

#[derive(Clone)]
enum Sound {
    Tone,
    Clip(Arc<[u8]>),
}

enum AudioCommand {
    Play(Sound),
}

/// Plays cue sounds on the default output device.
pub struct RodioPlayer {
    tx: Mutex<Option<Sender<AudioCommand>>>,
    sounds: Mutex<HashMap<u64, Sound>>,
    next_id: AtomicU64,
}

impl Default for RodioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl RodioPlayer {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
            sounds: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, AudioError> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|e| AudioError::PlaybackError(e.to_string()))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = unbounded::<AudioCommand>();

        thread::Builder::new()
            .name("audio-cue".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to open audio output: {e}"))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {e}"))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play(sound) => {
                            if let Err(e) = ensure_sink(&mut _stream, &mut sink) {
                                tracing::warn!("{}", e);
                                continue;
                            }
                            let Some(ref s) = sink else { continue };
                            match sound {
                                Sound::Tone => s.append(
                                    SineWave::new(BELL_FREQUENCY_HZ)
                                        .take_duration(BELL_LENGTH)
                                        .amplify(0.2),
                                ),
                                Sound::Clip(bytes) => match Decoder::new(Cursor::new(bytes)) {
                                    Ok(source) => s.append(source),
                                    Err(e) => tracing::warn!("Could not decode cue sound: {}", e),
                                },
                            }
                        }
                    }
                }
            })
            .map_err(|e| AudioError::PlaybackError(e.to_string()))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl AudioPlayback for RodioPlayer {
    fn load(&self, resource: &AudioResource) -> Result<AudioHandle, AudioError> {
        let sound = match resource {
            AudioResource::Bell => Sound::Tone,
            AudioResource::File(path) => {
                let bytes: Arc<[u8]> = std::fs::read(path)
                    .map_err(|e| AudioError::LoadError(format!("{}: {e}", path.display())))?
                    .into();
                // Reject undecodable files up front
                Decoder::new(Cursor::new(Arc::clone(&bytes)))
                    .map_err(|e| AudioError::LoadError(format!("{}: {e}", path.display())))?;
                Sound::Clip(bytes)
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sounds
            .lock()
            .map_err(|e| AudioError::LoadError(e.to_string()))?
            .insert(id, sound);
        Ok(AudioHandle(id))
    }

    fn play(&self, handle: AudioHandle) -> Result<(), AudioError> {
        let sound = self
            .sounds
            .lock()
            .map_err(|e| AudioError::PlaybackError(e.to_string()))?
            .get(&handle.0)
            .cloned()
            .ok_or(AudioError::NotLoaded)?;

        self.ensure_thread()?
            .send(AudioCommand::Play(sound))
            .map_err(|e| AudioError::PlaybackError(e.to_string()))
    }
}
