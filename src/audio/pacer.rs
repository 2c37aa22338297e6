//! Fixed-period audio output loop.
//!
//! [`AudioOutputPacer`] owns a dedicated OS thread that wakes once per sink
//! frame (20 ms by default), adopts whatever is waiting in the
//! [`PendingAudioSlot`], and streams the current buffer to the sink one
//! frame-sized slice at a time.
//!
//! # Tick
//!
//! ```text
//! slot non-empty? ── zero-length ──▶ stop playback, emit Stopped
//!        │
//!        └──────── buffer ─────────▶ current = buffer, cursor = 0, emit Started
//!
//! playing? ──▶ emit Amplitude(peak of window)
//!          ──▶ sink.send(current[cursor..cursor+stride], zero padded)
//!          ──▶ cursor += stride; end reached ──▶ emit Stopped
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::AudioConfig;
use crate::media::{FrameBuffer, FramePacer, MediaSink};

use super::amplitude::peak_amplitude;
use super::slot::PendingAudioSlot;
use super::{AudioBuffer, PlaybackEvent, PlaybackObserver, SpeechOutput};

// ---------------------------------------------------------------------------
// PacerError
// ---------------------------------------------------------------------------

/// Failures of the one-time start sequence of a pacer.
#[derive(Debug, Error)]
pub enum PacerError {
    /// The frame geometry yields zero-sized frames.
    #[error("invalid frame format: {0}")]
    InvalidFormat(String),

    /// `start` was called after `stop`.
    #[error("pacer has already been stopped")]
    Stopped,

    #[error("failed to spawn pacer thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The worker thread failed while initialising.
    #[error("pacer failed to start: {0}")]
    Init(String),
}

// ---------------------------------------------------------------------------
// PlaybackEvents
// ---------------------------------------------------------------------------

/// Observer registry shared with the pacer thread.
#[derive(Default)]
pub(crate) struct PlaybackEvents {
    observers: Mutex<Vec<Arc<dyn PlaybackObserver>>>,
}

impl PlaybackEvents {
    fn subscribe(&self, observer: Arc<dyn PlaybackObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(observer);
    }

    fn emit(&self, event: PlaybackEvent) {
        let observers = self.observers.lock().unwrap_or_else(|e| e.into_inner());
        for observer in observers.iter() {
            observer.on_playback(event);
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackCore — one tick of the loop, independent of the thread
// ---------------------------------------------------------------------------

pub(crate) struct PlaybackCore {
    slot: Arc<PendingAudioSlot>,
    events: Arc<PlaybackEvents>,
    sink: Arc<dyn MediaSink>,
    frame: FrameBuffer,
    current: Option<AudioBuffer>,
    cursor: usize,
}

impl PlaybackCore {
    pub(crate) fn new(
        slot: Arc<PendingAudioSlot>,
        events: Arc<PlaybackEvents>,
        sink: Arc<dyn MediaSink>,
        frame_bytes: usize,
    ) -> Self {
        Self {
            slot,
            events,
            sink,
            frame: FrameBuffer::new(frame_bytes),
            current: None,
            cursor: 0,
        }
    }

    pub(crate) fn tick(&mut self) {
        if let Some(next) = self.slot.adopt() {
            self.cursor = 0;
            if next.is_empty() {
                self.current = None;
                log::debug!("audio-pacer: interrupted");
                self.events.emit(PlaybackEvent::Stopped);
            } else {
                self.current = Some(next);
                self.events.emit(PlaybackEvent::Started);
            }
        }

        let Some(current) = self.current.clone() else {
            return;
        };

        let stride = self.frame.capacity();
        let window_end = (self.cursor + stride).min(current.len());
        let window = current.get(self.cursor..window_end).unwrap_or(&[]);
        self.events
            .emit(PlaybackEvent::Amplitude(peak_amplitude(window)));

        self.frame.fill_from(&current, self.cursor);
        if let Err(e) = self.sink.send(self.frame.as_slice()) {
            log::warn!("audio-pacer: sink send failed: {e}");
        }

        self.cursor += stride;
        if self.cursor >= current.len() {
            self.current = None;
            self.slot.finish_playback();
            self.events.emit(PlaybackEvent::Stopped);
        }
    }
}

// ---------------------------------------------------------------------------
// AudioOutputPacer
// ---------------------------------------------------------------------------

/// Turns the pending-audio slot into a steady stream of sink frames.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use voice_call_agent::audio::{AudioBuffer, AudioOutputPacer, SpeechOutput};
/// use voice_call_agent::config::AudioConfig;
/// use voice_call_agent::media::NullSink;
///
/// # async fn example() {
/// let pacer = AudioOutputPacer::new(AudioConfig::default());
/// pacer.start(Arc::new(NullSink::new())).unwrap();
/// pacer.speak_now(AudioBuffer::from(vec![0u8; 9_600]));
/// pacer.stop().await;
/// # }
/// ```
pub struct AudioOutputPacer {
    format: AudioConfig,
    slot: Arc<PendingAudioSlot>,
    events: Arc<PlaybackEvents>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    launched: AtomicBool,
}

impl AudioOutputPacer {
    pub fn new(format: AudioConfig) -> Self {
        Self {
            format,
            slot: Arc::new(PendingAudioSlot::new()),
            events: Arc::new(PlaybackEvents::default()),
            cancel: CancellationToken::new(),
            worker: Mutex::new(None),
            launched: AtomicBool::new(false),
        }
    }

    /// Register an observer for started / stopped / amplitude events.
    ///
    /// Observers run on the pacer thread and must not block.
    pub fn subscribe(&self, observer: Arc<dyn PlaybackObserver>) {
        self.events.subscribe(observer);
    }

    /// Bind `sink` and launch the loop.  Only the first call launches;
    /// later calls return `Ok(())` without side effects.
    pub fn start(&self, sink: Arc<dyn MediaSink>) -> Result<(), PacerError> {
        if self.cancel.is_cancelled() {
            return Err(PacerError::Stopped);
        }
        let frame_bytes = self.format.frame_bytes();
        if frame_bytes == 0 {
            return Err(PacerError::InvalidFormat(format!(
                "{} Hz x {} ch x {} ms",
                self.format.sample_rate, self.format.channels, self.format.frame_ms
            )));
        }
        if self.launched.swap(true, Ordering::AcqRel) {
            log::debug!("audio-pacer: start called twice, ignoring");
            return Ok(());
        }

        let mut core = PlaybackCore::new(
            Arc::clone(&self.slot),
            Arc::clone(&self.events),
            sink,
            frame_bytes,
        );
        let cancel = self.cancel.clone();
        let period = self.format.frame_duration();

        let spawned = std::thread::Builder::new()
            .name("audio-pacer".into())
            .spawn(move || {
                log::info!("audio-pacer: started ({frame_bytes} bytes / {period:?})");
                let mut pacer = FramePacer::new(period);
                while !cancel.is_cancelled() {
                    core.tick();
                    pacer.wait_next();
                }
                log::info!("audio-pacer: stopped");
            });

        match spawned {
            Ok(handle) => {
                *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.launched.store(false, Ordering::Release);
                Err(PacerError::Spawn(e))
            }
        }
    }

    /// Request cooperative cancellation and wait for the loop to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            match tokio::task::spawn_blocking(move || handle.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => log::error!("audio-pacer: worker thread panicked"),
                Err(e) => log::error!("audio-pacer: join task failed: {e}"),
            }
        }
    }

    /// The slot this pacer reads from.
    pub fn slot(&self) -> &Arc<PendingAudioSlot> {
        &self.slot
    }

    pub fn is_playing(&self) -> bool {
        self.slot.is_playing()
    }
}

impl SpeechOutput for AudioOutputPacer {
    fn speak_now(&self, buffer: AudioBuffer) {
        self.slot.speak_now(buffer);
    }

    fn maybe_speak(&self, buffer: AudioBuffer) -> bool {
        self.slot.maybe_speak(buffer)
    }

    fn interrupt(&self) {
        self.slot.interrupt();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
