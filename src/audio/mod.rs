//! Agent speech output: pending-audio slot → 20 ms pacer → media sink.
//!
//! # Pipeline
//!
//! ```text
//! speak_now / maybe_speak / interrupt
//!        │
//!        ▼
//! PendingAudioSlot (latest wins, empty = stop)
//!        │  adopted once per frame
//!        ▼
//! AudioOutputPacer thread ──▶ MediaSink::send(frame)
//!        │
//!        └──▶ PlaybackObserver (Started / Stopped / Amplitude)
//! ```
//!
//! Producers only ever talk to the [`SpeechOutput`] seam, so the
//! conversation logic can be tested against a recording double.

use std::sync::Arc;

pub mod amplitude;
pub mod pacer;
pub mod slot;

pub use amplitude::peak_amplitude;
pub use pacer::{AudioOutputPacer, PacerError};
pub use slot::PendingAudioSlot;

/// Raw signed 16-bit little-endian PCM, shared without copying between the
/// phrase cache, synthesis tasks and the pacer.
///
/// A zero-length buffer written to the slot is the stop sentinel.
pub type AudioBuffer = Arc<[u8]>;

// ---------------------------------------------------------------------------
// SpeechOutput
// ---------------------------------------------------------------------------

/// Write side of the audio output.
///
/// Every method returns immediately; nothing here waits for playback.
pub trait SpeechOutput: Send + Sync {
    /// Play `buffer` on the next frame, replacing anything pending or
    /// playing.
    fn speak_now(&self, buffer: AudioBuffer);

    /// Play `buffer` only if the output is idle.  Returns whether it was
    /// accepted.
    fn maybe_speak(&self, buffer: AudioBuffer) -> bool;

    /// Stop playback at the next frame boundary.
    fn interrupt(&self);
}

// ---------------------------------------------------------------------------
// Playback events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    Started,
    Stopped,
    /// Peak amplitude of the frame just sent, `0.0..=1.0`.
    Amplitude(f32),
}

/// Receives [`PlaybackEvent`]s on the pacer thread.
pub trait PlaybackObserver: Send + Sync {
    fn on_playback(&self, event: PlaybackEvent);
}
