//! Outbound media sinks.
//!
//! A [`MediaSink`] is the far end of an audio or video pacer: the call
//! transport's raw outgoing stream in production, a file or a counter in the
//! console build and in tests.  Sinks are called from the pacer's dedicated
//! thread, so `send` is synchronous.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use thiserror::Error;

// ---------------------------------------------------------------------------
// StreamState / SinkError
// ---------------------------------------------------------------------------

/// Lifecycle state reported by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Stopped,
    Starting,
    Started,
}

/// Errors returned by [`MediaSink::send`].
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink is not started")]
    NotStarted,

    #[error("sink I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink rejected frame: {0}")]
    Rejected(String),
}

// ---------------------------------------------------------------------------
// MediaSink trait
// ---------------------------------------------------------------------------

/// A destination for fixed-size media frames.
pub trait MediaSink: Send + Sync {
    /// Transmit one frame.  Blocks until the transport accepted it.
    fn send(&self, frame: &[u8]) -> Result<(), SinkError>;

    /// Current stream state.
    fn state(&self) -> StreamState;
}

// ---------------------------------------------------------------------------
// PcmFileSink
// ---------------------------------------------------------------------------

/// Appends every frame to a raw PCM file.  Always reports `Started`.
pub struct PcmFileSink {
    writer: Mutex<BufWriter<File>>,
}

impl PcmFileSink {
    /// Create (truncate) `path` for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl MediaSink for PcmFileSink {
    fn send(&self, frame: &[u8]) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_all(frame)?;
        Ok(())
    }

    fn state(&self) -> StreamState {
        StreamState::Started
    }
}

impl Drop for PcmFileSink {
    fn drop(&mut self) {
        let writer = self.writer.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writer.flush() {
            log::warn!("pcm-sink: flush on close failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// NullSink
// ---------------------------------------------------------------------------

/// Discards frames, counting them.
#[derive(Debug, Default)]
pub struct NullSink {
    frames: AtomicU64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames accepted so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl MediaSink for NullSink {
    fn send(&self, _frame: &[u8]) -> Result<(), SinkError> {
        let n = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if n % 300 == 0 {
            log::trace!("null-sink: {n} frames discarded");
        }
        Ok(())
    }

    fn state(&self) -> StreamState {
        StreamState::Started
    }
}
