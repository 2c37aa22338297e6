//! Recognizer events → audio interruption + utterance queue.
//!
//! ```text
//! on_partial(text) ── trimmed len > threshold ──▶ SpeechOutput::interrupt()
//!                                             └──▶ InterruptFlag::set()
//!
//! on_final(text)   ──▶ InterruptFlag::clear()
//!                  └── non-blank ──▶ Utterance ──▶ mpsc (orchestrator)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::audio::SpeechOutput;

use super::recognizer::RecognitionHandler;

// ---------------------------------------------------------------------------
// InterruptFlag
// ---------------------------------------------------------------------------

/// Set while the user is talking over the agent.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Utterance
// ---------------------------------------------------------------------------

/// A finalized user transcript.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    /// When the final transcript arrived; tags knowledge results.
    pub arrived_at: Instant,
}

// ---------------------------------------------------------------------------
// RecognitionEventBridge
// ---------------------------------------------------------------------------

pub struct RecognitionEventBridge {
    audio: Arc<dyn SpeechOutput>,
    interrupt: InterruptFlag,
    tx: mpsc::UnboundedSender<Utterance>,
    min_interrupt_chars: usize,
}

impl RecognitionEventBridge {
    /// Build a bridge and the receiving end of its utterance queue.
    pub fn new(
        audio: Arc<dyn SpeechOutput>,
        interrupt: InterruptFlag,
        min_interrupt_chars: usize,
    ) -> (Self, mpsc::UnboundedReceiver<Utterance>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                audio,
                interrupt,
                tx,
                min_interrupt_chars,
            },
            rx,
        )
    }
}

impl RecognitionHandler for RecognitionEventBridge {
    fn on_partial(&self, text: &str) {
        let trimmed = text.trim();
        if trimmed.chars().count() > self.min_interrupt_chars {
            log::debug!("bridge: partial {trimmed:?}, interrupting");
            self.audio.interrupt();
            self.interrupt.set();
        }
    }

    fn on_final(&self, text: &str) {
        self.interrupt.clear();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        log::info!("bridge: recognized {trimmed:?}");
        let utterance = Utterance {
            text: trimmed.to_string(),
            arrived_at: Instant::now(),
        };
        if self.tx.send(utterance).is_err() {
            log::debug!("bridge: orchestrator gone, dropping utterance");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
