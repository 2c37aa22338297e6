//! Single-slot, latest-wins hand-off between speech producers and the
//! audio pacer.
//!
//! This is deliberately **not** a queue: whatever was written last is what
//! the pacer adopts on its next tick, so the agent always speaks the newest
//! thing.  A zero-length buffer is the interrupt sentinel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::AudioBuffer;

/// The pending-buffer slot plus the pacer's "currently playing" bit.
///
/// All mutators are safe to call from any thread, in any order.
#[derive(Debug, Default)]
pub struct PendingAudioSlot {
    next: Mutex<Option<AudioBuffer>>,
    playing: AtomicBool,
}

impl PendingAudioSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional overwrite, even while something is playing.
    pub fn speak_now(&self, buffer: AudioBuffer) {
        *self.lock() = Some(buffer);
    }

    /// Write only if nothing is pending and nothing is playing.
    ///
    /// Returns `true` when the buffer was accepted.
    pub fn maybe_speak(&self, buffer: AudioBuffer) -> bool {
        let mut next = self.lock();
        if next.is_some() || self.playing.load(Ordering::Acquire) {
            return false;
        }
        *next = Some(buffer);
        true
    }

    /// Write the zero-length stop sentinel.
    pub fn interrupt(&self) {
        *self.lock() = Some(AudioBuffer::from(Vec::new()));
    }

    /// Take the pending buffer for playback.
    ///
    /// The playing bit is updated under the same lock, so a concurrent
    /// [`maybe_speak`](Self::maybe_speak) sees either the pending buffer or
    /// the playback it turned into.
    pub fn adopt(&self) -> Option<AudioBuffer> {
        let mut next = self.lock();
        let taken = next.take();
        if let Some(buffer) = &taken {
            self.playing.store(!buffer.is_empty(), Ordering::Release);
        }
        taken
    }

    /// Current contents without consuming them.
    pub fn peek(&self) -> Option<AudioBuffer> {
        self.lock().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Called by the pacer when the current buffer ran out.
    pub fn finish_playback(&self) {
        self.playing.store(false, Ordering::Release);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<AudioBuffer>> {
        self.next.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(bytes: &[u8]) -> AudioBuffer {
        AudioBuffer::from(bytes)
    }

    #[test]
    fn speak_now_last_write_wins() {
        let slot = PendingAudioSlot::new();
        slot.speak_now(buf(&[1]));
        slot.speak_now(buf(&[2]));
        assert_eq!(slot.adopt().as_deref(), Some(&[2u8][..]));
        assert!(slot.adopt().is_none());
    }

    #[test]
    fn maybe_speak_refuses_when_pending() {
        let slot = PendingAudioSlot::new();
        slot.speak_now(buf(&[1]));
        assert!(!slot.maybe_speak(buf(&[2])));
        assert_eq!(slot.peek().as_deref(), Some(&[1u8][..]));
    }

    #[test]
    fn maybe_speak_refuses_while_playing() {
        let slot = PendingAudioSlot::new();
        slot.speak_now(buf(&[1, 2]));
        slot.adopt();
        assert!(slot.is_playing());
        assert!(!slot.maybe_speak(buf(&[3])));
        assert!(!slot.is_pending());

        slot.finish_playback();
        assert!(slot.maybe_speak(buf(&[3])));
    }

    #[test]
    fn interrupt_writes_empty_sentinel() {
        let slot = PendingAudioSlot::new();
        slot.speak_now(buf(&[1]));
        slot.interrupt();
        let adopted = slot.adopt().expect("sentinel pending");
        assert!(adopted.is_empty());
        assert!(!slot.is_playing());
    }

    #[test]
    fn speak_now_replaces_interrupt_sentinel() {
        let slot = PendingAudioSlot::new();
        slot.interrupt();
        slot.speak_now(buf(&[7]));
        assert_eq!(slot.adopt().as_deref(), Some(&[7u8][..]));
    }
}
