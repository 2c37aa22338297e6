//! Coarse speech amplitude for driving the avatar while the agent talks.
//!
//! The audio pacer calls [`peak_amplitude`] once per frame on the window it
//! is about to send.  The value feeds `VideoRenderer::set_amplitude`.
//!
//! # Example
//!
//! ```rust
//! use voice_call_agent::audio::peak_amplitude;
//!
//! // Two 16-bit little-endian samples: 0 and -16384
//! let pcm = [0x00, 0x00, 0x00, 0xC0];
//! let amp = peak_amplitude(&pcm);
//! assert!((amp - 0.5).abs() < 1e-3);
//! ```

/// Peak absolute sample magnitude of signed 16-bit little-endian PCM,
/// normalised to `[0.0, 1.0]`.
///
/// A trailing odd byte is ignored.  Empty input yields `0.0`.
pub fn peak_amplitude(pcm: &[u8]) -> f32 {
    let peak = pcm
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]).unsigned_abs())
        .max()
        .unwrap_or(0);
    (f32::from(peak) / f32::from(i16::MAX)).min(1.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
