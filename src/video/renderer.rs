//! Avatar renderers.
//!
//! A [`VideoRenderer`] paints one BGRA frame per call into a
//! [`FrameBuffer`] owned by the video pacer.  Every method takes `&self` so
//! the same renderer can be driven by the pacer thread (render), the audio
//! pacer's playback events (active / amplitude) and the call session
//! (fades) at once.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::audio::{PlaybackEvent, PlaybackObserver};
use crate::media::FrameBuffer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid frame size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("renderer initialisation failed: {0}")]
    Init(String),
}

/// Frame producer driven by [`VideoOutputPacer`](super::VideoOutputPacer).
pub trait VideoRenderer: Send + Sync {
    /// Prepare for `width` x `height` frames.  Called once, on the pacer
    /// thread, before the first [`render`](Self::render).
    fn init(&self, width: u32, height: u32) -> Result<(), RenderError>;

    /// Paint the next frame.
    fn render(&self, frame: &mut FrameBuffer);

    /// Release whatever `init` acquired.  Called once when the pacer exits.
    fn dispose(&self);

    fn fade_in(&self);

    fn fade_out(&self);

    /// Whether the agent is currently speaking.
    fn set_active(&self, active: bool);

    /// Speech amplitude in `0.0..=1.0`.
    fn set_amplitude(&self, amplitude: f32);
}

// ---------------------------------------------------------------------------
// PulseRenderer
// ---------------------------------------------------------------------------

/// Fade speed: a full fade takes half a second at 30 fps.
const FADE_STEP: f32 = 1.0 / 15.0;

const BACKGROUND_BGR: [u8; 3] = [0x28, 0x1c, 0x18];
const IDLE_BGR: [u8; 3] = [0x90, 0x70, 0x50];
const SPEAKING_BGR: [u8; 3] = [0xf0, 0xb0, 0x40];

#[derive(Debug, Clone, Copy)]
struct Fade {
    level: f32,
    target: f32,
}

/// A flat background with a disc in the middle that swells with the agent's
/// speech amplitude.
///
/// Frames are black until [`fade_in`](VideoRenderer::fade_in).
#[derive(Debug)]
pub struct PulseRenderer {
    width: AtomicU32,
    height: AtomicU32,
    ready: AtomicBool,
    active: AtomicBool,
    /// `f32` bit pattern.
    amplitude: AtomicU32,
    fade: Mutex<Fade>,
}

impl Default for PulseRenderer {
    fn default() -> Self {
        Self {
            width: AtomicU32::new(0),
            height: AtomicU32::new(0),
            ready: AtomicBool::new(false),
            active: AtomicBool::new(false),
            amplitude: AtomicU32::new(0f32.to_bits()),
            fade: Mutex::new(Fade {
                level: 0.0,
                target: 0.0,
            }),
        }
    }
}

impl PulseRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn amplitude(&self) -> f32 {
        f32::from_bits(self.amplitude.load(Ordering::Relaxed))
    }

    /// Current fade level, `0.0` (black) to `1.0` (fully visible).
    pub fn opacity(&self) -> f32 {
        self.fade.lock().unwrap_or_else(|e| e.into_inner()).level
    }

    fn set_fade_target(&self, target: f32) {
        self.fade.lock().unwrap_or_else(|e| e.into_inner()).target = target;
    }

    fn step_fade(&self) -> f32 {
        let mut fade = self.fade.lock().unwrap_or_else(|e| e.into_inner());
        let delta = fade.target - fade.level;
        fade.level += delta.clamp(-FADE_STEP, FADE_STEP);
        fade.level
    }
}

impl VideoRenderer for PulseRenderer {
    fn init(&self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }
        self.width.store(width, Ordering::Relaxed);
        self.height.store(height, Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
        log::debug!("pulse-renderer: initialised {width}x{height}");
        Ok(())
    }

    fn render(&self, frame: &mut FrameBuffer) {
        if !self.ready.load(Ordering::Acquire) {
            return;
        }
        let width = self.width.load(Ordering::Relaxed) as usize;
        let height = self.height.load(Ordering::Relaxed) as usize;
        let needed = width * height * 4;
        if frame.capacity() < needed {
            log::trace!(
                "pulse-renderer: frame of {} bytes too small for {width}x{height}",
                frame.capacity()
            );
            return;
        }
        frame.set_len(needed);

        let opacity = self.step_fade();
        let speaking = self.is_active();
        let amplitude = if speaking { self.amplitude() } else { 0.0 };

        let base = width.min(height) as f32 / 6.0;
        let radius = base * (1.0 + amplitude);
        let radius_sq = radius * radius;
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let disc = if speaking { SPEAKING_BGR } else { IDLE_BGR };

        let shade = |bgr: [u8; 3]| -> [u8; 4] {
            let scale = |c: u8| (f32::from(c) * opacity).round() as u8;
            [scale(bgr[0]), scale(bgr[1]), scale(bgr[2]), 0xff]
        };
        let background = shade(BACKGROUND_BGR);
        let foreground = shade(disc);

        for (i, pixel) in frame.as_mut_slice().chunks_exact_mut(4).enumerate() {
            let dx = (i % width) as f32 + 0.5 - cx;
            let dy = (i / width) as f32 + 0.5 - cy;
            let colour = if dx * dx + dy * dy <= radius_sq {
                &foreground
            } else {
                &background
            };
            pixel.copy_from_slice(colour);
        }
    }

    fn dispose(&self) {
        self.ready.store(false, Ordering::Release);
        log::debug!("pulse-renderer: disposed");
    }

    fn fade_in(&self) {
        self.set_fade_target(1.0);
    }

    fn fade_out(&self) {
        self.set_fade_target(0.0);
    }

    fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    fn set_amplitude(&self, amplitude: f32) {
        let clamped = amplitude.clamp(0.0, 1.0);
        self.amplitude.store(clamped.to_bits(), Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// RendererLink
// ---------------------------------------------------------------------------

/// Forwards audio playback events to a renderer so the avatar animates
/// while the agent talks.
pub struct RendererLink {
    renderer: Arc<dyn VideoRenderer>,
}

impl RendererLink {
    pub fn new(renderer: Arc<dyn VideoRenderer>) -> Self {
        Self { renderer }
    }
}

impl PlaybackObserver for RendererLink {
    fn on_playback(&self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Started => self.renderer.set_active(true),
            PlaybackEvent::Stopped => {
                self.renderer.set_active(false);
                self.renderer.set_amplitude(0.0);
            }
            PlaybackEvent::Amplitude(a) => self.renderer.set_amplitude(a),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(frame: &FrameBuffer, width: usize, x: usize, y: usize) -> [u8; 4] {
        let at = (y * width + x) * 4;
        let s = &frame.as_slice()[at..at + 4];
        [s[0], s[1], s[2], s[3]]
    }

    fn faded_in(width: u32, height: u32) -> (PulseRenderer, FrameBuffer) {
        let r = PulseRenderer::new();
        r.init(width, height).unwrap();
        r.fade_in();
        let mut frame = FrameBuffer::new((width * height * 4) as usize);
        for _ in 0..20 {
            r.render(&mut frame);
        }
        (r, frame)
    }

    #[test]
    fn init_rejects_empty_geometry() {
        let r = PulseRenderer::new();
        assert!(matches!(
            r.init(0, 10),
            Err(RenderError::InvalidSize { width: 0, height: 10 })
        ));
    }

    #[test]
    fn frames_are_black_before_fade_in() {
        let r = PulseRenderer::new();
        r.init(8, 8).unwrap();
        let mut frame = FrameBuffer::new(8 * 8 * 4);
        r.render(&mut frame);
        assert!(frame
            .as_slice()
            .chunks_exact(4)
            .all(|p| p == [0, 0, 0, 0xff]));
    }

    #[test]
    fn fade_in_reaches_full_opacity_and_fade_out_returns() {
        let (r, mut frame) = faded_in(8, 8);
        assert!((r.opacity() - 1.0).abs() < 1e-6);
        assert_eq!(pixel(&frame, 8, 0, 0), [0x28, 0x1c, 0x18, 0xff]);

        r.fade_out();
        r.render(&mut frame);
        assert!(r.opacity() < 1.0);
        for _ in 0..20 {
            r.render(&mut frame);
        }
        assert_eq!(r.opacity(), 0.0);
    }

    #[test]
    fn disc_uses_speaking_colour_while_active() {
        let (r, mut frame) = faded_in(32, 32);
        assert_eq!(pixel(&frame, 32, 16, 16), [0x90, 0x70, 0x50, 0xff]);

        r.set_active(true);
        r.render(&mut frame);
        assert_eq!(pixel(&frame, 32, 16, 16), [0xf0, 0xb0, 0x40, 0xff]);
    }

    #[test]
    fn amplitude_grows_the_disc() {
        let (r, mut frame) = faded_in(60, 60);
        r.set_active(true);
        // Base radius 10: x = 45 is 15.5 px from centre.
        r.render(&mut frame);
        assert_eq!(pixel(&frame, 60, 45, 30), [0x28, 0x1c, 0x18, 0xff]);

        r.set_amplitude(1.0);
        r.render(&mut frame);
        assert_eq!(pixel(&frame, 60, 45, 30), [0xf0, 0xb0, 0x40, 0xff]);
    }

    #[test]
    fn undersized_frame_is_left_alone() {
        let r = PulseRenderer::new();
        r.init(8, 8).unwrap();
        r.fade_in();
        let mut frame = FrameBuffer::new(16);
        frame.fill_from(&[7; 16], 0);
        r.render(&mut frame);
        assert!(frame.as_slice().iter().all(|&b| b == 7));
    }

    #[test]
    fn link_maps_playback_events() {
        let renderer = Arc::new(PulseRenderer::new());
        let link = RendererLink::new(renderer.clone());

        link.on_playback(PlaybackEvent::Started);
        link.on_playback(PlaybackEvent::Amplitude(0.4));
        assert!(renderer.is_active());
        assert!((renderer.amplitude() - 0.4).abs() < 1e-6);

        link.on_playback(PlaybackEvent::Stopped);
        assert!(!renderer.is_active());
        assert_eq!(renderer.amplitude(), 0.0);
    }

    #[test]
    fn amplitude_is_clamped() {
        let r = PulseRenderer::new();
        r.set_amplitude(3.0);
        assert_eq!(r.amplitude(), 1.0);
        r.set_amplitude(-1.0);
        assert_eq!(r.amplitude(), 0.0);
    }
}
