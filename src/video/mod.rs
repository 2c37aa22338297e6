//! Agent video output: renderer → 30 fps pacer → media sink.
//!
//! ```text
//! VideoOutputPacer thread ──render──▶ VideoRenderer ──▶ FrameBuffer
//!          │                                ▲
//!          └──── MediaSink::send(frame)     │ set_active / set_amplitude
//!                                           │
//!                    AudioOutputPacer ── RendererLink
//! ```

pub mod pacer;
pub mod renderer;

pub use pacer::VideoOutputPacer;
pub use renderer::{PulseRenderer, RenderError, RendererLink, VideoRenderer};
