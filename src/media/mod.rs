//! Shared plumbing for the audio and video output pacers: the owned
//! [`FrameBuffer`], the [`MediaSink`] seam to the call transport and the
//! drift-correcting [`FramePacer`].

pub mod frame;
pub mod pacing;
pub mod sink;

pub use frame::FrameBuffer;
pub use pacing::FramePacer;
pub use sink::{MediaSink, NullSink, PcmFileSink, SinkError, StreamState};
