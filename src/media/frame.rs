//! Owned, fixed-capacity frame buffer handed to renderers and sinks.
//!
//! Replaces raw pointer access to platform memory buffers: the pacers own a
//! single [`FrameBuffer`] for their lifetime and lend it out by reference.
//!
//! ```rust
//! use voice_call_agent::media::FrameBuffer;
//!
//! let mut frame = FrameBuffer::new(4);
//! let copied = frame.fill_from(&[1, 2, 3, 4, 5, 6], 4);
//! assert_eq!(copied, 2);
//! assert_eq!(frame.as_slice(), &[5, 6, 0, 0]);
//! ```

/// A fixed-capacity byte frame with an explicit valid length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl FrameBuffer {
    /// Allocate a zeroed frame of `capacity` bytes, fully valid.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Shrink or grow the valid region, clamped to the capacity.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.data.len());
    }

    /// The valid bytes of the frame.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Mutable view over the valid bytes of the frame.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    /// Copy `src[offset..]` into the frame, zero-padding whatever is left.
    ///
    /// The frame is reset to full capacity first.  Returns the number of
    /// bytes copied from `src`.
    pub fn fill_from(&mut self, src: &[u8], offset: usize) -> usize {
        self.len = self.data.len();
        let available = src.get(offset..).unwrap_or(&[]);
        let copied = available.len().min(self.data.len());
        self.data[..copied].copy_from_slice(&available[..copied]);
        self.data[copied..].fill(0);
        copied
    }

    /// Zero the whole frame.
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.len = self.data.len();
    }
}
