// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Streaming frame recovery.
//!
//! Transport reads arrive in arbitrary fragments: half a header, three
//! frames back to back, a payload split across writes. [`FrameBuffer`]
//! accumulates bytes and hands back complete frames (header included) in
//! byte order, carrying the residual forward.

use bytes::{Bytes, BytesMut};

use crate::wire::{decode_header, HEADER_LEN};

/// Default cap on a single frame (header + payload).
pub const DEFAULT_MAX_FRAME: usize = 8 * 1024 * 1024;

/// A peer declared a frame larger than the configured cap. The owning
/// connection should be dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("frame of {declared} bytes exceeds cap of {max} bytes")]
pub struct FrameTooLarge {
    pub declared: u64,
    pub max: usize,
}

/// Stateful splitter recovering complete frames from fragmented reads.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    max_frame: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }

    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            max_frame,
        }
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Detach the next complete frame, or `None` while more bytes are
    /// needed. Call in a loop: one read may complete several frames.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, FrameTooLarge> {
        let Some((_code, len, _rest)) = decode_header(&self.buf) else {
            return Ok(None);
        };
        let total = HEADER_LEN as u64 + u64::from(len);
        if total > self.max_frame as u64 {
            return Err(FrameTooLarge {
                declared: total,
                max: self.max_frame,
            });
        }
        if (self.buf.len() as u64) < total {
            return Ok(None);
        }
        Ok(Some(self.buf.split_to(total as usize).freeze()))
    }

    /// Bytes held back waiting for the rest of a frame. Always a proper
    /// prefix of the next frame.
    pub fn residual(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot splitter: all complete frames in `input` plus the residual
/// tail. No size cap; use [`FrameBuffer`] on untrusted streams.
pub fn split_frames(input: &[u8]) -> (Vec<Bytes>, Bytes) {
    let mut fb = FrameBuffer::with_max_frame(usize::MAX);
    fb.extend(input);
    let mut frames = Vec::new();
    // Infallible with an unbounded cap.
    while let Ok(Some(frame)) = fb.next_frame() {
        frames.push(frame);
    }
    (frames, fb.buf.freeze())
}
