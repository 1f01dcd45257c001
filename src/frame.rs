//! Length-prefixed framing.
//!
//! Every message on the wire is a 4-byte big-endian length followed by exactly that many payload
//! bytes. The length describes the payload only, never itself.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::env;
use thiserror::Error as ThisError;

/// Size of the length prefix in front of every frame.
pub const HEADER_LEN: usize = 4;

pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

#[derive(Debug, ThisError)]
pub enum FrameError {
    #[error("frame size {size} exceeds limit {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("negative frame length {0}")]
    NegativeLength(i32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Frame size limit taken from `MAX_FRAME_SIZE`, falling back to 512 MiB.
pub fn max_frame_size_from_env() -> usize {
    env::var("MAX_FRAME_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_FRAME_SIZE)
}

/// Validates a length prefix against `limit`, returning the payload size.
pub fn check_len(len: i32, limit: usize) -> Result<usize, FrameError> {
    let size = usize::try_from(len).map_err(|_| FrameError::NegativeLength(len))?;
    if size > limit {
        return Err(FrameError::TooLarge { size, limit });
    }

    Ok(size)
}

/// Wraps `payload` in a single frame.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    put_frame(&mut frame, payload);
    frame.freeze()
}

/// Appends a frame carrying `payload` to `dst`.
pub fn put_frame(dst: &mut BytesMut, payload: &[u8]) {
    dst.reserve(HEADER_LEN + payload.len());
    dst.put_i32(payload.len() as i32);
    dst.put_slice(payload);
}

/// Reads the length prefix at the start of `src` without consuming it.
///
/// Returns `None` while fewer than four bytes are buffered.
pub fn peek_len(src: &[u8]) -> Option<i32> {
    let header: [u8; HEADER_LEN] = src.get(..HEADER_LEN)?.try_into().ok()?;
    Some(i32::from_be_bytes(header))
}

/// Splits one complete frame off the front of `src`.
///
/// Returns `None` if the buffer does not yet hold the whole frame, in which case nothing is
/// consumed. A negative length prefix can never be satisfied and is reported the same way, so
/// callers check the prefix with [`check_len`] first.
pub fn take_frame(src: &mut BytesMut) -> Option<Bytes> {
    let len = usize::try_from(peek_len(src)?).ok()?;
    if src.len() < HEADER_LEN + len {
        return None;
    }

    src.advance(HEADER_LEN);
    Some(src.split_to(len).freeze())
}

/// Stateful accumulator turning an arbitrarily chunked byte stream back into frames.
///
/// A trailing partial frame is kept between calls to [`FrameDecoder::feed`]; a frame is never
/// emitted before all of its bytes have arrived. A length prefix that is negative or above the
/// size limit is an error as soon as its four bytes are buffered.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_size: usize,
}

impl FrameDecoder {
    pub fn new() -> FrameDecoder {
        FrameDecoder::with_max_frame_size(max_frame_size_from_env())
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> FrameDecoder {
        FrameDecoder {
            buffer: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Appends `chunk` and returns every frame completed by it, in stream order.
    ///
    /// After an error the buffered bytes are meaningless; call [`FrameDecoder::reset`] before
    /// feeding the decoder again.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>, FrameError> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(len) = peek_len(&self.buffer) {
            check_len(len, self.max_frame_size)?;

            match take_frame(&mut self.buffer) {
                Some(frame) => frames.push(frame),
                None => break,
            }
        }

        Ok(frames)
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any buffered partial frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
