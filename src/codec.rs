use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, HEADER_LEN};

pub use crate::frame::FrameError;

/// `tokio-util` adapter for the length-prefixed framing in [`crate::frame`].
///
/// Items are raw frame payloads; decoding the payload into a message is the handler's job.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Builds a codec whose frame limit comes from `MAX_FRAME_SIZE`, falling back to 512 MiB.
    pub fn new() -> FrameCodec {
        FrameCodec {
            max_frame_size: frame::max_frame_size_from_env(),
        }
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> FrameCodec {
        FrameCodec { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let len = match frame::peek_len(src) {
            Some(len) => len,
            None => return Ok(None),
        };

        // Reject bad prefixes before buffering their payload.
        let size = frame::check_len(len, self.max_frame_size)?;

        match frame::take_frame(src) {
            Some(payload) => Ok(Some(payload)),
            None => {
                src.reserve(HEADER_LEN + size - src.len());
                Ok(None)
            }
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size {
            return Err(FrameError::TooLarge {
                size: item.len(),
                limit: self.max_frame_size,
            });
        }

        frame::put_frame(dst, &item);
        Ok(())
    }
}
