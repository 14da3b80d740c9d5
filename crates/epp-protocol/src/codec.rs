//! Tokio codec for framed EPP messages

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{decode_header, encode_frame_into, HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// Codec for encoding/decoding length-prefixed EPP frames
///
/// Items are raw XML payloads; the codec never looks inside them.
#[derive(Debug)]
pub struct FrameCodec {
    /// Payload length of the frame being decoded (if its header was consumed)
    pending_len: Option<usize>,
    /// Largest payload accepted in either direction
    max_payload: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Create a new codec with the default payload limit
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE)
    }

    /// Create a codec with a caller-imposed payload limit
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            pending_len: None,
            max_payload,
        }
    }

    /// Largest payload this codec accepts
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let payload_len = match self.pending_len {
            Some(len) => len,
            None => {
                if src.len() < HEADER_SIZE {
                    return Ok(None);
                }
                let len = decode_header(&src[..HEADER_SIZE])?;
                if len > self.max_payload {
                    return Err(ProtocolError::PayloadTooLarge {
                        size: len,
                        max: self.max_payload,
                    });
                }
                src.advance(HEADER_SIZE);
                len
            }
        };

        if src.len() < payload_len {
            self.pending_len = Some(payload_len);
            src.reserve(payload_len - src.len());
            return Ok(None);
        }

        self.pending_len = None;
        Ok(Some(src.split_to(payload_len).freeze()))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        match self.pending_len.take() {
            Some(expected) => Err(ProtocolError::ConnectionClosed {
                expected,
                received: buf.len(),
            }),
            None if !buf.is_empty() => Err(ProtocolError::ConnectionClosed {
                expected: HEADER_SIZE,
                received: buf.len(),
            }),
            None => Ok(None),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if payload.len() > self.max_payload {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }

        encode_frame_into(&payload, dst)
    }
}
