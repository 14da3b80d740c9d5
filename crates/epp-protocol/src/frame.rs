//! Frame envelope encoding/decoding
//!
//! Every EPP message over TCP (RFC 5734) is one frame:
//! - total_length: 4 bytes (u32, big-endian), counting the header itself
//! - payload: total_length - 4 bytes of UTF-8 XML
//!
//! The helpers here carry no state between frames and can be reused for any
//! number of messages on one stream.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 4;

/// Default upper bound on a single payload (16 MiB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Encode a payload into a complete frame
///
/// The codec itself only refuses payloads whose total length cannot be
/// represented in the 32-bit header; callers impose tighter limits.
pub fn encode_frame(payload: &[u8]) -> Result<Bytes, ProtocolError> {
    let mut dst = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_frame_into(payload, &mut dst)?;
    Ok(dst.freeze())
}

/// Append a frame for `payload` to `dst`
pub fn encode_frame_into(payload: &[u8], dst: &mut BytesMut) -> Result<(), ProtocolError> {
    let total = payload
        .len()
        .checked_add(HEADER_SIZE)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(ProtocolError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize - HEADER_SIZE,
        })?;

    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32(total);
    dst.extend_from_slice(payload);
    Ok(())
}

/// Decode a frame header into the number of payload bytes that follow
pub fn decode_header(header: &[u8]) -> Result<usize, ProtocolError> {
    if header.len() < HEADER_SIZE {
        return Err(ProtocolError::ShortHeader { got: header.len() });
    }

    let declared = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if (declared as usize) < HEADER_SIZE {
        return Err(ProtocolError::InvalidLength { declared });
    }

    Ok(declared as usize - HEADER_SIZE)
}

/// Read exactly `expected` payload bytes, accumulating partial reads
///
/// A zero-length read before the target is reached means the peer closed
/// the stream; the partial payload is discarded, never returned.
pub async fn read_payload<R>(source: &mut R, expected: usize) -> Result<Bytes, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; expected];
    let mut filled = 0;
    while filled < expected {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ProtocolError::ConnectionClosed {
                expected,
                received: filled,
            });
        }
        filled += n;
    }
    Ok(Bytes::from(buf))
}

/// Read one complete frame and return its payload
pub async fn read_frame<R>(source: &mut R, max_payload: usize) -> Result<Bytes, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        let n = source.read(&mut header[filled..]).await?;
        if n == 0 {
            return Err(ProtocolError::ConnectionClosed {
                expected: HEADER_SIZE,
                received: filled,
            });
        }
        filled += n;
    }

    let len = decode_header(&header)?;
    if len > max_payload {
        return Err(ProtocolError::PayloadTooLarge {
            size: len,
            max: max_payload,
        });
    }

    read_payload(source, len).await
}

/// Write one frame carrying `payload` and flush it
pub async fn write_frame<W>(sink: &mut W, payload: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload)?;
    sink.write_all(&frame).await?;
    sink.flush().await?;
    Ok(())
}
