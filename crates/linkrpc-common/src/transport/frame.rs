// Copyright 2025 LinkRPC Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Length-prefixed framing.
//!
//! Wire format: `[4-byte big-endian u32 length N][N bytes of payload]`, no
//! padding and no checksum. Payloads longer than the configured maximum are
//! rejected before any buffer for them is allocated; on the decode side the
//! codec then skips the declared bytes so the stream stays in sync.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::error::{LinkrpcError, Result};

/// Maximum payload size of a single frame (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Width of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Codec turning a byte stream into payload frames and back.
///
/// The codec is stateful only while discarding an oversize frame: the first
/// `decode` that sees the oversize header returns
/// [`LinkrpcError::FrameTooLarge`] without consuming anything, and later calls
/// drop the header and body as their bytes arrive.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
    discard_remaining: usize,
}

impl FrameCodec {
    /// Creates a codec with the default 1 MiB limit.
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            discard_remaining: 0,
        }
    }

    /// Creates a codec with a custom payload limit.
    ///
    /// Both peers must use the same limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            discard_remaining: 0,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Returns `true` while the codec is skipping the body of an oversize frame.
    pub fn is_discarding(&self) -> bool {
        self.discard_remaining > 0
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = LinkrpcError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        if self.discard_remaining > 0 {
            let skip = self.discard_remaining.min(buf.len());
            buf.advance(skip);
            self.discard_remaining -= skip;
            if self.discard_remaining > 0 {
                return Ok(None);
            }
        }

        if buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

        if len > self.max_frame_size {
            self.discard_remaining = LENGTH_PREFIX_SIZE + len;
            return Err(LinkrpcError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        let frame_len = LENGTH_PREFIX_SIZE + len;
        if buf.len() < frame_len {
            buf.reserve(frame_len - buf.len());
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX_SIZE);
        Ok(Some(buf.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = LinkrpcError;

    fn encode(&mut self, payload: Bytes, buf: &mut BytesMut) -> Result<()> {
        if payload.len() > self.max_frame_size {
            return Err(LinkrpcError::FrameTooLarge {
                size: payload.len(),
                max: self.max_frame_size,
            });
        }

        buf.reserve(LENGTH_PREFIX_SIZE + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.put_slice(&payload);
        Ok(())
    }
}

/// Frames a payload with the default limit.
///
/// The returned buffer is `4 + payload.len()` bytes long.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let mut buf = BytesMut::new();
    FrameCodec::new().encode(Bytes::copy_from_slice(payload), &mut buf)?;
    Ok(buf.to_vec())
}

/// Takes one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` while the frame is incomplete; the partial bytes stay
/// in `buf` until more arrive. An oversize header is reported and left in
/// place; use a long-lived [`FrameCodec`] to skip past it.
pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<Bytes>> {
    FrameCodec::new().decode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let framed = encode_frame(b"hello").unwrap();
        assert_eq!(framed.len(), 4 + 5);
        assert_eq!(&framed[..4], &[0, 0, 0, 5]);
        assert_eq!(&framed[4..], b"hello");
    }

    #[test]
    fn test_round_trip_edge_sizes() {
        for size in [0usize, 1, 4096, MAX_FRAME_SIZE] {
            let payload = vec![0xAB; size];
            let mut buf = BytesMut::from(&encode_frame(&payload).unwrap()[..]);
            let decoded = decode_frame(&mut buf).unwrap().unwrap();
            assert_eq!(decoded.len(), size);
            assert_eq!(&decoded[..], &payload[..]);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_oversize_encode_fails_without_writing() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let payload = Bytes::from(vec![0u8; MAX_FRAME_SIZE + 1]);

        let err = codec.encode(payload, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            LinkrpcError::FrameTooLarge { size, max } if size == MAX_FRAME_SIZE + 1 && max == MAX_FRAME_SIZE
        ));
        assert!(buf.is_empty());
        assert!(encode_frame(&vec![0u8; MAX_FRAME_SIZE + 1]).is_err());
    }

    #[test]
    fn test_partial_frame_is_incomplete() {
        let framed = encode_frame(b"split across reads").unwrap();
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        // Length prefix arrives in two pieces, then the body byte by byte.
        buf.extend_from_slice(&framed[..2]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&framed[2..4]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        for byte in &framed[4..framed.len() - 1] {
            buf.extend_from_slice(&[*byte]);
            assert!(codec.decode(&mut buf).unwrap().is_none());
        }

        buf.extend_from_slice(&framed[framed.len() - 1..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"split across reads");
    }

    #[test]
    fn test_two_frames_in_one_read() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_frame(b"first").unwrap());
        buf.extend_from_slice(&encode_frame(b"second").unwrap());

        let mut codec = FrameCodec::new();
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"first");
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"second");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_oversize_header_rejected_before_body_arrives() {
        let mut codec = FrameCodec::with_max_frame_size(16);
        let mut buf = BytesMut::new();
        buf.put_u32(u32::MAX);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, LinkrpcError::FrameTooLarge { size, max: 16 } if size == u32::MAX as usize));
        // No room was reserved for the declared body.
        assert!(buf.capacity() < 1024);
    }

    #[test]
    fn test_oversize_frame_is_skipped_and_stream_resyncs() {
        let mut codec = FrameCodec::with_max_frame_size(8);
        let mut buf = BytesMut::new();
        buf.put_u32(20);
        buf.extend_from_slice(&[7u8; 12]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(LinkrpcError::FrameTooLarge { size: 20, max: 8 })
        ));
        assert!(codec.is_discarding());
        assert!(codec.decode(&mut buf).unwrap().is_none());

        // The rest of the oversize body, then a valid frame.
        buf.extend_from_slice(&[7u8; 8]);
        buf.put_u32(2);
        buf.extend_from_slice(b"ok");

        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"ok");
        assert!(!codec.is_discarding());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_custom_limit_applies_to_encode() {
        let mut codec = FrameCodec::with_max_frame_size(3);
        let mut buf = BytesMut::new();
        assert!(codec.encode(Bytes::from_static(b"abc"), &mut buf).is_ok());
        assert!(codec.encode(Bytes::from_static(b"abcd"), &mut buf).is_err());
        assert_eq!(buf.len(), 7);
    }
}
