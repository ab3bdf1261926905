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

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;

use crate::protocol::error::{LinkrpcError, Result};
use crate::transport::frame::FrameCodec;
use crate::transport::tcp::map_io_error;

const READ_CHUNK: usize = 8 * 1024;

/// Reads whole frames from an async byte stream.
///
/// Unlike `FramedRead`, a per-frame error (an oversize frame) does not end
/// the stream: the caller gets the error, and the next call carries on with
/// the frame after it.
pub struct FrameReader<R> {
    inner: R,
    codec: FrameCodec,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, codec: FrameCodec) -> Self {
        Self {
            inner,
            codec,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Waits for the next complete frame.
    ///
    /// Returns `Ok(None)` when the peer closes the stream on a frame
    /// boundary.
    ///
    /// # Errors
    ///
    /// - [`LinkrpcError::FrameTooLarge`] for an oversize frame; reading may continue
    /// - [`LinkrpcError::ConnectionClosed`] if the stream ends mid-frame
    /// - an I/O-derived error if the read itself fails
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buf)? {
                return Ok(Some(frame));
            }

            if self.buf.capacity() - self.buf.len() < READ_CHUNK / 2 {
                self.buf.reserve(READ_CHUNK);
            }

            let n = self
                .inner
                .read_buf(&mut self.buf)
                .await
                .map_err(|e| map_io_error(e, "reading frame"))?;

            if n == 0 {
                if self.buf.is_empty() && !self.codec.is_discarding() {
                    return Ok(None);
                }
                return Err(LinkrpcError::ConnectionClosed(format!(
                    "peer closed the stream mid-frame ({} bytes buffered)",
                    self.buf.len()
                )));
            }
        }
    }
}
