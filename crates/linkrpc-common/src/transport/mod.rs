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

//! LinkRPC Transport Layer
//!
//! This module provides the framing codec, the envelope codec and the TCP
//! plumbing shared by the client and the server.
//!
//! # Components
//!
//! - **[`FrameCodec`]**: length-prefixed framing, usable with `tokio_util` `Framed*`
//! - **[`FrameReader`]**: frame reader that survives oversize frames
//! - **[`JsonCodec`]**: envelope <-> payload bytes
//! - **[`TcpTransportAsync`]**: connect with classified failures
//! - **[`TcpServer`]**: accept loop with per-connection read/write tasks
//!
//! # Wire Format
//!
//! ```text
//! [4-byte length as u32 big-endian] [JSON envelope]
//! ```
//!
//! Payloads above 1 MiB are refused by both encoder and decoder.

pub mod codec;
pub mod frame;
pub mod reader;
pub mod tcp;
pub mod tcp_server;

pub use codec::JsonCodec;
pub use frame::{decode_frame, encode_frame, FrameCodec, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};
pub use reader::FrameReader;
pub use tcp::{map_io_error, TcpTransportAsync, DEFAULT_CONNECT_TIMEOUT};
pub use tcp_server::{FnHandler, RequestHandler, TcpServer, DEFAULT_MAX_IN_FLIGHT};
