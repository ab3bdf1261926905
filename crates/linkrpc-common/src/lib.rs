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

//! LinkRPC Common Types and Transport
//!
//! This crate provides the envelope types, the framing and envelope codecs
//! and the TCP plumbing shared by the LinkRPC client and server.
//!
//! # Architecture
//!
//! - **Transport**: one persistent TCP connection per client
//! - **Serialization**: JSON envelopes
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **Max Message Size**: 1 MiB, enforced before allocation
//!
//! # Components
//!
//! - [`protocol`] - Request/Response envelopes, error taxonomy, built-in methods
//! - [`transport`] - Framing, codecs, TCP connect and serve
//!
//! # Example
//!
//! ```
//! use linkrpc_common::{Request, Response};
//! use serde_json::json;
//!
//! let request = Request::new("echo", vec![json!("hi")]);
//! let response = Response::success(request.id.clone(), json!("Echo: hi"));
//! assert_eq!(response.id, request.id);
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
