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

//! Built-in procedure names and response types
//!
//! Methods whose names start with an underscore are reserved. Servers answer
//! `_metrics` and `_info` themselves instead of looking them up in the
//! method table, and a relay answers them locally instead of forwarding.

use serde::{Deserialize, Serialize};

/// Returns the server's metrics snapshot.
pub const METHOD_METRICS: &str = "_metrics";

/// Returns an [`InfoResponse`].
pub const METHOD_INFO: &str = "_info";

/// Returns `true` for method names answered by the server itself.
pub fn is_builtin(method: &str) -> bool {
    method == METHOD_METRICS || method == METHOD_INFO
}

/// What kind of process answered an `_info` call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerRole {
    /// Dispatches requests to a local method table
    Server,
    /// Forwards requests to an upstream endpoint
    Relay,
}

/// Response of the `_info` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfoResponse {
    pub role: ServerRole,
    /// Crate version of the answering server
    pub version: String,
    pub uptime_ms: u64,
    /// Upstream address, only reported by relays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
}

impl InfoResponse {
    /// Info for a dispatching server.
    ///
    /// # Example
    /// ```rust
    /// use linkrpc_common::protocol::builtin::{InfoResponse, ServerRole};
    ///
    /// let info = InfoResponse::server(1_000);
    /// assert_eq!(info.role, ServerRole::Server);
    /// assert!(info.upstream.is_none());
    /// ```
    pub fn server(uptime_ms: u64) -> Self {
        Self {
            role: ServerRole::Server,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_ms,
            upstream: None,
        }
    }

    /// Info for a relay forwarding to `upstream`.
    pub fn relay(uptime_ms: u64, upstream: impl Into<String>) -> Self {
        Self {
            role: ServerRole::Relay,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_ms,
            upstream: Some(upstream.into()),
        }
    }
}
