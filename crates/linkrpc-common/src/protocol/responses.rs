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

//! LinkRPC Response Types
//!
//! This module defines the RPC response structure.

use serde::{Deserialize, Deserializer, Serialize};

use super::error::{LinkrpcError, Result};
use super::requests::{current_timestamp_ms, MessageId};

/// RPC method result (JSON value)
pub type RpcResult = serde_json::Value;

/// An RPC response returned from a server to the client.
///
/// # Fields
///
/// - `id`: the id of the request this response answers (`messageId` on the wire)
/// - `timestamp`: creation time in milliseconds since the epoch, advisory only
/// - `result`: the result value (present on success, may be JSON `null`)
/// - `error`: error message (present on failure)
/// - `success`: `true` iff `error` is absent
///
/// # Example
///
/// ```
/// use linkrpc_common::protocol::responses::Response;
/// use serde_json::json;
///
/// let success = Response::success("a1", json!(7));
/// assert!(success.success);
///
/// let error = Response::error("a1", "Unknown method: ghost");
/// assert!(!error.success);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    #[serde(rename = "messageId")]
    pub id: MessageId,
    pub timestamp: u64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub result: Option<RpcResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub success: bool,
}

/// Distinguishes `"result": null` (a successful null) from a missing field.
fn deserialize_present<'de, D>(deserializer: D) -> std::result::Result<Option<RpcResult>, D::Error>
where
    D: Deserializer<'de>,
{
    RpcResult::deserialize(deserializer).map(Some)
}

impl Response {
    /// Creates a successful response.
    ///
    /// `id` must be the id of the request being answered.
    pub fn success(id: impl Into<MessageId>, result: RpcResult) -> Self {
        Response {
            id: id.into(),
            timestamp: current_timestamp_ms(),
            result: Some(result),
            error: None,
            success: true,
        }
    }

    /// Creates an error response.
    pub fn error(id: impl Into<MessageId>, error: impl Into<String>) -> Self {
        Response {
            id: id.into(),
            timestamp: current_timestamp_ms(),
            result: None,
            error: Some(error.into()),
            success: false,
        }
    }

    /// Builds a success or error response from a handler outcome.
    pub fn from_outcome(id: impl Into<MessageId>, outcome: std::result::Result<RpcResult, String>) -> Self {
        match outcome {
            Ok(result) => Response::success(id, result),
            Err(error) => Response::error(id, error),
        }
    }

    /// Unwraps the response into its result value, or the remote error
    /// as [`LinkrpcError::Application`].
    pub fn into_result(self) -> Result<RpcResult> {
        match self.error {
            Some(error) => Err(LinkrpcError::Application(error)),
            None => Ok(self.result.unwrap_or(RpcResult::Null)),
        }
    }

    /// Checks that exactly one of `result`/`error` is set and that
    /// `success` mirrors the absence of `error`.
    ///
    /// A successful null travels as an explicit `"result": null`; a success
    /// envelope with no `result` field at all is rejected.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(LinkrpcError::Decode("response has an empty messageId".to_string()));
        }
        if self.result.is_some() && self.error.is_some() {
            return Err(LinkrpcError::Decode(format!(
                "response {} carries both result and error",
                self.id
            )));
        }
        if self.result.is_none() && self.error.is_none() {
            return Err(LinkrpcError::Decode(format!(
                "response {} carries neither result nor error",
                self.id
            )));
        }
        if self.success != self.error.is_none() {
            return Err(LinkrpcError::Decode(format!(
                "response {} has success={} but error is {}",
                self.id,
                self.success,
                if self.error.is_some() { "present" } else { "absent" }
            )));
        }
        Ok(())
    }
}
