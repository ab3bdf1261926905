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

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use super::error::{LinkrpcError, Result};

pub type MessageId = String;
pub type MethodName = String;
pub type RpcParams = Vec<serde_json::Value>;

/// An RPC request sent from a client to a server.
///
/// On the wire the correlation id travels as `messageId`; every other field
/// keeps its Rust name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    #[serde(rename = "messageId")]
    pub id: MessageId,
    pub timestamp: u64,
    pub method: MethodName,
    #[serde(default)]
    pub params: RpcParams,
}

impl Request {
    /// Creates a request with a freshly generated correlation id.
    pub fn new(method: impl Into<String>, params: RpcParams) -> Self {
        Self::with_id(generate_message_id(), method, params)
    }

    /// Creates a request under a caller-chosen id.
    pub fn with_id(id: impl Into<MessageId>, method: impl Into<String>, params: RpcParams) -> Self {
        Request {
            id: id.into(),
            timestamp: current_timestamp_ms(),
            method: method.into(),
            params,
        }
    }

    /// Checks the envelope invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(LinkrpcError::Decode("request has an empty messageId".to_string()));
        }
        if self.method.is_empty() {
            return Err(LinkrpcError::Decode("request has an empty method".to_string()));
        }
        Ok(())
    }
}

/// Generates a correlation id: a random UUID v4 in hyphenated form.
pub fn generate_message_id() -> MessageId {
    Uuid::new_v4().to_string()
}

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
