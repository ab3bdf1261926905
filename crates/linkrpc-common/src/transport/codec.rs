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

use crate::protocol::error::{LinkrpcError, Result};
use crate::protocol::{MessageId, Request, Response};

/// JSON codec for encoding/decoding envelopes
///
/// Decoding failures, whether from malformed JSON or from an envelope that
/// breaks its invariants, are reported as [`LinkrpcError::Decode`] so callers
/// can tell them apart from application errors carried inside a `Response`.
///
/// ```
/// use linkrpc_common::transport::JsonCodec;
/// use linkrpc_common::protocol::Request;
/// use serde_json::json;
///
/// let request = Request::new("echo", vec![json!("hi")]);
/// let encoded = JsonCodec::encode_request(&request).unwrap();
/// assert_eq!(JsonCodec::decode_request(&encoded).unwrap(), request);
/// ```
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a request to bytes
    pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(request)?)
    }

    /// Decode a request from bytes
    ///
    /// # Errors
    ///
    /// Returns [`LinkrpcError::Decode`] if the payload is not a request
    /// envelope or its `method` is empty.
    pub fn decode_request(data: &[u8]) -> Result<Request> {
        let request: Request = serde_json::from_slice(data)
            .map_err(|e| LinkrpcError::Decode(format!("invalid request: {}", e)))?;
        request.validate()?;
        Ok(request)
    }

    /// Encode a response to bytes
    pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(response)?)
    }

    /// Decode a response from bytes
    ///
    /// # Errors
    ///
    /// Returns [`LinkrpcError::Decode`] if the payload is not a response
    /// envelope, or if `success` disagrees with the presence of `error`.
    pub fn decode_response(data: &[u8]) -> Result<Response> {
        let response: Response = serde_json::from_slice(data)
            .map_err(|e| LinkrpcError::Decode(format!("invalid response: {}", e)))?;
        response.validate()?;
        Ok(response)
    }

    /// Best-effort extraction of `messageId` from a payload that failed to
    /// decode as a full envelope.
    pub fn peek_message_id(data: &[u8]) -> Option<MessageId> {
        let value: serde_json::Value = serde_json::from_slice(data).ok()?;
        match value.get("messageId")?.as_str() {
            Some(id) if !id.is_empty() => Some(id.to_string()),
            _ => None,
        }
    }
}
