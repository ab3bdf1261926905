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

use thiserror::Error;

/// Why a connection attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    /// The peer actively refused the connection
    Refused,
    /// The connection did not complete within the connect timeout
    Timeout,
    /// The host name could not be resolved
    Resolve,
    /// Any other socket-level failure
    Other,
}

impl std::fmt::Display for ConnectErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectErrorKind::Refused => "refused",
            ConnectErrorKind::Timeout => "timed out",
            ConnectErrorKind::Resolve => "resolution failed",
            ConnectErrorKind::Other => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum LinkrpcError {
    #[error("Connection to {addr} {kind}: {message}")]
    Connect {
        addr: String,
        kind: ConnectErrorKind,
        message: String,
    },

    #[error("Client is not connected")]
    NotConnected,

    #[error("Frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Duplicate message id: {0}")]
    DuplicateId(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Remote error: {0}")]
    Application(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkrpcError {
    /// Returns `true` when the error leaves the underlying stream unusable.
    ///
    /// Oversize frames and undecodable payloads only cost the offending
    /// frame; read loops log them and keep going.
    pub fn is_fatal_to_connection(&self) -> bool {
        !matches!(
            self,
            LinkrpcError::FrameTooLarge { .. } | LinkrpcError::Decode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LinkrpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_frame_errors_are_not_fatal() {
        assert!(!LinkrpcError::FrameTooLarge { size: 2, max: 1 }.is_fatal_to_connection());
        assert!(!LinkrpcError::Decode("bad".into()).is_fatal_to_connection());
    }

    #[test]
    fn test_transport_errors_are_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(LinkrpcError::Io(io).is_fatal_to_connection());
        assert!(LinkrpcError::ConnectionClosed("peer".into()).is_fatal_to_connection());
    }

    #[test]
    fn test_connect_error_message() {
        let err = LinkrpcError::Connect {
            addr: "127.0.0.1:1".into(),
            kind: ConnectErrorKind::Refused,
            message: "os error 111".into(),
        };
        assert_eq!(err.to_string(), "Connection to 127.0.0.1:1 refused: os error 111");
    }
}
