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

use std::io::ErrorKind;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::protocol::error::{ConnectErrorKind, LinkrpcError, Result};

/// Default timeout for establishing a TCP connection (5 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Async TCP connector for LinkRPC.
///
/// Resolves the address, tries each resolved socket address in turn and
/// classifies the failure into a [`ConnectErrorKind`] so callers can tell a
/// refused connection from a DNS failure or a timeout.
///
/// # Example
///
/// ```no_run
/// use linkrpc_common::transport::TcpTransportAsync;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = TcpTransportAsync::new();
/// let stream = transport.connect("127.0.0.1:8081").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TcpTransportAsync {
    connect_timeout: Duration,
}

impl TcpTransportAsync {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connects to a remote endpoint.
    ///
    /// The whole attempt, resolution included, is bounded by the connect
    /// timeout. `TCP_NODELAY` is set on the returned stream.
    ///
    /// # Errors
    ///
    /// Returns [`LinkrpcError::Connect`] with:
    /// - `Resolve` if the host cannot be resolved or resolves to nothing
    /// - `Refused` if every address refused the connection
    /// - `Timeout` if the timeout elapsed first
    /// - `Other` for any other socket error
    pub async fn connect(&self, addr: &str) -> Result<TcpStream> {
        match tokio::time::timeout(self.connect_timeout, Self::connect_any(addr)).await {
            Ok(result) => result,
            Err(_) => Err(LinkrpcError::Connect {
                addr: addr.to_string(),
                kind: ConnectErrorKind::Timeout,
                message: format!("no connection after {}ms", self.connect_timeout.as_millis()),
            }),
        }
    }

    async fn connect_any(addr: &str) -> Result<TcpStream> {
        let socket_addrs = tokio::net::lookup_host(addr)
            .await
            .map_err(|e| LinkrpcError::Connect {
                addr: addr.to_string(),
                kind: ConnectErrorKind::Resolve,
                message: e.to_string(),
            })?;

        // Try each resolved address until one succeeds
        let mut last_err = None;
        for socket_addr in socket_addrs {
            match TcpStream::connect(socket_addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) => LinkrpcError::Connect {
                addr: addr.to_string(),
                kind: classify_connect_error(&e),
                message: e.to_string(),
            },
            None => LinkrpcError::Connect {
                addr: addr.to_string(),
                kind: ConnectErrorKind::Resolve,
                message: "address resolved to nothing".to_string(),
            },
        })
    }
}

impl Default for TcpTransportAsync {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_connect_error(err: &std::io::Error) -> ConnectErrorKind {
    match err.kind() {
        ErrorKind::ConnectionRefused => ConnectErrorKind::Refused,
        ErrorKind::TimedOut => ConnectErrorKind::Timeout,
        _ => ConnectErrorKind::Other,
    }
}

/// Map IO errors on an established stream to LinkrpcError variants
///
/// - Peer resets, aborts, broken pipes and early EOF -> `ConnectionClosed`
/// - Everything else -> `Io`
pub fn map_io_error(err: std::io::Error, context: &str) -> LinkrpcError {
    match err.kind() {
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof => {
            LinkrpcError::ConnectionClosed(format!("{}: {}", context, err))
        }
        _ => LinkrpcError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = TcpTransportAsync::new().connect(&addr).await.unwrap_err();
        match err {
            LinkrpcError::Connect { kind, .. } => assert_eq!(kind, ConnectErrorKind::Refused),
            other => panic!("expected connect error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_bad_address_is_resolve_error() {
        let err = TcpTransportAsync::new().connect("not an address").await.unwrap_err();
        assert!(matches!(
            err,
            LinkrpcError::Connect { kind: ConnectErrorKind::Resolve, .. }
        ));
    }

    #[tokio::test]
    async fn test_connect_success() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let stream = TcpTransportAsync::new().connect(&addr).await.unwrap();
        assert!(stream.nodelay().unwrap());
    }

    #[test]
    fn test_map_io_error() {
        let reset = std::io::Error::new(ErrorKind::ConnectionReset, "reset");
        assert!(matches!(map_io_error(reset, "reading"), LinkrpcError::ConnectionClosed(_)));

        let other = std::io::Error::new(ErrorKind::PermissionDenied, "nope");
        assert!(matches!(map_io_error(other, "reading"), LinkrpcError::Io(_)));
    }
}
