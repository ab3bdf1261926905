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

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use futures::SinkExt;
use linkrpc_common::protocol::error::{LinkrpcError, Result};
use linkrpc_common::protocol::{Request, Response, RpcParams};
use linkrpc_common::transport::{
    map_io_error, FrameCodec, FrameReader, JsonCodec, TcpTransportAsync, DEFAULT_CONNECT_TIMEOUT,
    MAX_FRAME_SIZE,
};
use serde_json::Value;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, warn};

use crate::registry::{PendingCall, PendingCalls};

/// Client-side connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound on a single connect attempt, resolution included
    pub connect_timeout: Duration,
    /// Default deadline for `call`/`invoke`; `None` waits until the
    /// response arrives or the connection closes
    pub call_timeout: Option<Duration>,
    /// Largest frame accepted or sent on the connection
    pub max_frame_size: usize,
}

impl ClientConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            call_timeout: None,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

/// One live TCP connection and everything waiting on it.
struct Connection {
    peer: String,
    writer: tokio::sync::Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>,
    pending: Arc<PendingCalls>,
    reader: JoinHandle<()>,
}

impl Connection {
    async fn write(&self, frame: Bytes) -> Result<()> {
        // One writer at a time keeps frames from interleaving on the socket.
        let mut writer = self.writer.lock().await;
        writer.send(frame).await.map_err(|e| match e {
            LinkrpcError::Io(err) => map_io_error(err, "writing request"),
            other => other,
        })
    }

    async fn shutdown(&self, reason: &str) {
        let failed = self.pending.fail_all(reason);
        self.reader.abort();

        // A writer stuck on a slow peer keeps the lock; the half is then
        // released when the last in-flight call lets go of the connection.
        if let Ok(mut writer) = self.writer.try_lock() {
            let _ = writer.close().await;
        }

        debug!("Closed connection to {} ({} pending calls failed)", self.peer, failed);
    }
}

/// Async RPC client multiplexing concurrent calls over one connection.
///
/// Each call gets a fresh correlation id and is parked in a registry until
/// a response with the same id arrives. A background task reads responses
/// and completes the matching calls in whatever order they come back.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> linkrpc_common::Result<()> {
/// use linkrpc_client::RpcClient;
/// use serde_json::json;
///
/// let client = RpcClient::new();
/// client.connect("127.0.0.1:8080").await?;
/// let echoed = client.invoke("echo", vec![json!("hi")]).await?;
/// assert_eq!(echoed, json!("Echo: hi"));
/// client.close().await;
/// # Ok(())
/// # }
/// ```
pub struct RpcClient {
    config: ClientConfig,
    transport: TcpTransportAsync,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl RpcClient {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let transport = TcpTransportAsync::new().with_connect_timeout(config.connect_timeout);
        Self {
            config,
            transport,
            connection: Mutex::new(None),
        }
    }

    /// Creates a client and connects it in one step.
    pub async fn connect_to(addr: &str, config: ClientConfig) -> Result<Self> {
        let client = Self::with_config(config);
        client.connect(addr).await?;
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<Connection>>> {
        self.connection.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Establishes a connection to `addr` (`host:port`).
    ///
    /// An existing connection is closed first and every call still pending
    /// on it fails with [`LinkrpcError::ConnectionClosed`]. If the new
    /// attempt fails the client is left disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`LinkrpcError::Connect`] classified as refused, timeout,
    /// resolve or other.
    pub async fn connect(&self, addr: &str) -> Result<()> {
        let previous = self.slot().take();
        if let Some(previous) = previous {
            info!("Replacing connection to {} with {}", previous.peer, addr);
            previous.shutdown("connection replaced by reconnect").await;
        }

        let stream = self.transport.connect(addr).await?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| addr.to_string());
        let (read_half, write_half) = stream.into_split();

        let pending = Arc::new(PendingCalls::new());
        let codec = FrameCodec::with_max_frame_size(self.config.max_frame_size);
        let reader = FrameReader::new(read_half, codec.clone());
        let reader = tokio::spawn(read_responses(reader, pending.clone(), peer.clone()));

        let connection = Arc::new(Connection {
            peer: peer.clone(),
            writer: tokio::sync::Mutex::new(FramedWrite::new(write_half, codec)),
            pending,
            reader,
        });

        info!("Connected to {}", peer);
        let stale = self.slot().replace(connection);
        if let Some(stale) = stale {
            // Another connect raced us; the last one in wins.
            stale.shutdown("connection replaced by reconnect").await;
        }
        Ok(())
    }

    /// Connects to `host` and `port`; IPv6 literals may be given bare.
    pub async fn connect_host(&self, host: &str, port: u16) -> Result<()> {
        self.connect(&join_host_port(host, port)).await
    }

    /// True while a connection is installed and its read loop is alive.
    pub fn is_connected(&self) -> bool {
        self.slot()
            .as_ref()
            .map(|conn| !conn.pending.is_closed())
            .unwrap_or(false)
    }

    /// Number of calls currently waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.slot().as_ref().map(|conn| conn.pending.len()).unwrap_or(0)
    }

    fn current(&self) -> Result<Arc<Connection>> {
        match self.slot().as_ref() {
            Some(conn) if !conn.pending.is_closed() => Ok(conn.clone()),
            _ => Err(LinkrpcError::NotConnected),
        }
    }

    /// Writes `request` and returns a handle that resolves to its response.
    ///
    /// The call is registered before the frame is written so a fast response
    /// always finds its entry. If the write fails, the entry is removed
    /// again and the error is returned here.
    ///
    /// # Errors
    ///
    /// - [`LinkrpcError::NotConnected`] with no live connection; nothing is registered
    /// - [`LinkrpcError::DuplicateId`] if `request.id` is already outstanding
    /// - [`LinkrpcError::FrameTooLarge`] if the encoded request exceeds the frame limit
    /// - [`LinkrpcError::ConnectionClosed`] or [`LinkrpcError::Io`] if the write fails
    pub async fn send(&self, request: Request) -> Result<PendingCall> {
        let conn = self.current()?;
        let payload = JsonCodec::encode_request(&request)?;

        let pending = conn.pending.register(request.id.clone())?;
        debug!("Sending {} ({}) to {}", request.method, request.id, conn.peer);
        conn.write(Bytes::from(payload)).await?;
        Ok(pending)
    }

    /// Calls `method` and waits for the full response envelope.
    ///
    /// Uses the configured `call_timeout`, if any. The deadline covers the
    /// write as well as the wait, so a stalled peer cannot hold the caller
    /// past it. Remote failures come back as a response with
    /// `success == false`; see [`invoke`](Self::invoke) for a variant that
    /// turns those into errors.
    pub async fn call(&self, method: impl Into<String>, params: RpcParams) -> Result<Response> {
        let round_trip = self.round_trip(Request::new(method, params));
        match self.config.call_timeout {
            Some(timeout) => with_deadline(timeout, round_trip).await,
            None => round_trip.await,
        }
    }

    /// Like [`call`](Self::call) with an explicit deadline.
    ///
    /// On timeout the call's registry entry is removed; a response arriving
    /// later is dropped as an orphan.
    pub async fn call_with_timeout(
        &self,
        method: impl Into<String>,
        params: RpcParams,
        timeout: Duration,
    ) -> Result<Response> {
        with_deadline(timeout, self.round_trip(Request::new(method, params))).await
    }

    async fn round_trip(&self, request: Request) -> Result<Response> {
        self.send(request).await?.await
    }

    /// Calls `method` and returns its result value.
    ///
    /// # Errors
    ///
    /// Everything [`call`](Self::call) returns, plus
    /// [`LinkrpcError::Application`] carrying the remote error message.
    pub async fn invoke(&self, method: impl Into<String>, params: RpcParams) -> Result<Value> {
        self.call(method, params).await?.into_result()
    }

    /// Closes the connection, failing every pending call.
    ///
    /// Safe to call any number of times, connected or not.
    pub async fn close(&self) {
        let connection = self.slot().take();
        if let Some(connection) = connection {
            connection.shutdown("connection closed by client").await;
            info!("Disconnected from {}", connection.peer);
        }
    }
}

impl Default for RpcClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        if let Some(connection) = self.slot().take() {
            connection.pending.fail_all("client dropped");
            connection.reader.abort();
        }
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

async fn with_deadline<F>(timeout: Duration, call: F) -> Result<Response>
where
    F: Future<Output = Result<Response>>,
{
    // Dropping `call` on expiry drops its `PendingCall`, which unregisters it.
    match tokio::time::timeout(timeout, call).await {
        Ok(outcome) => outcome,
        Err(_) => Err(LinkrpcError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Inbound loop: completes pending calls until the connection ends.
///
/// Undecodable responses and oversize frames are logged and skipped. Any
/// other failure ends the loop, and everything still pending is failed.
async fn read_responses(
    mut reader: FrameReader<OwnedReadHalf>,
    pending: Arc<PendingCalls>,
    peer: String,
) {
    let reason = loop {
        match reader.next_frame().await {
            Ok(Some(frame)) => match JsonCodec::decode_response(&frame) {
                Ok(response) => {
                    let id = response.id.clone();
                    pending.resolve(&id, response);
                }
                Err(e) => warn!("Discarding undecodable response from {}: {}", peer, e),
            },
            Ok(None) => break "connection closed by peer".to_string(),
            Err(e) if !e.is_fatal_to_connection() => {
                warn!("Skipping bad frame from {}: {}", peer, e);
            }
            Err(e) => break e.to_string(),
        }
    };

    info!("Connection to {} ended: {}", peer, reason);
    pending.fail_all(reason);
}
