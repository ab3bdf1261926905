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
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::SinkExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::codec::FramedWrite;
use tracing::{debug, error, info, warn};

use crate::protocol::error::{LinkrpcError, Result};
use crate::protocol::{Request, Response};
use crate::transport::codec::JsonCodec;
use crate::transport::frame::{FrameCodec, MAX_FRAME_SIZE};
use crate::transport::reader::FrameReader;

/// Responses waiting for the connection's writer.
const RESPONSE_QUEUE_DEPTH: usize = 256;

/// Default cap on requests being handled at once on one connection.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Turns requests into responses for a [`TcpServer`].
///
/// The handler is shared by every connection. `handle` must always produce
/// a response whose id equals the request's id; failures are expressed as
/// error responses, never as missing replies.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: Request) -> impl Future<Output = Response> + Send;

    fn on_connection_opened(&self, _peer: SocketAddr) {}

    fn on_connection_closed(&self, _peer: SocketAddr) {}

    /// Called for every frame that could not be turned into a request.
    fn on_malformed_frame(&self, _peer: SocketAddr, _error: &LinkrpcError) {}
}

/// Adapts an async closure into a [`RequestHandler`].
pub struct FnHandler<F>(pub F);

impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, request: Request) -> impl Future<Output = Response> + Send {
        (self.0)(request)
    }
}

/// Async TCP server for LinkRPC.
///
/// Every accepted connection runs in its own task with one read loop and one
/// writer task. Requests on a connection are handled concurrently, so
/// responses may leave in a different order than their requests arrived;
/// the writer is the only task touching the socket's write half, which keeps
/// frames from interleaving.
///
/// At most `max_in_flight` requests per connection are handled at once; past
/// that the read loop stops reading until a handler finishes, so a peer that
/// never collects its responses is pushed back through TCP flow control.
pub struct TcpServer {
    listener: TcpListener,
    max_frame_size: usize,
    max_in_flight: usize,
}

impl TcpServer {
    /// Creates a new TCP server bound to the specified address.
    ///
    /// # Arguments
    /// * `bind_addr` - The address to bind to (e.g., "0.0.0.0:8081")
    pub async fn new(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
            LinkrpcError::InvalidRequest(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        Ok(Self {
            listener,
            max_frame_size: MAX_FRAME_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        })
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Caps concurrently handled requests per connection. Zero is raised to one.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Gets the actual bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, serving each with `handler`.
    pub async fn run_with_handler<H: RequestHandler>(&self, handler: Arc<H>) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            info!("Connection established from {}", peer);

            let handler = handler.clone();
            let max_frame_size = self.max_frame_size;
            let max_in_flight = self.max_in_flight;
            tokio::spawn(async move {
                handler.on_connection_opened(peer);
                handle_connection(stream, peer, handler.clone(), max_frame_size, max_in_flight).await;
                handler.on_connection_closed(peer);
                info!("Connection from {} closed", peer);
            });
        }
    }

    /// Like [`run_with_handler`](Self::run_with_handler), but returns once
    /// `shutdown` completes. Connections already accepted keep running until
    /// their peers disconnect.
    pub async fn run_until<H, S>(&self, handler: Arc<H>, shutdown: S) -> Result<()>
    where
        H: RequestHandler,
        S: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run_with_handler(handler) => result,
            _ = shutdown => {
                info!("Server shutting down");
                Ok(())
            }
        }
    }
}

/// Serves one connection until the peer disconnects or the stream fails.
async fn handle_connection<H: RequestHandler>(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<H>,
    max_frame_size: usize,
    max_in_flight: usize,
) {
    let (read_half, write_half) = stream.into_split();
    let in_flight = Arc::new(Semaphore::new(max_in_flight));
    let (tx, rx) = mpsc::channel::<Response>(RESPONSE_QUEUE_DEPTH);

    let writer = tokio::spawn(write_responses(
        FramedWrite::new(write_half, FrameCodec::with_max_frame_size(max_frame_size)),
        rx,
        peer,
    ));

    let mut reader = FrameReader::new(read_half, FrameCodec::with_max_frame_size(max_frame_size));

    loop {
        let frame = match reader.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Connection closed by peer {}", peer);
                break;
            }
            Err(e) if !e.is_fatal_to_connection() => {
                warn!("Discarding frame from {}: {}", peer, e);
                handler.on_malformed_frame(peer, &e);
                continue;
            }
            Err(e) => {
                warn!("Read error on connection from {}: {}", peer, e);
                break;
            }
        };

        let request = match JsonCodec::decode_request(&frame) {
            Ok(request) => request,
            Err(e) => {
                handler.on_malformed_frame(peer, &e);
                match JsonCodec::peek_message_id(&frame) {
                    Some(id) => {
                        warn!("Malformed request {} from {}: {}", id, peer, e);
                        if tx.send(Response::error(id, e.to_string())).await.is_err() {
                            break;
                        }
                    }
                    None => warn!("Discarding unidentifiable frame from {}: {}", peer, e),
                }
                continue;
            }
        };

        debug!("Request {} ({}) from {}", request.id, request.method, peer);

        // Never closed, so acquiring only waits.
        let Ok(permit) = in_flight.clone().acquire_owned().await else {
            break;
        };

        let handler = handler.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = handler.handle(request).await;
            // The writer only goes away once the socket is dead.
            let _ = tx.send(response).await;
            drop(permit);
        });
    }

    // In-flight handlers hold their own senders; the writer drains them
    // before finishing.
    drop(tx);
    if let Err(e) = writer.await {
        error!("Writer task for {} failed: {}", peer, e);
    }
}

async fn write_responses(
    mut sink: FramedWrite<OwnedWriteHalf, FrameCodec>,
    mut rx: mpsc::Receiver<Response>,
    peer: SocketAddr,
) {
    while let Some(response) = rx.recv().await {
        let id = response.id.clone();
        let result = match JsonCodec::encode_response(&response) {
            Ok(payload) => sink.send(Bytes::from(payload)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => debug!("Response {} sent to {}", id, peer),
            Err(e) if !e.is_fatal_to_connection() || matches!(e, LinkrpcError::JsonSerialization(_)) => {
                // Nothing was written; answer the caller with a small error instead.
                warn!("Response {} to {} could not be sent: {}", id, peer, e);
                let fallback = Response::error(id, format!("Response could not be sent: {}", e));
                let sent = match JsonCodec::encode_response(&fallback) {
                    Ok(payload) => sink.send(Bytes::from(payload)).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = sent {
                    warn!("Failed to send fallback response to {}: {}", peer, e);
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to send response to {}: {}", peer, e);
                break;
            }
        }
    }
}
