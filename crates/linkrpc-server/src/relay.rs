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
use std::time::{Duration, Instant};

use linkrpc_client::{ClientConfig, RpcClient};
use linkrpc_common::protocol::builtin::{InfoResponse, METHOD_INFO, METHOD_METRICS};
use linkrpc_common::protocol::error::{LinkrpcError, Result};
use linkrpc_common::protocol::{Request, Response};
use linkrpc_common::transport::RequestHandler;
use linkrpc_metrics::MetricsRegistry;
use tracing::{debug, info, warn};

use crate::dispatcher::builtin_response;

/// Forwards every inbound request to one upstream endpoint.
///
/// The downstream caller gets a response carrying its own `messageId`, with
/// the upstream's result or error copied across. If the upstream call itself
/// fails (no connection, timeout, connection lost) the caller gets an error
/// response starting with `Outbound RPC call failed:`.
///
/// Built-in methods are answered by the relay and never forwarded.
pub struct Relay {
    upstream: Arc<RpcClient>,
    upstream_addr: String,
    call_timeout: Option<Duration>,
    metrics: Arc<MetricsRegistry>,
    reconnect: tokio::sync::Mutex<()>,
}

impl Relay {
    /// Wraps an upstream client, connected or not.
    ///
    /// `upstream_addr` is where the relay reconnects when it finds the
    /// upstream connection gone.
    pub fn new(upstream: Arc<RpcClient>, upstream_addr: impl Into<String>) -> Self {
        let call_timeout = upstream.config().call_timeout;
        Self {
            upstream,
            upstream_addr: upstream_addr.into(),
            call_timeout,
            metrics: Arc::new(MetricsRegistry::new()),
            reconnect: tokio::sync::Mutex::new(()),
        }
    }

    /// Connects a fresh upstream client and wraps it.
    pub async fn connect(upstream_addr: &str, config: ClientConfig) -> Result<Self> {
        let client = RpcClient::connect_to(upstream_addr, config).await?;
        info!("Relay connected to upstream {}", upstream_addr);
        Ok(Self::new(Arc::new(client), upstream_addr))
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn upstream(&self) -> &Arc<RpcClient> {
        &self.upstream
    }

    pub fn upstream_addr(&self) -> &str {
        &self.upstream_addr
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Reconnects the upstream if its connection has gone away.
    ///
    /// Concurrent callers queue on one lock so only the first one dials;
    /// the rest find the connection already back.
    async fn ensure_upstream(&self) -> Result<()> {
        if self.upstream.is_connected() {
            return Ok(());
        }
        let _guard = self.reconnect.lock().await;
        if self.upstream.is_connected() {
            return Ok(());
        }
        info!("Upstream {} is down, reconnecting", self.upstream_addr);
        self.upstream.connect(&self.upstream_addr).await
    }

    /// Relays `request` upstream and answers with the downstream id.
    pub async fn forward(&self, request: Request) -> Response {
        let Request { id, method, params, .. } = request;

        match method.as_str() {
            METHOD_METRICS => return builtin_response(id, &self.metrics.snapshot()),
            METHOD_INFO => {
                let info = InfoResponse::relay(self.metrics.uptime_ms(), self.upstream_addr.clone());
                return builtin_response(id, &info);
            }
            _ => {}
        }

        let start = Instant::now();
        let outcome = match self.ensure_upstream().await {
            Ok(()) => self.call_upstream(&method, params).await,
            Err(e) => Err(e),
        };

        let response = match outcome {
            Ok(upstream) if upstream.success => {
                debug!("Relayed {} ({}) via {}", method, id, upstream.id);
                Response::success(id, upstream.result.unwrap_or_default())
            }
            Ok(upstream) => Response::error(
                id,
                upstream.error.unwrap_or_else(|| "Unknown error".to_string()),
            ),
            Err(e) => {
                warn!("Outbound call for {} ({}) failed: {}", method, id, e);
                Response::error(id, format!("Outbound RPC call failed: {}", e))
            }
        };

        self.metrics.record_call(&method, start.elapsed(), response.success);
        response
    }

    async fn call_upstream(&self, method: &str, params: Vec<serde_json::Value>) -> Result<Response> {
        match self.call_timeout {
            Some(timeout) => self.upstream.call_with_timeout(method, params, timeout).await,
            None => {
                let pending = self.upstream.send(Request::new(method, params)).await?;
                pending.await
            }
        }
    }
}

impl RequestHandler for Relay {
    fn handle(&self, request: Request) -> impl Future<Output = Response> + Send {
        self.forward(request)
    }

    fn on_connection_opened(&self, _peer: SocketAddr) {
        self.metrics.connection_opened();
    }

    fn on_connection_closed(&self, _peer: SocketAddr) {
        self.metrics.connection_closed();
    }

    fn on_malformed_frame(&self, _peer: SocketAddr, _error: &LinkrpcError) {
        self.metrics.malformed_frame();
    }
}
