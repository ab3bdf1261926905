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

use std::net::SocketAddr;
use std::sync::Arc;

use linkrpc_common::protocol::error::{LinkrpcError, Result};
use linkrpc_common::transport::{RequestHandler, TcpServer};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

/// A bound listener paired with the handler that serves it.
///
/// `H` is usually a [`Dispatcher`](crate::Dispatcher) or a
/// [`Relay`](crate::Relay).
pub struct RpcServer<H: RequestHandler> {
    server: TcpServer,
    handler: Arc<H>,
}

impl<H: RequestHandler> RpcServer<H> {
    /// Binds `addr`. Use port 0 to let the OS pick one, then read it back
    /// with [`local_addr`](Self::local_addr).
    pub async fn bind(addr: &str, handler: Arc<H>) -> Result<Self> {
        let server = TcpServer::new(addr).await?;
        Ok(Self { server, handler })
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.server = self.server.with_max_frame_size(max_frame_size);
        self
    }

    /// Caps requests handled at once on each connection.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.server = self.server.with_max_in_flight(max_in_flight);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.server.local_addr()
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Serves until the task is cancelled.
    pub async fn run(&self) -> Result<()> {
        info!("Serving on {}", self.local_addr()?);
        self.server.run_with_handler(self.handler.clone()).await
    }

    /// Serves until `shutdown` completes.
    pub async fn run_until<S>(&self, shutdown: S) -> Result<()>
    where
        S: std::future::Future<Output = ()>,
    {
        info!("Serving on {}", self.local_addr()?);
        self.server.run_until(self.handler.clone(), shutdown).await
    }

    /// Runs the server on a background task.
    pub fn spawn(self) -> Result<ServerHandle> {
        let local_addr = self.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            self.run_until(async {
                let _ = shutdown_rx.await;
            })
            .await
        });

        Ok(ServerHandle {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }
}

/// Control handle for a server started with [`RpcServer::spawn`].
///
/// Shutting down stops accepting; connections already open keep being
/// served until their peers disconnect.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match (&mut self.task).await {
            Ok(result) => result,
            Err(e) => Err(LinkrpcError::Io(std::io::Error::other(e))),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
