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

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use linkrpc_common::protocol::builtin::{is_builtin, InfoResponse, METHOD_INFO, METHOD_METRICS};
use linkrpc_common::protocol::error::{LinkrpcError, Result};
use linkrpc_common::protocol::{Request, Response, RpcParams};
use linkrpc_common::transport::RequestHandler;
use linkrpc_metrics::MetricsRegistry;
use tracing::{debug, error, warn};

use crate::error::MethodResult;

type BoxedMethod = Arc<dyn Fn(RpcParams) -> BoxFuture<'static, MethodResult> + Send + Sync>;

/// Routes requests to registered methods by name.
///
/// Built-in methods (`_metrics`, `_info`) are answered before the method
/// table is consulted. Every request yields exactly one response carrying
/// the request's id: unknown methods, handler errors and handler panics all
/// become error responses.
pub struct Dispatcher {
    methods: HashMap<String, BoxedMethod>,
    metrics: Arc<MetricsRegistry>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(MetricsRegistry::new()))
    }

    /// Creates a dispatcher recording into a caller-owned registry.
    pub fn with_metrics(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            methods: HashMap::new(),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Registers a synchronous method, replacing any previous one of the
    /// same name.
    ///
    /// # Errors
    ///
    /// Returns [`LinkrpcError::InvalidRequest`] for an empty or built-in name.
    pub fn register<F>(&mut self, name: impl Into<String>, method: F) -> Result<()>
    where
        F: Fn(RpcParams) -> MethodResult + Send + Sync + 'static,
    {
        let method = Arc::new(method);
        self.insert(
            name.into(),
            Arc::new(move |params| {
                let method = method.clone();
                // Run inside the future so a panic is caught with the rest.
                async move { method(params) }.boxed()
            }),
        )
    }

    /// Registers an async method.
    pub fn register_async<F, Fut>(&mut self, name: impl Into<String>, method: F) -> Result<()>
    where
        F: Fn(RpcParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        let method = Arc::new(method);
        self.insert(
            name.into(),
            Arc::new(move |params| {
                let method = method.clone();
                // Build the future lazily; the closure itself may panic.
                async move { method(params).await }.boxed()
            }),
        )
    }

    fn insert(&mut self, name: String, method: BoxedMethod) -> Result<()> {
        if name.is_empty() {
            return Err(LinkrpcError::InvalidRequest("method name must not be empty".to_string()));
        }
        if is_builtin(&name) {
            return Err(LinkrpcError::InvalidRequest(format!("method name {} is reserved", name)));
        }
        if self.methods.insert(name.clone(), method).is_some() {
            warn!("Replacing previously registered method {}", name);
        }
        Ok(())
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Produces the response for `request`.
    pub async fn dispatch(&self, request: Request) -> Response {
        let Request { id, method, params, .. } = request;
        debug!("Dispatching {} ({})", method, id);

        match method.as_str() {
            METHOD_METRICS => return builtin_response(id, &self.metrics.snapshot()),
            METHOD_INFO => return builtin_response(id, &InfoResponse::server(self.metrics.uptime_ms())),
            _ => {}
        }

        let Some(handler) = self.methods.get(&method) else {
            warn!("Unknown method {} requested ({})", method, id);
            self.metrics.unknown_method();
            return Response::error(id, format!("Unknown method: {}", method));
        };

        let start = Instant::now();

        // The handler is called inside the guarded future so a fault raised
        // while building its future is caught too.
        let call = async move { handler(params).await };
        let outcome = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                debug!("Method {} failed: {}", method, e);
                Err(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Method {} panicked: {}", method, message);
                Err(format!("Method {} failed: {}", method, message))
            }
        };

        self.metrics.record_call(&method, start.elapsed(), outcome.is_ok());
        Response::from_outcome(id, outcome)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestHandler for Dispatcher {
    fn handle(&self, request: Request) -> impl Future<Output = Response> + Send {
        self.dispatch(request)
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

/// Serializes a built-in's payload into a response for `id`.
pub(crate) fn builtin_response<T: serde::Serialize>(id: String, payload: &T) -> Response {
    match serde_json::to_value(payload) {
        Ok(value) => Response::success(id, value),
        Err(e) => Response::error(id, format!("Failed to serialize built-in response: {}", e)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
