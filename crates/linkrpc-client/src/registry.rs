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

//! Pending-call registry.
//!
//! Maps correlation ids to the one-shot slot their caller is waiting on.
//! The write path registers, the read path resolves and connection teardown
//! fails everything left; all three may run concurrently on different tasks.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};

use linkrpc_common::protocol::error::{LinkrpcError, Result};
use linkrpc_common::protocol::{MessageId, Response};
use tokio::sync::oneshot;
use tracing::{debug, warn};

type ResponseSender = oneshot::Sender<Result<Response>>;

#[derive(Default)]
struct RegistryState {
    calls: HashMap<MessageId, ResponseSender>,
    /// Set once by `fail_all`; later registrations are refused with this reason.
    closed: Option<String>,
}

/// Concurrent map from correlation id to an outstanding call.
///
/// Every entry is completed exactly once: by a response, by an explicit
/// failure, or by [`fail_all`](Self::fail_all). Entries are removed in the
/// same critical section that claims them, so a racing `resolve` and
/// `fail_all` can never both complete the same call.
#[derive(Default)]
pub struct PendingCalls {
    state: Mutex<RegistryState>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        // No code path panics while holding the lock, but don't let a
        // poisoned lock strand every pending caller.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts a new pending call under `id` and returns its handle.
    ///
    /// # Errors
    ///
    /// - [`LinkrpcError::DuplicateId`] if `id` is already outstanding
    /// - [`LinkrpcError::ConnectionClosed`] once the registry has been failed
    pub fn register(self: &Arc<Self>, id: impl Into<MessageId>) -> Result<PendingCall> {
        let id = id.into();
        let (tx, rx) = oneshot::channel();

        {
            let mut state = self.state();
            if let Some(reason) = &state.closed {
                return Err(LinkrpcError::ConnectionClosed(reason.clone()));
            }
            if state.calls.contains_key(&id) {
                return Err(LinkrpcError::DuplicateId(id));
            }
            state.calls.insert(id.clone(), tx);
        }

        Ok(PendingCall {
            id,
            rx,
            registry: Arc::downgrade(self),
        })
    }

    /// Completes the call `id` with `response`.
    ///
    /// Returns `false` for an orphan response (no such call outstanding),
    /// which is logged and otherwise ignored.
    pub fn resolve(&self, id: &str, response: Response) -> bool {
        self.complete(id, Ok(response))
    }

    /// Completes the call `id` with `error`, if it is still outstanding.
    pub fn fail(&self, id: &str, error: LinkrpcError) -> bool {
        self.complete(id, Err(error))
    }

    fn complete(&self, id: &str, outcome: Result<Response>) -> bool {
        let sender = self.state().calls.remove(id);
        match sender {
            Some(sender) => {
                // The receiver may have been dropped in the meantime; the
                // call is still over either way.
                let _ = sender.send(outcome);
                true
            }
            None => {
                warn!("Discarding orphan response for message {}", id);
                false
            }
        }
    }

    /// Forgets the call `id` without completing it.
    ///
    /// Used by abandoned calls (timeouts, dropped futures). A response that
    /// arrives afterwards becomes an orphan.
    pub fn remove(&self, id: &str) -> bool {
        self.state().calls.remove(id).is_some()
    }

    /// Fails every outstanding call with [`LinkrpcError::ConnectionClosed`]
    /// and refuses further registrations.
    ///
    /// Returns how many calls were failed. Calling it again is harmless and
    /// returns 0.
    pub fn fail_all(&self, reason: impl Into<String>) -> usize {
        let reason = reason.into();
        let drained: Vec<ResponseSender> = {
            let mut state = self.state();
            if state.closed.is_none() {
                state.closed = Some(reason.clone());
            }
            state.calls.drain().map(|(_, sender)| sender).collect()
        };

        let count = drained.len();
        for sender in drained {
            let _ = sender.send(Err(LinkrpcError::ConnectionClosed(reason.clone())));
        }
        if count > 0 {
            debug!("Failed {} pending calls: {}", count, reason);
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed.is_some()
    }

    pub fn len(&self) -> usize {
        self.state().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for one outstanding call; resolves to its response.
///
/// Dropping the handle before it resolves removes the registry entry, so a
/// timed-out or cancelled call never keeps a slot alive.
pub struct PendingCall {
    id: MessageId,
    rx: oneshot::Receiver<Result<Response>>,
    registry: Weak<PendingCalls>,
}

impl PendingCall {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Future for PendingCall {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(LinkrpcError::ConnectionClosed(
                "pending call was discarded".to_string(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_register_and_resolve() {
        let registry = Arc::new(PendingCalls::new());
        let call = registry.register("a").unwrap();
        assert_eq!(call.id(), "a");
        assert_eq!(registry.len(), 1);

        assert!(registry.resolve("a", Response::success("a", json!(1))));
        assert!(registry.is_empty());

        let response = call.await.unwrap();
        assert_eq!(response.result, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let registry = Arc::new(PendingCalls::new());
        let _first = registry.register("dup").unwrap();
        match registry.register("dup") {
            Err(LinkrpcError::DuplicateId(id)) => assert_eq!(id, "dup"),
            other => panic!("expected DuplicateId, got {:?}", other.map(|c| c.id().to_string())),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_orphan_resolve_is_ignored() {
        let registry = PendingCalls::new();
        assert!(!registry.resolve("ghost", Response::success("ghost", json!(null))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_second_resolve_is_an_orphan() {
        let registry = Arc::new(PendingCalls::new());
        let call = registry.register("once").unwrap();

        assert!(registry.resolve("once", Response::success("once", json!(1))));
        assert!(!registry.resolve("once", Response::success("once", json!(2))));

        assert_eq!(call.await.unwrap().result, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_fail_all_fails_every_call_once() {
        let registry = Arc::new(PendingCalls::new());
        let calls: Vec<_> = (0..5).map(|i| registry.register(format!("c{}", i)).unwrap()).collect();

        assert_eq!(registry.fail_all("connection closed"), 5);
        assert!(registry.is_empty());
        assert_eq!(registry.fail_all("again"), 0);

        for call in calls {
            assert!(matches!(call.await, Err(LinkrpcError::ConnectionClosed(_))));
        }

        // Late responses after teardown are orphans.
        assert!(!registry.resolve("c0", Response::success("c0", json!(0))));
    }

    #[tokio::test]
    async fn test_register_after_fail_all_is_refused() {
        let registry = Arc::new(PendingCalls::new());
        registry.fail_all("peer went away");
        assert!(registry.is_closed());
        match registry.register("late") {
            Err(LinkrpcError::ConnectionClosed(reason)) => assert_eq!(reason, "peer went away"),
            other => panic!("expected ConnectionClosed, got {:?}", other.map(|c| c.id().to_string())),
        }
    }

    #[tokio::test]
    async fn test_dropped_call_removes_its_entry() {
        let registry = Arc::new(PendingCalls::new());
        let call = registry.register("abandoned").unwrap();
        drop(call);
        assert!(registry.is_empty());
        assert!(!registry.resolve("abandoned", Response::success("abandoned", json!(1))));
    }

    #[tokio::test]
    async fn test_timed_out_call_turns_response_into_orphan() {
        let registry = Arc::new(PendingCalls::new());
        let call = registry.register("slow").unwrap();

        let timed_out = tokio::time::timeout(Duration::from_millis(10), call).await;
        assert!(timed_out.is_err());
        assert!(registry.is_empty());
        assert!(!registry.resolve("slow", Response::success("slow", json!(1))));
    }

    #[tokio::test]
    async fn test_fail_single_call() {
        let registry = Arc::new(PendingCalls::new());
        let call = registry.register("x").unwrap();
        assert!(registry.fail("x", LinkrpcError::Timeout(5)));
        assert!(matches!(call.await, Err(LinkrpcError::Timeout(5))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_and_resolve() {
        let registry = Arc::new(PendingCalls::new());
        let mut waiters = Vec::new();

        for i in 0..200 {
            let registry = registry.clone();
            waiters.push(tokio::spawn(async move {
                let id = format!("id-{}", i);
                let call = registry.register(id.clone()).unwrap();
                let resolver = registry.clone();
                tokio::spawn(async move {
                    resolver.resolve(&id, Response::success(id.clone(), json!(i)));
                });
                call.await.unwrap()
            }));
        }

        for (i, waiter) in waiters.into_iter().enumerate() {
            let response = waiter.await.unwrap();
            assert_eq!(response.result, Some(json!(i)));
        }
        assert!(registry.is_empty());
    }
}
