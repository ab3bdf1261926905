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

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::snapshot::{MethodMetrics, MetricsSnapshot};

/// Default cap on distinct method names tracked per registry.
pub const DEFAULT_MAX_METHODS: usize = 1000;

/// Name under which calls are counted once the method cap is reached.
pub const OVERFLOW_METHOD: &str = "<other>";

#[derive(Debug, Default)]
struct MethodStats {
    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    total_latency_us: AtomicU64,
    max_latency_us: AtomicU64,
}

impl MethodStats {
    fn record(&self, latency_us: u64, success: bool) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.max_latency_us.fetch_max(latency_us, Ordering::Relaxed);
    }

    fn to_metrics(&self) -> MethodMetrics {
        let calls = self.calls.load(Ordering::Relaxed);
        let total = self.total_latency_us.load(Ordering::Relaxed);
        MethodMetrics {
            call_count: calls,
            success_count: self.successes.load(Ordering::Relaxed),
            failure_count: self.failures.load(Ordering::Relaxed),
            avg_latency_us: if calls == 0 { 0 } else { total / calls },
            max_latency_us: self.max_latency_us.load(Ordering::Relaxed),
        }
    }
}

/// Thread-safe store for server counters.
///
/// Counters are plain atomics; the per-method table sits behind an `RwLock`
/// that is only write-locked the first time a method name is seen. Method
/// names come from the wire, so the table is capped at `max_methods`
/// entries and anything beyond is folded into [`OVERFLOW_METHOD`].
#[derive(Debug)]
pub struct MetricsRegistry {
    started: Instant,
    max_methods: usize,
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    active_connections: AtomicU64,
    total_connections: AtomicU64,
    malformed_frames: AtomicU64,
    unknown_method_calls: AtomicU64,
    methods: RwLock<HashMap<String, Arc<MethodStats>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_max_methods(DEFAULT_MAX_METHODS)
    }

    pub fn with_max_methods(max_methods: usize) -> Self {
        Self {
            started: Instant::now(),
            max_methods: max_methods.max(1),
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            total_connections: AtomicU64::new(0),
            malformed_frames: AtomicU64::new(0),
            unknown_method_calls: AtomicU64::new(0),
            methods: RwLock::new(HashMap::new()),
        }
    }

    fn method_stats(&self, method: &str) -> Arc<MethodStats> {
        {
            let methods = self.methods.read().unwrap_or_else(|e| e.into_inner());
            if let Some(stats) = methods.get(method) {
                return stats.clone();
            }
        }

        let mut methods = self.methods.write().unwrap_or_else(|e| e.into_inner());
        let key = if methods.len() >= self.max_methods && !methods.contains_key(method) {
            OVERFLOW_METHOD
        } else {
            method
        };
        methods.entry(key.to_string()).or_default().clone()
    }

    /// Records one completed call.
    pub fn record_call(&self, method: &str, latency: Duration, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        let latency_us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.method_stats(method).record(latency_us, success);
    }

    /// Records a call to a method nobody registered.
    ///
    /// Counted as a failed request but kept out of the per-method table.
    pub fn unknown_method(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        self.unknown_method_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // Saturate rather than wrap if open/close calls ever get unbalanced.
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let methods = self
            .methods
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, stats)| (name.clone(), stats.to_metrics()))
            .collect();

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            unknown_method_calls: self.unknown_method_calls.load(Ordering::Relaxed),
            uptime_ms: self.uptime_ms(),
            methods,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_record_call_counts() {
        let registry = MetricsRegistry::new();
        registry.record_call("echo", Duration::from_micros(10), true);
        registry.record_call("echo", Duration::from_micros(30), true);
        registry.record_call("calculate", Duration::from_micros(5), false);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.successful_requests, 2);
        assert_eq!(snapshot.failed_requests, 1);

        let echo = &snapshot.methods["echo"];
        assert_eq!(echo.call_count, 2);
        assert_eq!(echo.success_count, 2);
        assert_eq!(echo.avg_latency_us, 20);
        assert_eq!(echo.max_latency_us, 30);

        let calculate = &snapshot.methods["calculate"];
        assert_eq!(calculate.failure_count, 1);
    }

    #[test]
    fn test_unknown_method_counts_as_failure() {
        let registry = MetricsRegistry::new();
        registry.unknown_method();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.unknown_method_calls, 1);
        assert!(snapshot.methods.is_empty());
    }

    #[test]
    fn test_connection_counters() {
        let registry = MetricsRegistry::new();
        registry.connection_opened();
        registry.connection_opened();
        registry.connection_closed();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.active_connections, 1);
        assert_eq!(snapshot.total_connections, 2);
    }

    #[test]
    fn test_connection_closed_never_underflows() {
        let registry = MetricsRegistry::new();
        registry.connection_closed();
        assert_eq!(registry.snapshot().active_connections, 0);
    }

    #[test]
    fn test_method_cap_folds_into_overflow() {
        let registry = MetricsRegistry::with_max_methods(2);
        registry.record_call("a", Duration::ZERO, true);
        registry.record_call("b", Duration::ZERO, true);
        registry.record_call("c", Duration::ZERO, true);
        registry.record_call("d", Duration::ZERO, true);
        registry.record_call("a", Duration::ZERO, true);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.methods.len(), 3);
        assert_eq!(snapshot.methods["a"].call_count, 2);
        assert_eq!(snapshot.methods[OVERFLOW_METHOD].call_count, 2);
        assert_eq!(snapshot.total_requests, 5);
    }

    #[test]
    fn test_snapshot_serializes() {
        let registry = MetricsRegistry::new();
        registry.malformed_frame();
        registry.record_call("echo", Duration::from_micros(1), true);

        let value = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(value["malformed_frames"], 1);
        assert_eq!(value["methods"]["echo"]["call_count"], 1);
        assert!(value["uptime_ms"].is_u64());
    }

    #[test]
    fn test_concurrent_recording() {
        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        registry.record_call(&format!("m{}", t % 2), Duration::from_micros(1), true);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.total_requests, 800);
        assert_eq!(snapshot.methods["m0"].call_count, 400);
        assert_eq!(snapshot.methods["m1"].call_count, 400);
    }
}
