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

//! LinkRPC Metrics
//!
//! Call, connection and malformed-frame counters for LinkRPC servers and
//! relays. A [`MetricsRegistry`] is created by the caller and injected into
//! whatever needs to record into it; the built-in `_metrics` method returns
//! its [`MetricsSnapshot`].
//!
//! ```rust
//! use linkrpc_metrics::MetricsRegistry;
//! use std::time::Duration;
//!
//! let registry = MetricsRegistry::new();
//! registry.record_call("echo", Duration::from_micros(42), true);
//! assert_eq!(registry.snapshot().total_requests, 1);
//! ```

mod registry;
mod snapshot;

pub use registry::{MetricsRegistry, DEFAULT_MAX_METHODS, OVERFLOW_METHOD};
pub use snapshot::{MethodMetrics, MetricsSnapshot};
