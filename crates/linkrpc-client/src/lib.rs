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

//! # linkrpc-client
//!
//! Async client for LinkRPC servers and relays.
//!
//! One [`RpcClient`] holds one TCP connection and multiplexes any number of
//! concurrent calls over it; responses are matched back to callers by
//! `messageId` through the [`PendingCalls`] registry.

pub mod client;
pub mod registry;

pub use client::{ClientConfig, RpcClient};
pub use registry::{PendingCall, PendingCalls};
