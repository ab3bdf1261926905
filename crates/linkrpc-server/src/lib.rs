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

//! LinkRPC Server
//!
//! Request handlers for the LinkRPC TCP server: a [`Dispatcher`] that routes
//! requests to registered methods, and a [`Relay`] that forwards them to an
//! upstream endpoint through an [`RpcClient`](linkrpc_client::RpcClient).
//! [`RpcServer`] binds either one to a listening socket.

pub mod dispatcher;
pub mod error;
pub mod methods;
pub mod params;
pub mod relay;
pub mod server;

pub use dispatcher::Dispatcher;
pub use error::{MethodError, MethodResult};
pub use methods::register_demo_methods;
pub use params::{Operand, Params};
pub use relay::Relay;
pub use server::{RpcServer, ServerHandle};
