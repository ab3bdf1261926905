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

//! # LinkRPC CLI
//!
//! Command-line interface for LinkRPC.
//!
//! ## Key Commands
//!
//! - `linkrpc serve`: Start a server exposing the demo methods
//! - `linkrpc relay`: Start a relay forwarding every call to an upstream
//! - `linkrpc call`: Make one call and print the JSON result

use anyhow::{anyhow, Result};
use linkrpc_common::protocol::RpcParams;
use serde_json::Value;

/// Parses the `--params` argument of `linkrpc call`.
///
/// A JSON array is used as the positional parameter list. Any other JSON
/// value becomes the only parameter, so `--params '"hi"'` and
/// `--params '["hi"]'` mean the same thing.
///
/// # Errors
///
/// Returns an error if `raw` is not valid JSON.
pub fn parse_params(raw: &str) -> Result<RpcParams> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| anyhow!("Invalid JSON in params: {}", e))?;
    Ok(match value {
        Value::Array(values) => values,
        other => vec![other],
    })
}

/// Checks that `addr` looks like `host:port`.
///
/// The LinkRPC wire protocol is raw TCP, so URL-style addresses are refused
/// up front with a hint rather than failing later during resolution.
pub fn validate_tcp_addr(addr: &str, description: &str) -> Result<()> {
    if addr.contains("://") {
        return Err(anyhow!(
            "Invalid {}: '{}' must be host:port without a scheme",
            description,
            addr
        ));
    }
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(anyhow!("Invalid {}: '{}' must be host:port", description, addr)),
    }
}
