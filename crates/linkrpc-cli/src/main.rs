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

//! # LinkRPC CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Serve echo, calculate and processData
//! linkrpc serve -b 0.0.0.0:8080
//!
//! # Relay everything arriving on :8081 to the server on :8080
//! linkrpc relay -b 0.0.0.0:8081 -u 127.0.0.1:8080
//!
//! # Make a call (prints raw JSON)
//! linkrpc call 127.0.0.1:8081 calculate --params '[[3, 4]]'
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use argh::FromArgs;
use linkrpc_client::{ClientConfig, RpcClient};
use linkrpc_cli::{parse_params, validate_tcp_addr};
use linkrpc_common::transport::{DEFAULT_MAX_IN_FLIGHT, MAX_FRAME_SIZE};
use linkrpc_metrics::MetricsRegistry;
use linkrpc_server::{register_demo_methods, Dispatcher, Relay, RpcServer};

#[derive(FromArgs)]
/// LinkRPC - length-prefixed JSON RPC over TCP
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Relay(RelayArgs),
    Call(CallArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// start a server exposing the demo methods
struct ServeArgs {
    /// address to listen on
    #[argh(option, short = 'b', default = "\"0.0.0.0:8080\".into()")]
    bind: String,

    /// largest accepted frame payload in bytes
    #[argh(option, long = "max-frame-size", default = "MAX_FRAME_SIZE")]
    max_frame_size: usize,

    /// requests handled at once on one connection
    #[argh(option, long = "max-in-flight", default = "DEFAULT_MAX_IN_FLIGHT")]
    max_in_flight: usize,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "relay")]
/// start a relay forwarding every call to an upstream server
struct RelayArgs {
    /// address to listen on
    #[argh(option, short = 'b', default = "\"0.0.0.0:8081\".into()")]
    bind: String,

    /// upstream server address (host:port)
    #[argh(option, short = 'u', long = "upstream")]
    upstream: String,

    /// per-call deadline for upstream calls in milliseconds
    ///
    /// Without it, a relayed call waits until the upstream answers or
    /// the upstream connection closes.
    #[argh(option, long = "call-timeout-ms")]
    call_timeout_ms: Option<u64>,

    /// upstream connect timeout in milliseconds
    #[argh(option, long = "connect-timeout-ms", default = "5000")]
    connect_timeout_ms: u64,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// make one call and print the JSON result
struct CallArgs {
    /// server address (host:port)
    #[argh(positional)]
    server_address: String,

    /// method name
    #[argh(positional)]
    method: String,

    /// parameters as a JSON array
    #[argh(option, short = 'p', long = "params", default = "\"[]\".into()")]
    params: String,

    /// how long to wait for the response in milliseconds
    #[argh(option, long = "timeout-ms", default = "5000")]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // `call` writes raw JSON to stdout for piping; keep logs out of it.
    if !matches!(cli.command, Commands::Call(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Relay(args) => run_relay(args).await,
        Commands::Call(args) => run_call(args).await,
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    tracing::info!("Starting LinkRPC server");

    let mut dispatcher = Dispatcher::with_metrics(Arc::new(MetricsRegistry::new()));
    register_demo_methods(&mut dispatcher)?;
    tracing::info!("Methods: {:?}", dispatcher.method_names());

    let server = RpcServer::bind(&args.bind, Arc::new(dispatcher))
        .await?
        .with_max_frame_size(args.max_frame_size)
        .with_max_in_flight(args.max_in_flight);
    tracing::info!("Listening on {}", server.local_addr()?);

    server.run_until(shutdown_signal()).await?;
    Ok(())
}

async fn run_relay(args: RelayArgs) -> Result<()> {
    validate_tcp_addr(&args.upstream, "upstream address")?;
    tracing::info!("Starting LinkRPC relay to {}", args.upstream);

    let mut config = ClientConfig::default()
        .with_connect_timeout(Duration::from_millis(args.connect_timeout_ms));
    if let Some(ms) = args.call_timeout_ms {
        config = config.with_call_timeout(Duration::from_millis(ms));
    }

    // Start even if the upstream is down; the relay reconnects on demand.
    let client = Arc::new(RpcClient::with_config(config));
    if let Err(e) = client.connect(&args.upstream).await {
        tracing::warn!("Upstream not reachable yet: {}", e);
    }

    let relay = Relay::new(client.clone(), args.upstream.clone());
    let server = RpcServer::bind(&args.bind, Arc::new(relay)).await?;
    tracing::info!("Listening on {}", server.local_addr()?);

    server.run_until(shutdown_signal()).await?;
    client.close().await;
    Ok(())
}

/// Executes the `call` subcommand and prints the result as JSON.
///
/// A remote error is reported on stderr with a non-zero exit status.
async fn run_call(args: CallArgs) -> Result<()> {
    validate_tcp_addr(&args.server_address, "server address")?;
    let params = parse_params(&args.params)?;

    let config = ClientConfig::default().with_call_timeout(Duration::from_millis(args.timeout_ms));
    let client = RpcClient::connect_to(&args.server_address, config).await?;
    let result = client.invoke(&args.method, params).await;
    client.close().await;

    println!("{}", serde_json::to_string(&result?)?);
    Ok(())
}
