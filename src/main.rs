//! `pt-dispatcher` command line entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use pt_dispatcher::client::TransparentClient;
use pt_dispatcher::config::{DispatcherConfig, DispatcherConfigBuilder, UdpFraming};
use pt_dispatcher::core::Transport;
use pt_dispatcher::logging;
use pt_dispatcher::registry::Registry;
use pt_dispatcher::server::TransportServer;
use pt_dispatcher::udp::{UdpClientRelay, UdpServerRelay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Accept local connections and dial out through the transport.
    Client,
    /// Accept transport connections and relay them to a target.
    Server,
}

/// Pluggable transport dispatcher.
#[derive(Debug, Parser)]
#[command(name = "pt-dispatcher", version, about)]
struct Args {
    /// Role to run in.
    #[arg(long, value_enum, default_value_t = Mode::Client)]
    mode: Mode,

    /// Local address to listen on.
    #[arg(long)]
    bind: String,

    /// Destination for server mode (`host:port`).
    #[arg(long, required_if_eq("mode", "server"))]
    target: Option<String>,

    /// Relay UDP datagrams instead of TCP streams.
    #[arg(long)]
    udp: bool,

    /// Transport options as JSON, or `@path` to read them from a file.
    #[arg(long)]
    options: String,

    /// Upstream proxy URL (`http`, `socks4a` or `socks5`).
    #[arg(long)]
    proxy: Option<String>,

    /// Directory for per-transport state.
    #[arg(long, default_value = "state")]
    state_dir: PathBuf,

    /// Optimizer dial timeout in seconds.
    #[arg(long)]
    dial_timeout: Option<u64>,

    /// UDP framing: `raw` or `length-prefixed`.
    #[arg(long, default_value = "length-prefixed")]
    udp_framing: UdpFraming,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level, args.log_json);

    let config = dispatcher_config(&args)?;
    config
        .ensure_state_dir()
        .with_context(|| format!("cannot create state directory {}", config.state_dir.display()))?;

    let options = load_options(&args.options)?;
    let registry = Registry::with_config(config.clone()).context("invalid --proxy")?;
    let transport = registry
        .construct_json(&options)
        .context("invalid transport options")?;

    tokio::select! {
        result = serve(&args, &config, &registry, transport) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
            Ok(())
        }
    }
}

fn dispatcher_config(args: &Args) -> Result<DispatcherConfig> {
    let mut builder = DispatcherConfigBuilder::new()
        .state_dir(&args.state_dir)
        .udp_framing(args.udp_framing);
    if let Some(secs) = args.dial_timeout {
        builder = builder.dial_timeout(Duration::from_secs(secs));
    }
    if let Some(proxy) = &args.proxy {
        builder = builder.outbound_proxy(proxy).context("invalid --proxy")?;
    }
    Ok(builder.build())
}

fn load_options(raw: &str) -> Result<String> {
    match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read options file {path}")),
        None => Ok(raw.to_string()),
    }
}

async fn serve(
    args: &Args,
    config: &DispatcherConfig,
    registry: &Registry,
    transport: Arc<dyn Transport>,
) -> Result<()> {
    match (args.mode, args.udp) {
        (Mode::Client, false) => {
            TransparentClient::bind(&args.bind, transport).await?.run().await?;
        }
        (Mode::Client, true) => {
            UdpClientRelay::bind(&args.bind, transport, config)
                .await?
                .run()
                .await?;
        }
        (Mode::Server, false) => {
            let target = args.target.clone().context("--target is required in server mode")?;
            TransportServer::bind(
                transport.as_ref(),
                &args.bind,
                target,
                Arc::clone(registry.dialer()),
            )
            .await?
            .run()
            .await?;
        }
        (Mode::Server, true) => {
            let target = args.target.as_deref().context("--target is required in server mode")?;
            let destination: SocketAddr = tokio::net::lookup_host(target)
                .await
                .with_context(|| format!("cannot resolve {target}"))?
                .next()
                .with_context(|| format!("no address for {target}"))?;
            let listener = transport.listen(&args.bind).await?;
            UdpServerRelay::new(listener, destination, config.udp_buffer_size)
                .run()
                .await?;
        }
    }
    Ok(())
}
