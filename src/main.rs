//! Throttle proxy CLI
//!
//! Accepts TCP connections on a local address and forwards each one to a
//! target address through a single rate-limited dialer, so the configured
//! rate caps aggregate upstream egress across all proxied connections.
//! Useful for emulating constrained links in front of a real service.

use anyhow::{Context, Result};
use clap::Parser;
use conn_rate_limit::{Conn, Dialer, RateLimitedDialer, TcpDialer, ThrottleConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Bandwidth-throttling TCP forwarder
#[derive(Parser, Debug)]
#[command(name = "throttle-proxy")]
#[command(version)]
#[command(about = "Forward TCP connections through a rate-limited dialer", long_about = None)]
struct Args {
    /// Local address to listen on
    #[arg(short, long, default_value = "127.0.0.1:9000")]
    listen: String,

    /// Target address to forward to
    #[arg(short, long)]
    target: String,

    /// Upstream egress rate in bytes per second
    #[arg(short, long, default_value_t = 1_048_576.0)]
    rate: f64,

    /// Burst capacity in bytes
    #[arg(short, long, default_value_t = 0)]
    burst: u64,

    /// Configuration file path (JSON); overrides --rate/--burst
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON log format
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }

    let config = if let Some(config_path) = &args.config {
        info!(path = %config_path.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        serde_json::from_str(&content).context("parsing throttle configuration")?
    } else {
        ThrottleConfig {
            rate_bytes_per_sec: args.rate,
            burst_bytes: args.burst,
        }
    };
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %args.listen,
        target = %args.target,
        rate = config.rate_bytes_per_sec,
        burst = config.burst_bytes,
        "Starting throttle proxy"
    );

    let dialer = Arc::new(config.wrap(TcpDialer)?);
    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    let target = Arc::new(args.target);

    loop {
        let (client, peer) = listener.accept().await?;
        debug!(%peer, "Accepted connection");

        let dialer = Arc::clone(&dialer);
        let target = Arc::clone(&target);
        tokio::spawn(async move {
            if let Err(e) = forward(client, dialer, &target).await {
                warn!(%peer, error = %e, "Proxy session ended with error");
            }
        });
    }
}

/// Shuttle bytes between the client and a freshly dialed upstream.
///
/// Client-to-upstream traffic goes through the rate-limited connection and
/// blocks on the shared bucket; upstream-to-client traffic is unthrottled.
async fn forward(
    mut client: TcpStream,
    dialer: Arc<RateLimitedDialer<TcpDialer>>,
    target: &str,
) -> Result<()> {
    let mut upstream = dialer.dial(target).await?;

    let mut client_buf = vec![0u8; 16 * 1024];
    let mut upstream_buf = vec![0u8; 16 * 1024];

    enum Ready {
        FromClient(usize),
        FromUpstream(usize),
    }

    loop {
        let ready = tokio::select! {
            n = client.read(&mut client_buf) => Ready::FromClient(n?),
            n = upstream.read(&mut upstream_buf) => Ready::FromUpstream(n?),
        };

        match ready {
            Ready::FromClient(0) | Ready::FromUpstream(0) => break,
            Ready::FromClient(n) => {
                upstream.write(&client_buf[..n]).await?;
            }
            Ready::FromUpstream(n) => {
                client.write_all(&upstream_buf[..n]).await?;
            }
        }
    }

    upstream.close().await?;
    client.shutdown().await?;
    Ok(())
}
