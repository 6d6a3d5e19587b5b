//! `icy serve`: expose a local bus over TCP.

use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use icy::{MemoryBus, Server};
use tokio::net::TcpListener;

#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Port to listen on for clients.
    #[arg(long, default_value_t = icy_proto::DEFAULT_PORT)]
    port: u16,

    /// Bus index, i.e. the N in /dev/i2c-N.
    #[arg(long, default_value_t = 1)]
    bus: u8,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    listen: IpAddr,

    /// Serve an in-memory register file instead of a device.
    #[arg(long, conflicts_with = "bus")]
    memory: bool,

    /// Maximum concurrent sessions (unbounded if unset).
    #[arg(long)]
    max_sessions: Option<NonZeroUsize>,

    /// Close sessions idle for this many seconds (never if unset).
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    idle_timeout: Option<u64>,
}

pub(crate) fn run(args: ServeArgs) -> Result<()> {
    let mut server = if args.memory {
        Server::new(MemoryBus::new())
    } else {
        Server::new(open_bus(args.bus)?)
    };
    if let Some(limit) = args.max_sessions {
        server = server.max_sessions(limit);
    }
    if let Some(secs) = args.idle_timeout {
        server = server.idle_timeout(Duration::from_secs(secs));
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(async {
        let listener = TcpListener::bind((args.listen, args.port))
            .await
            .with_context(|| format!("bind {}:{}", args.listen, args.port))?;
        server
            .serve_with_shutdown(listener, async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("interrupted, shutting down"),
                    Err(e) => {
                        tracing::warn!(error = %e, "no Ctrl-C handler, serving until killed");
                        std::future::pending::<()>().await;
                    }
                }
            })
            .await
            .context("accept")
    })
}

#[cfg(target_os = "linux")]
fn open_bus(bus: u8) -> Result<icy::Smbus<icy::I2cDev>> {
    Ok(icy::Smbus::open(bus)?)
}

#[cfg(not(target_os = "linux"))]
fn open_bus(_bus: u8) -> Result<MemoryBus> {
    anyhow::bail!("SMBus devices require Linux; use --memory")
}
