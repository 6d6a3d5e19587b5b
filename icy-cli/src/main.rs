//! CLI for serving and poking SMBus devices.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod access;
mod serve;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "icy", version, about = "SMBus register access, locally or over TCP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve a local bus to remote clients.
    Serve(serve::ServeArgs),

    /// Read one register.
    Read(access::ReadArgs),

    /// Write one register.
    Write(access::WriteArgs),

    /// Read an MCP9808 temperature sensor.
    Temp(access::TempArgs),

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

/// Output format for read commands.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    if let Err(e) = Cli::parse().dispatch() {
        eprintln!("icy: {e:#}");
        std::process::exit(1);
    }
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        match self.command {
            Command::Serve(args) => serve::run(args),
            Command::Read(args) => access::read(&args),
            Command::Write(args) => access::write(&args),
            Command::Temp(args) => access::temp(&args),
            Command::Completion { shell } => {
                clap_complete::generate(shell, &mut Self::command(), "icy", &mut std::io::stdout());
                Ok(())
            }
        }
    }
}

/// Parses a decimal or `0x`-prefixed hexadecimal integer.
pub(crate) fn parse_int<T>(s: &str) -> Result<T, String>
where
    T: TryFrom<u32>,
{
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    }
    .map_err(|e| format!("invalid number {s:?}: {e}"))?;
    T::try_from(parsed).map_err(|_| format!("{s} is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_decimal() {
        assert_eq!(parse_int::<u8>("0x18"), Ok(0x18));
        assert_eq!(parse_int::<u8>("24"), Ok(24));
        assert_eq!(parse_int::<u16>("0X0A3C"), Ok(0x0A3C));
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(parse_int::<u8>("0x100").is_err());
        assert!(parse_int::<u8>("-1").is_err());
        assert!(parse_int::<u8>("0xzz").is_err());
    }

    #[test]
    fn serve_limits_must_be_positive() {
        let serve = |flag: &str, value: &str| {
            Cli::try_parse_from(["icy", "serve", "--memory", flag, value])
        };
        assert!(serve("--max-sessions", "0").is_err());
        assert!(serve("--max-sessions", "1").is_ok());
        assert!(serve("--idle-timeout", "0").is_err());
        assert!(serve("--idle-timeout", "30").is_ok());
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
