//! One-shot register access against a local or remote bus.

use anyhow::{Context, Result};
use clap::Args;
use icy::Bus;
use icy::mcp9808::Mcp9808;

use crate::{OutputFormat, parse_int};

/// Which bus to talk to.
#[derive(Args)]
pub(crate) struct Target {
    /// Remote server as HOST:PORT.
    #[arg(long, conflicts_with = "bus")]
    remote: Option<String>,

    /// Local bus index, i.e. the N in /dev/i2c-N.
    #[arg(long)]
    bus: Option<u8>,
}

impl Target {
    /// Opens the selected bus.
    fn open(&self) -> Result<Box<dyn Bus>> {
        match (&self.remote, self.bus) {
            (Some(target), _) => Ok(Box::new(icy::Client::connect(target)?)),
            (None, Some(bus)) => open_local(bus),
            (None, None) => anyhow::bail!("one of --remote or --bus is required"),
        }
    }
}

#[cfg(target_os = "linux")]
fn open_local(bus: u8) -> Result<Box<dyn Bus>> {
    Ok(Box::new(icy::Smbus::open(bus)?))
}

#[cfg(not(target_os = "linux"))]
fn open_local(_bus: u8) -> Result<Box<dyn Bus>> {
    anyhow::bail!("local SMBus access requires Linux; use --remote")
}

#[derive(Args)]
pub(crate) struct ReadArgs {
    #[command(flatten)]
    target: Target,

    /// Slave address.
    #[arg(value_parser = parse_int::<u8>)]
    address: u8,

    /// Register.
    #[arg(value_parser = parse_int::<u8>)]
    register: u8,

    /// Read a 16-bit word instead of a byte.
    #[arg(long)]
    word: bool,

    /// Output format.
    #[arg(long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Args)]
pub(crate) struct WriteArgs {
    #[command(flatten)]
    target: Target,

    /// Slave address.
    #[arg(value_parser = parse_int::<u8>)]
    address: u8,

    /// Register.
    #[arg(value_parser = parse_int::<u8>)]
    register: u8,

    /// Value to write.
    #[arg(value_parser = parse_int::<u16>)]
    value: u16,

    /// Write a 16-bit word instead of a byte.
    #[arg(long)]
    word: bool,
}

#[derive(Args)]
pub(crate) struct TempArgs {
    #[command(flatten)]
    target: Target,

    /// Sensor address.
    #[arg(long, value_parser = parse_int::<u8>, default_value_t = icy::mcp9808::ADDRESS)]
    address: u8,

    /// Output format.
    #[arg(long, default_value = "text")]
    format: OutputFormat,
}

pub(crate) fn read(args: &ReadArgs) -> Result<()> {
    let bus = args.target.open()?;
    let (a, r) = (args.address, args.register);
    let value = if args.word {
        bus.read_word(a, r)
    } else {
        bus.read_byte(a, r).map(u16::from)
    }
    .with_context(|| format!("read {a:#04x}/{r:#04x}"))?;

    match args.format {
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "address": a,
                "register": r,
                "value": value,
            });
            println!("{obj}");
        }
        OutputFormat::Text if args.word => println!("{value:#06x}"),
        OutputFormat::Text => println!("{value:#04x}"),
    }
    Ok(())
}

pub(crate) fn write(args: &WriteArgs) -> Result<()> {
    let bus = args.target.open()?;
    let (a, r) = (args.address, args.register);
    if args.word {
        bus.write_word(a, r, args.value)
    } else {
        let byte = u8::try_from(args.value)
            .with_context(|| format!("{:#x} does not fit in a byte; use --word", args.value))?;
        bus.write_byte(a, r, byte)
    }
    .with_context(|| format!("write {a:#04x}/{r:#04x}"))
}

pub(crate) fn temp(args: &TempArgs) -> Result<()> {
    let sensor = Mcp9808::with_address(args.target.open()?, args.address);
    if !sensor.identify()? {
        tracing::warn!(address = args.address, "device does not identify as an MCP9808");
    }
    let celsius = sensor.temperature().context("read ambient temperature")?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "celsius": celsius })),
        OutputFormat::Text => println!("{celsius:.4} °C"),
    }
    Ok(())
}
