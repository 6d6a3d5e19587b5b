//! SMBus register access, locally or over the network.
//!
//! Every backend implements [`Bus`]: byte and word reads and writes
//! addressed by slave address and register. [`Smbus`] talks to a Linux
//! `/dev/i2c-N` device, [`Client`] forwards each call to a remote
//! [`Server`], and the server in turn proxies to whatever [`Bus`] it was
//! given.
//!
//! # Quick start — remote access
//!
//! ```no_run
//! use icy::{Bus, Client};
//!
//! let bus = Client::connect("raspberrypi.local:6000")?;
//! bus.write_word(0x18, 0x01, 0x0000)?;
//! let ambient = bus.read_word(0x18, 0x05)?;
//! println!("raw ambient: {ambient:#06x}");
//! bus.close()?;
//! # Ok::<(), icy::Error>(())
//! ```
//!
//! # Serving a local bus
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = icy::Smbus::open(1)?;
//! let listener = tokio::net::TcpListener::bind(("0.0.0.0", icy_proto::DEFAULT_PORT)).await?;
//! icy::Server::new(bus).serve(listener).await?;
//! # Ok(())
//! # }
//! ```

mod bus;
mod client;
mod error;
pub mod mcp9808;
mod memory;
mod server;
pub mod smbus;
#[cfg(target_os = "linux")]
mod sys;

pub use bus::Bus;
pub use client::Client;
pub use error::{Error, Result};
pub use icy_proto::{Command, ErrorInfo, ErrorKind};
pub use memory::MemoryBus;
pub use server::Server;
pub use smbus::Smbus;
#[cfg(target_os = "linux")]
pub use sys::I2cDev;
