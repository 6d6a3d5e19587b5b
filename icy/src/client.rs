//! Blocking client for a remote icy server.
//!
//! Each [`Bus`] call is one request/response exchange over a single
//! long-lived TCP connection. Calls on one client are serialized by its
//! internal lock; open several clients for parallel access.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{Mutex, MutexGuard, PoisonError};

use icy_proto::{Command, Request, Response};

use crate::{Bus, Error, Result};

/// A connection to a remote bus.
#[derive(Debug)]
pub struct Client {
    /// Server address.
    peer: SocketAddr,
    /// The stream; `None` once closed or after a failed exchange.
    stream: Mutex<Option<TcpStream>>,
}

impl Client {
    /// Connects to the server at `target` (`host:port`).
    pub fn connect(target: &str) -> Result<Self> {
        let connect_err = |source| Error::Connect {
            target: target.to_owned(),
            source,
        };
        let stream = TcpStream::connect(target).map_err(connect_err)?;
        stream.set_nodelay(true).map_err(connect_err)?;
        let peer = stream.peer_addr().map_err(connect_err)?;
        Ok(Self {
            peer,
            stream: Mutex::new(Some(stream)),
        })
    }

    /// Address of the server.
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Closes the connection. Every later call, including another
    /// `close`, fails with [`Error::ConnectionClosed`].
    pub fn close(&self) -> Result<()> {
        let stream = self.lock().take().ok_or(Error::ConnectionClosed)?;
        match stream.shutdown(Shutdown::Both) {
            // The server may already have hung up.
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Whether the connection is still usable.
    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Locks the connection slot.
    fn lock(&self) -> MutexGuard<'_, Option<TcpStream>> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends one request and waits for its response.
    ///
    /// A failure mid-exchange leaves the stream at an unknown frame
    /// boundary, so the connection is dropped.
    fn call(&self, command: Command, address: u8, register: u8, value: u16) -> Result<u16> {
        let req = Request::new(command, address, register, value);
        let mut slot = self.lock();
        let stream = slot.as_mut().ok_or(Error::ConnectionClosed)?;

        let resp: Response = match icy_proto::encode(stream, &req)
            .and_then(|()| icy_proto::decode(stream))
        {
            Ok(resp) => resp,
            Err(e) => {
                *slot = None;
                return Err(match e.kind() {
                    io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                        Error::Protocol(e)
                    }
                    _ => Error::Io(e),
                });
            }
        };

        if resp.command != req.command {
            *slot = None;
            return Err(Error::Protocol(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "response for command {:#04x}, expected {:#04x}",
                    resp.command, req.command
                ),
            )));
        }
        drop(slot);

        match resp.error {
            Some(info) => Err(Error::from_remote(info, &req)),
            None => Ok(resp.value),
        }
    }
}

impl Bus for Client {
    fn read_byte(&self, address: u8, register: u8) -> Result<u8> {
        let value = self.call(Command::ReadByte, address, register, 0)?;
        u8::try_from(value).map_err(|_| {
            Error::Protocol(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("byte read returned {value:#06x}"),
            ))
        })
    }

    fn write_byte(&self, address: u8, register: u8, value: u8) -> Result<()> {
        self.call(Command::WriteByte, address, register, u16::from(value))
            .map(drop)
    }

    fn read_word(&self, address: u8, register: u8) -> Result<u16> {
        self.call(Command::ReadWord, address, register, 0)
    }

    fn write_word(&self, address: u8, register: u8, value: u16) -> Result<()> {
        self.call(Command::WriteWord, address, register, value)
            .map(drop)
    }
}
