//! Protocol message types for remote bus access.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default TCP port for the icy server.
pub const DEFAULT_PORT: u16 = 6000;

/// Bus operation requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Read one byte from a register.
    ReadByte = 0,
    /// Write one byte to a register.
    WriteByte = 1,
    /// Read one 16-bit word from a register.
    ReadWord = 2,
    /// Write one 16-bit word to a register.
    WriteWord = 3,
}

impl Command {
    /// Raw code carried on the wire.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether the command carries a value to write.
    pub const fn is_write(self) -> bool {
        matches!(self, Self::WriteByte | Self::WriteWord)
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        match code {
            0 => Ok(Self::ReadByte),
            1 => Ok(Self::WriteByte),
            2 => Ok(Self::ReadWord),
            3 => Ok(Self::WriteWord),
            other => Err(other),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadByte => "read-byte",
            Self::WriteByte => "write-byte",
            Self::ReadWord => "read-word",
            Self::WriteWord => "write-word",
        })
    }
}

/// Request sent from client to server.
///
/// The command is kept as its raw code so that a server can answer an
/// unknown code instead of failing to decode the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Raw [`Command`] code.
    pub command: u8,
    /// 7-bit slave address.
    pub address: u8,
    /// Register within the device.
    pub register: u8,
    /// Value to write; zero for reads.
    pub value: u16,
}

impl Request {
    /// Builds a request. `value` is ignored by the server for reads.
    pub const fn new(command: Command, address: u8, register: u8, value: u16) -> Self {
        Self {
            command: command.code(),
            address,
            register,
            value,
        }
    }

    /// Decodes the command code, returning the raw code if it is unknown.
    pub fn command(&self) -> Result<Command, u8> {
        Command::try_from(self.command)
    }
}

/// Response sent from server to client, answering one [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Command code of the request being answered.
    pub command: u8,
    /// Result value; zero for writes and on error.
    pub value: u16,
    /// Set when the operation failed.
    pub error: Option<ErrorInfo>,
}

impl Response {
    /// A successful response carrying `value`.
    pub const fn success(command: u8, value: u16) -> Self {
        Self {
            command,
            value,
            error: None,
        }
    }

    /// A failed response; the value is always zero.
    pub const fn failure(command: u8, error: ErrorInfo) -> Self {
        Self {
            command,
            value: 0,
            error: Some(error),
        }
    }
}

/// Classification of an error that crossed the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The device rejected selection of the slave address.
    AddressSelect,
    /// The bus transaction itself failed.
    Transfer,
    /// The server does not know the request's command code.
    UnknownCommand,
    /// A request field is out of range for the command.
    InvalidArgument,
    /// Any other server-side failure.
    Internal,
}

impl ErrorKind {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddressSelect => "address-select",
            Self::Transfer => "transfer",
            Self::UnknownCommand => "unknown-command",
            Self::InvalidArgument => "invalid-argument",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable error: a kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Raw OS error code of the underlying system error, if any.
    pub os_code: Option<i32>,
}

impl ErrorInfo {
    /// Creates an error without an OS error code.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            os_code: None,
        }
    }

    /// Attaches the raw OS error code.
    #[must_use]
    pub const fn with_os_code(mut self, code: Option<i32>) -> Self {
        self.os_code = code;
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
