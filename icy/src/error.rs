//! Error types for bus operations.

use std::io;
use std::path::PathBuf;

use icy_proto::{ErrorInfo, ErrorKind, Request};

/// Alias for `Result<T, icy::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by bus operations, local or remote.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The bus device could not be opened or locked.
    #[error("open {}: {source}", path.display())]
    DeviceOpen {
        /// Device path.
        path: PathBuf,
        /// Underlying system error.
        source: io::Error,
    },

    /// The device rejected selection of a slave address.
    #[error("select address {address:#04x}: {source}")]
    AddressSelect {
        /// Slave address that failed to select.
        address: u8,
        /// Underlying system error.
        source: io::Error,
    },

    /// A register transfer failed.
    #[error("transfer {address:#04x}/{register:#04x}: {source}")]
    Transfer {
        /// Slave address.
        address: u8,
        /// Register.
        register: u8,
        /// Underlying system error.
        source: io::Error,
    },

    /// A byte write carried a value wider than one byte.
    #[error("value {0:#06x} does not fit in a byte")]
    InvalidValue(u16),

    /// The peer does not know the command code.
    #[error("unknown command code {0:#04x}")]
    UnknownCommand(u8),

    /// A device reported a resolution code outside the supported set.
    #[error("unsupported resolution {0:#04x}")]
    UnsupportedResolution(u8),

    /// A malformed, truncated or mismatched protocol message.
    #[error("protocol error: {0}")]
    Protocol(io::Error),

    /// Dialing the server failed.
    #[error("connect to {target}: {source}")]
    Connect {
        /// Address that was dialed.
        target: String,
        /// Underlying socket error.
        source: io::Error,
    },

    /// The client connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server reported an error with no local equivalent.
    #[error("remote error: {0}")]
    Remote(ErrorInfo),

    /// An I/O error on the network connection.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Classifies this error for transmission to a remote client.
    ///
    /// System errors keep their raw OS code so the client can rebuild an
    /// equivalent [`io::Error`].
    pub fn to_info(&self) -> ErrorInfo {
        match self {
            Self::AddressSelect { source, .. } => {
                ErrorInfo::new(ErrorKind::AddressSelect, source.to_string())
                    .with_os_code(source.raw_os_error())
            }
            Self::Transfer { source, .. } => ErrorInfo::new(ErrorKind::Transfer, source.to_string())
                .with_os_code(source.raw_os_error()),
            Self::UnknownCommand(_) => ErrorInfo::new(ErrorKind::UnknownCommand, self.to_string()),
            Self::InvalidValue(_) | Self::UnsupportedResolution(_) => {
                ErrorInfo::new(ErrorKind::InvalidArgument, self.to_string())
            }
            Self::Remote(info) => info.clone(),
            _ => ErrorInfo::new(ErrorKind::Internal, self.to_string()),
        }
    }

    /// Rebuilds a local error from the remote classification of the
    /// failure of `req`.
    pub(crate) fn from_remote(info: ErrorInfo, req: &Request) -> Self {
        let source = || match info.os_code {
            Some(code) => io::Error::from_raw_os_error(code),
            None => io::Error::other(info.message.clone()),
        };
        match info.kind {
            ErrorKind::AddressSelect => Self::AddressSelect {
                address: req.address,
                source: source(),
            },
            ErrorKind::Transfer => Self::Transfer {
                address: req.address,
                register: req.register,
                source: source(),
            },
            ErrorKind::UnknownCommand => Self::UnknownCommand(req.command),
            _ => Self::Remote(info),
        }
    }
}
