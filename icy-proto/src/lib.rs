//! Wire protocol for remote SMBus register access.
//!
//! Messages are serialized with [`postcard`] and framed with a 4-byte
//! big-endian length prefix, so framing never depends on the serializer's
//! stream semantics. A connection carries at most one outstanding
//! [`Request`]; the peer answers it with exactly one [`Response`] before the
//! next request is sent.

mod codec;
mod message;

pub use codec::{MAX_FRAME, decode, encode, recv, send};
pub use message::{Command, DEFAULT_PORT, ErrorInfo, ErrorKind, Request, Response};
