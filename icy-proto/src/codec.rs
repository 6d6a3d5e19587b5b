//! Length-prefixed frame codec over blocking and async streams.
//!
//! Each frame is: `[u32 big-endian length][postcard payload]`.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum allowed frame payload (4 KiB).
///
/// Every message of this protocol is a few bytes long; the limit only
/// guards against allocating for a corrupt length prefix.
pub const MAX_FRAME: u32 = 4 * 1024;

/// Serializes `msg` into a complete frame (prefix included).
fn frame(msg: &impl Serialize) -> io::Result<Vec<u8>> {
    let payload =
        postcard::to_allocvec(msg).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "frame exceeds 4 KiB limit"))?;
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Validates a length prefix.
fn frame_len(prefix: [u8; 4]) -> io::Result<usize> {
    let len = u32::from_be_bytes(prefix);
    if len > MAX_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame exceeds 4 KiB limit",
        ));
    }
    Ok(len as usize)
}

/// Deserializes a frame payload.
fn parse<T: DeserializeOwned>(payload: &[u8]) -> io::Result<T> {
    postcard::from_bytes(payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Encodes `msg` as a length-prefixed postcard frame and writes it to `w`.
pub fn encode<W: Write>(w: &mut W, msg: &impl Serialize) -> io::Result<()> {
    w.write_all(&frame(msg)?)?;
    w.flush()
}

/// Reads a length-prefixed postcard frame from `r` and decodes it.
pub fn decode<T: DeserializeOwned>(r: &mut impl Read) -> io::Result<T> {
    let mut prefix = [0u8; 4];
    r.read_exact(&mut prefix)?;
    let mut payload = vec![0u8; frame_len(prefix)?];
    r.read_exact(&mut payload)?;
    parse(&payload)
}

/// Async counterpart of [`encode`]. Does not flush; callers using a
/// buffered writer flush once the response is complete.
pub async fn send<W: AsyncWrite + Unpin>(w: &mut W, msg: &impl Serialize) -> io::Result<()> {
    w.write_all(&frame(msg)?).await
}

/// Async counterpart of [`decode`].
///
/// Returns `Ok(None)` if the stream ends before the first prefix byte, i.e.
/// the peer closed between frames. EOF anywhere inside a frame is
/// [`io::ErrorKind::UnexpectedEof`].
pub async fn recv<T: DeserializeOwned>(
    r: &mut (impl AsyncRead + Unpin),
) -> io::Result<Option<T>> {
    let mut prefix = [0u8; 4];
    let first = loop {
        match r.read(&mut prefix).await {
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    };
    if first == 0 {
        return Ok(None);
    }
    r.read_exact(&mut prefix[first..]).await?;
    let mut payload = vec![0u8; frame_len(prefix)?];
    r.read_exact(&mut payload).await?;
    parse(&payload).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Command, ErrorInfo, ErrorKind, Request, Response};

    #[test]
    fn roundtrip_request() {
        let req = Request::new(Command::WriteWord, 0x18, 0x05, 0x0A3C);

        let mut buf = Vec::new();
        encode(&mut buf, &req).unwrap();

        let mut cursor = io::Cursor::new(&buf);
        let decoded: Request = decode(&mut cursor).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn length_prefix_matches_payload() {
        let mut buf = Vec::new();
        encode(&mut buf, &Request::new(Command::ReadByte, 0x40, 0x01, 0)).unwrap();
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(len, buf.len() - 4);
    }

    #[test]
    fn consecutive_frames_stay_delimited() {
        let first = Response::success(Command::ReadWord.code(), 0xBEEF);
        let second = Response::failure(
            Command::WriteByte.code(),
            ErrorInfo::new(ErrorKind::AddressSelect, "No such device").with_os_code(Some(19)),
        );

        let mut buf = Vec::new();
        encode(&mut buf, &first).unwrap();
        encode(&mut buf, &second).unwrap();

        let mut cursor = io::Cursor::new(&buf);
        assert_eq!(decode::<Response>(&mut cursor).unwrap(), first);
        assert_eq!(decode::<Response>(&mut cursor).unwrap(), second);
        let eof = decode::<Response>(&mut cursor).unwrap_err();
        assert_eq!(eof.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn rejects_oversized_frame() {
        let header = (MAX_FRAME + 1).to_be_bytes();
        let mut cursor = io::Cursor::new(&header[..]);
        let err = decode::<Request>(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_frame_is_eof() {
        let mut buf = Vec::new();
        encode(&mut buf, &Request::new(Command::ReadWord, 0x18, 0x05, 0)).unwrap();
        buf.pop();
        let mut cursor = io::Cursor::new(&buf);
        let err = decode::<Request>(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn garbage_payload_is_invalid_data() {
        let mut buf = 1u32.to_be_bytes().to_vec();
        buf.push(0xFF);
        let mut cursor = io::Cursor::new(&buf);
        let err = decode::<Request>(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn async_and_blocking_frames_agree() {
        let resp = Response::success(Command::ReadByte.code(), 0xAB);

        let mut blocking = Vec::new();
        encode(&mut blocking, &resp).unwrap();
        let mut nonblocking = Vec::new();
        send(&mut nonblocking, &resp).await.unwrap();
        assert_eq!(blocking, nonblocking);

        let decoded: Option<Response> = recv(&mut &blocking[..]).await.unwrap();
        assert_eq!(decoded, Some(resp));
    }

    #[tokio::test]
    async fn eof_between_frames_is_clean() {
        let mut buf = Vec::new();
        encode(&mut buf, &Request::new(Command::ReadByte, 0x18, 0x01, 0)).unwrap();

        let mut r = &buf[..];
        assert!(recv::<Request>(&mut r).await.unwrap().is_some());
        assert!(recv::<Request>(&mut r).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_inside_frame_is_an_error() {
        // Prefix announces five bytes, one arrives.
        let partial_payload = [0u8, 0, 0, 5, 1];
        let err = recv::<Request>(&mut &partial_payload[..]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let partial_prefix = [0u8, 0];
        let err = recv::<Request>(&mut &partial_prefix[..]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
