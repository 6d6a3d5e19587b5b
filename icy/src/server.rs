//! TCP listener and per-connection session dispatch.
//!
//! Every accepted connection gets its own task; all tasks share one [`Bus`].
//! By default there is no cap on concurrent sessions and no timeout on any
//! read, write or bus call, matching a trusted-LAN deployment. Both limits
//! can be set explicitly with [`Server::max_sessions`] and
//! [`Server::idle_timeout`].

use std::future;
use std::io;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use icy_proto::{Command, ErrorInfo, ErrorKind, Request, Response};
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::{Bus, Error, Result};

/// Serves a [`Bus`] to remote clients.
#[derive(Clone)]
pub struct Server {
    /// Backend shared by every session.
    bus: Arc<dyn Bus>,
    /// Maximum number of concurrent sessions; `None` is unbounded.
    max_sessions: Option<NonZeroUsize>,
    /// How long a session may wait for its next request; `None` waits forever.
    idle_timeout: Option<Duration>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("max_sessions", &self.max_sessions)
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

/// What woke the accept loop.
enum Event {
    /// A connection was accepted (or failed to be).
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    /// The shutdown signal fired.
    Shutdown,
}

impl Server {
    /// Creates a server proxying to `bus`.
    pub fn new(bus: impl Bus + 'static) -> Self {
        Self::from_shared(Arc::new(bus))
    }

    /// Creates a server proxying to an already shared bus.
    pub fn from_shared(bus: Arc<dyn Bus>) -> Self {
        Self {
            bus,
            max_sessions: None,
            idle_timeout: None,
        }
    }

    /// Caps concurrent sessions. Once reached, new connections wait in the
    /// listen backlog until a session ends. Unbounded by default.
    #[must_use]
    pub const fn max_sessions(mut self, limit: NonZeroUsize) -> Self {
        self.max_sessions = Some(limit);
        self
    }

    /// Ends sessions that send no request for `timeout`. Sessions never
    /// time out by default. Bus calls themselves are never timed out.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Accepts connections until accepting fails, returning that error.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        self.serve_with_shutdown(listener, future::pending()).await
    }

    /// Accepts connections until `shutdown` completes or accepting fails.
    ///
    /// On return the listener is closed and every session has been aborted
    /// and joined.
    pub async fn serve_with_shutdown(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> io::Result<()> {
        let limit = self.max_sessions
            .map(|n| Arc::new(Semaphore::new(n.get())));
        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "listening");
        }

        let result = loop {
            while sessions.try_join_next().is_some() {}

            let permit = match &limit {
                Some(sem) => tokio::select! {
                    permit = Arc::clone(sem).acquire_owned() => match permit {
                        Ok(p) => Some(p),
                        Err(e) => break Err(io::Error::other(e)),
                    },
                    () = &mut shutdown => break Ok(()),
                },
                None => None,
            };

            let event = tokio::select! {
                accepted = listener.accept() => Event::Accepted(accepted),
                () = &mut shutdown => Event::Shutdown,
            };

            match event {
                Event::Shutdown => break Ok(()),
                Event::Accepted(Ok((stream, peer))) => {
                    sessions.spawn(run_session(
                        Arc::clone(&self.bus),
                        stream,
                        peer,
                        self.idle_timeout,
                        permit,
                    ));
                }
                Event::Accepted(Err(e)) if is_transient(&e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
                Event::Accepted(Err(e)) => {
                    tracing::error!(error = %e, "accept failed fatally");
                    break Err(e);
                }
            }
        };

        drop(listener);
        sessions.shutdown().await;
        tracing::info!("server stopped");
        result
    }
}

/// Accept errors that concern one connection rather than the listener.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}

/// Runs one session and reports how it ended.
async fn run_session(
    bus: Arc<dyn Bus>,
    stream: TcpStream,
    peer: SocketAddr,
    idle_timeout: Option<Duration>,
    _permit: Option<OwnedSemaphorePermit>,
) {
    tracing::info!(%peer, "session opened");
    match session(bus, stream, idle_timeout).await {
        Ok(()) => tracing::info!(%peer, "session closed"),
        Err(e) => tracing::warn!(%peer, error = %e, "session ended"),
    }
}

/// Handles a single client connection: read requests, dispatch, respond.
async fn session(
    bus: Arc<dyn Bus>,
    stream: TcpStream,
    idle_timeout: Option<Duration>,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let (reader, writer) = stream.into_split();
    let mut r = BufReader::new(reader);
    let mut w = BufWriter::new(writer);

    loop {
        let next = icy_proto::recv::<Request>(&mut r);
        let received = match idle_timeout {
            Some(limit) => tokio::time::timeout(limit, next)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "session idle"))?,
            None => next.await,
        };
        let req = match received {
            Ok(Some(req)) => req,
            // Clean disconnect between frames.
            Ok(None) => return Ok(()),
            Err(e) => return Err(Error::Protocol(e)),
        };

        let worker = Arc::clone(&bus);
        let resp = tokio::task::spawn_blocking(move || dispatch(&*worker, &req))
            .await
            .unwrap_or_else(|e| {
                Response::failure(req.command, ErrorInfo::new(ErrorKind::Internal, e.to_string()))
            });

        icy_proto::send(&mut w, &resp).await?;
        w.flush().await?;
    }
}

/// Executes one request against `bus` and builds its response.
///
/// Unknown command codes are answered with [`ErrorKind::UnknownCommand`];
/// the session stays usable.
pub(crate) fn dispatch(bus: &dyn Bus, req: &Request) -> Response {
    let result = match req.command() {
        Ok(Command::ReadByte) => bus.read_byte(req.address, req.register).map(u16::from),
        Ok(Command::WriteByte) => u8::try_from(req.value)
            .map_err(|_| Error::InvalidValue(req.value))
            .and_then(|value| bus.write_byte(req.address, req.register, value))
            .map(|()| 0),
        Ok(Command::ReadWord) => bus.read_word(req.address, req.register),
        Ok(Command::WriteWord) => bus
            .write_word(req.address, req.register, req.value)
            .map(|()| 0),
        Err(code) => Err(Error::UnknownCommand(code)),
    };
    match result {
        Ok(value) => Response::success(req.command, value),
        Err(e) => Response::failure(req.command, e.to_info()),
    }
}
