//! Transport capability: plaintext and TLS sessions behind one interface
//!
//! The phase state machine is written once against [`Session`]. Every
//! attempt reports an [`IoOutcome`] instead of blocking; a session that
//! can't make progress says which readiness it is waiting for.

use std::error::Error;
use std::io::{ErrorKind as IoErrorKind, Read, Result as IoResult, Write};
use std::net::TcpStream;
use std::os::fd::{AsFd, BorrowedFd};

/// Result of a single read or write attempt
#[derive(Debug)]
pub enum IoOutcome {
    /// `n` bytes were transferred, a read of 0 bytes is an orderly close
    Progress(usize),
    /// Retry once the socket is readable
    WantsRead,
    /// Retry once the socket is writable
    WantsWrite,
    /// Connection-fatal error
    Failed(std::io::Error),
}

/// One accepted connection's byte stream
pub trait Session: AsFd {
    /// Attempts one bounded read into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> IoOutcome;

    /// Attempts one bounded write of `buf`. An empty `buf` only pushes out
    /// bytes the session queued earlier.
    fn write(&mut self, buf: &[u8]) -> IoOutcome;

    /// True while bytes accepted by [`Session::write`] haven't reached the
    /// socket yet.
    fn wants_flush(&self) -> bool {
        false
    }
}

/// Starts sessions on freshly accepted sockets
pub trait Transport {
    /// Session type created by [`Transport::accept`]
    type Session: Session;

    /// Begins a session on `stream`, which is already non-blocking.
    ///
    /// # Errors
    ///
    /// The connection can't be served and is dropped.
    fn accept(&self, stream: TcpStream) -> IoResult<Self::Session>;

    /// Re-derives the transport's configuration. Sessions already started
    /// keep whatever configuration they were started with.
    ///
    /// # Errors
    ///
    /// The previous configuration stays in effect.
    fn reconfigure(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Maps one `std::io` result to an [`IoOutcome`], `would_block` being the
/// outcome for `WouldBlock`.
pub(crate) fn outcome(result: IoResult<usize>, would_block: IoOutcome) -> Option<IoOutcome> {
    match result {
        Ok(n) => Some(IoOutcome::Progress(n)),
        Err(err) if err.kind() == IoErrorKind::Interrupted => None,
        Err(err) if err.kind() == IoErrorKind::WouldBlock => Some(would_block),
        Err(err) => Some(IoOutcome::Failed(err)),
    }
}

/// Plaintext transport
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTransport;

/// Plaintext session, a non-blocking [`TcpStream`]
#[derive(Debug)]
pub struct PlainSession {
    stream: TcpStream,
}

impl Transport for PlainTransport {
    type Session = PlainSession;

    fn accept(&self, stream: TcpStream) -> IoResult<PlainSession> {
        Ok(PlainSession { stream })
    }
}

impl Session for PlainSession {
    fn read(&mut self, buf: &mut [u8]) -> IoOutcome {
        loop {
            if let Some(out) = outcome(self.stream.read(buf), IoOutcome::WantsRead) {
                return out;
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> IoOutcome {
        loop {
            if let Some(out) = outcome(self.stream.write(buf), IoOutcome::WantsWrite) {
                return out;
            }
        }
    }
}

impl AsFd for PlainSession {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}
