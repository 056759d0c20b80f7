//! Per-connection state and the request/response/payload phase machine
//!
//! A connection cycles through [`Phase::Request`], [`Phase::Response`] and,
//! for a non-empty file body, [`Phase::Payload`], then starts over with the
//! next request on the same stream. Every phase change resets the scratch
//! buffer and the registered [`Interest`]. Each call to [`Conn::drive`]
//! makes at most one read or write attempt on the session.

use std::fs::File;
use std::io::{ErrorKind as IoErrorKind, Read};
use std::net::SocketAddr;

use crate::buffer::{CursorError, ScratchBuffer};
use crate::log;
use crate::request::{self, ParseError};
use crate::response::ResponseBuilder;
use crate::transport::{IoOutcome, Session};

const HEAD_END: &[u8] = b"\r\n\r\n";

/// Position in the request/response cycle, ordered by progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Phase {
    Request,
    Response,
    Payload,
}

impl Phase {
    /// Interest registered when a phase is entered
    pub(crate) fn interest(self) -> Interest {
        match self {
            Phase::Request => Interest::Read,
            Phase::Response | Phase::Payload => Interest::Write,
        }
    }
}

/// Readiness a connection waits for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Interest {
    Read,
    Write,
}

/// Connection-fatal error, the connection is closed without further response.
#[derive(Debug)]
pub(crate) enum ConnError {
    /// Peer closed its side
    PeerClosed,
    /// Buffer filled up before the end of the request head
    RequestTooLarge,
    /// Request head couldn't be parsed
    Malformed(ParseError),
    /// Body file ended before the announced length
    BodyTruncated,
    /// Cursor arithmetic went out of range
    Buffer(CursorError),
    /// Socket, TLS session or body file failure
    Io(std::io::Error),
    /// Poll reported an error condition on the socket
    Socket,
}

impl std::error::Error for ConnError {}

impl std::fmt::Display for ConnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnError::PeerClosed => f.write_str("peer closed connection"),
            ConnError::RequestTooLarge => f.write_str("request head too large"),
            ConnError::Malformed(err) => write!(f, "malformed request: {err}"),
            ConnError::BodyTruncated => f.write_str("body file shrank"),
            ConnError::Buffer(err) => err.fmt(f),
            ConnError::Io(err) => write!(f, "io: {err}"),
            ConnError::Socket => f.write_str("socket error"),
        }
    }
}

impl From<ParseError> for ConnError {
    fn from(err: ParseError) -> Self {
        ConnError::Malformed(err)
    }
}

impl From<CursorError> for ConnError {
    fn from(err: CursorError) -> Self {
        ConnError::Buffer(err)
    }
}

impl From<std::io::Error> for ConnError {
    fn from(err: std::io::Error) -> Self {
        ConnError::Io(err)
    }
}

/// Transferred bytes as seen by the eviction policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Progress {
    /// Request bytes received so far
    Request(usize),
    /// Response head bytes not yet sent
    Response(usize),
    /// File bytes not yet read from the body
    Payload(u64),
}

/// An admitted connection
#[derive(Debug)]
pub(crate) struct Conn<S> {
    session: S,
    peer: SocketAddr,
    phase: Phase,
    /// File bytes still to be read from `body`
    content_length: u64,
    body: Option<File>,
}

impl<S: Session> Conn<S> {
    pub(crate) fn new(session: S, peer: SocketAddr) -> Self {
        Self {
            session,
            peer,
            phase: Phase::Request,
            content_length: 0,
            body: None,
        }
    }

    pub(crate) fn session(&self) -> &S {
        &self.session
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn progress(&self, scratch: &ScratchBuffer) -> Progress {
        match self.phase {
            Phase::Request => Progress::Request(scratch.len()),
            Phase::Response => Progress::Response(scratch.unflushed_len()),
            Phase::Payload => Progress::Payload(self.content_length),
        }
    }

    /// Makes one I/O attempt for the current phase and applies the
    /// resulting transition.
    ///
    /// `interest` is updated to what the connection waits for next.
    pub(crate) fn drive(
        &mut self,
        scratch: &mut ScratchBuffer,
        interest: &mut Interest,
        responder: &mut ResponseBuilder,
    ) -> Result<(), ConnError> {
        match self.phase {
            Phase::Request => self.read_request(scratch, interest, responder),
            Phase::Response => self.send_response(scratch, interest),
            Phase::Payload => self.send_payload(scratch, interest),
        }
    }

    fn enter(&mut self, phase: Phase, scratch: &mut ScratchBuffer, interest: &mut Interest) {
        log::debug!("{}: {:?} -> {phase:?}", self.peer, self.phase);
        if phase == Phase::Request {
            self.body = None;
            self.content_length = 0;
        }
        self.phase = phase;
        *interest = phase.interest();
        scratch.clear();
    }

    fn read_request(
        &mut self,
        scratch: &mut ScratchBuffer,
        interest: &mut Interest,
        responder: &mut ResponseBuilder,
    ) -> Result<(), ConnError> {
        if scratch.is_full() {
            return Err(ConnError::RequestTooLarge);
        }

        let n = match self.session.read(scratch.spare_mut()) {
            IoOutcome::Progress(0) => return Err(ConnError::PeerClosed),
            IoOutcome::Progress(n) => n,
            out => return waiting(out, interest),
        };
        scratch.commit(n)?;
        *interest = Interest::Read;

        if !scratch.filled().ends_with(HEAD_END) {
            return if scratch.is_full() {
                Err(ConnError::RequestTooLarge)
            } else {
                Ok(())
            };
        }

        // the blank line ending the head isn't part of the parser's view
        scratch.truncate_back(2)?;
        let head = request::parse(scratch.filled())?;
        log::info!("{}: request received", self.peer);

        let response = responder.respond(head, scratch)?;
        log::debug!("{}: responding {}", self.peer, response.status);

        self.phase = Phase::Response;
        self.content_length = response.content_length;
        self.body = response.body;
        *interest = Interest::Write;
        Ok(())
    }

    fn send_response(
        &mut self,
        scratch: &mut ScratchBuffer,
        interest: &mut Interest,
    ) -> Result<(), ConnError> {
        if !self.flush(scratch, interest)? {
            return Ok(());
        }

        log::info!("{}: response sent", self.peer);
        if self.content_length > 0 {
            self.enter(Phase::Payload, scratch, interest);
        } else {
            self.enter(Phase::Request, scratch, interest);
        }
        Ok(())
    }

    fn send_payload(
        &mut self,
        scratch: &mut ScratchBuffer,
        interest: &mut Interest,
    ) -> Result<(), ConnError> {
        if scratch.is_flushed() && self.content_length > 0 {
            scratch.clear();
            let body = self.body.as_mut().ok_or(ConnError::BodyTruncated)?;
            let spare = scratch.spare_mut();
            let want = usize::try_from(self.content_length)
                .unwrap_or(usize::MAX)
                .min(spare.len());

            let n = loop {
                match body.read(&mut spare[..want]) {
                    Ok(n) => break n,
                    Err(err) if err.kind() == IoErrorKind::Interrupted => {}
                    Err(err) => return Err(ConnError::Io(err)),
                }
            };
            if n == 0 {
                return Err(ConnError::BodyTruncated);
            }
            scratch.commit(n)?;
            self.content_length -= n as u64;
        }

        if self.flush(scratch, interest)? && self.content_length == 0 {
            log::info!("{}: payload sent", self.peer);
            self.enter(Phase::Request, scratch, interest);
        }
        Ok(())
    }

    /// One write attempt of the unflushed bytes. True once the buffer and
    /// the session are both flushed.
    fn flush(
        &mut self,
        scratch: &mut ScratchBuffer,
        interest: &mut Interest,
    ) -> Result<bool, ConnError> {
        if !scratch.is_flushed() || self.session.wants_flush() {
            match self.session.write(scratch.unflushed()) {
                IoOutcome::Progress(n) => {
                    scratch.advance(n)?;
                    *interest = self.phase.interest();
                }
                out => {
                    waiting(out, interest)?;
                    return Ok(false);
                }
            }
        }
        Ok(scratch.is_flushed() && !self.session.wants_flush())
    }
}

/// Applies a non-progress outcome to `interest`.
fn waiting(out: IoOutcome, interest: &mut Interest) -> Result<(), ConnError> {
    match out {
        IoOutcome::WantsRead => *interest = Interest::Read,
        IoOutcome::WantsWrite => *interest = Interest::Write,
        IoOutcome::Failed(err) => return Err(ConnError::Io(err)),
        IoOutcome::Progress(_) => {}
    }
    Ok(())
}
