//! [`Server`], the single-threaded event loop
//!
//! One tick blocks in a single `poll` over the portal, the control wake-up
//! socket and every admitted connection. On wake-up it consumes the pending
//! [`Directive`], accepts until the portal would block, then drives every
//! connection with pending readiness once, in table order.

use std::error::Error;
use std::io::{ErrorKind as IoErrorKind, Result as IoResult};
use std::net::{SocketAddr, TcpListener};
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::conn_table::ConnTable;
use crate::connection::{Conn, ConnError, Interest};
use crate::control::{self, Control, Directive};
use crate::log;
use crate::response::ResponseBuilder;
use crate::server_config::{ListenAddr, ServerConfig};
use crate::socket_listener;
use crate::transport::{PlainTransport, Transport};

/// Static file server over the transport `T`
///
/// # Example
///
/// ```no_run
/// use brick::{ListenAddr, Server, ServerConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let server = Server::http(&ServerConfig {
///     addr: ListenAddr::bind("0.0.0.0", 8080),
///     ..ServerConfig::default()
/// })?;
/// server.control().register_signals()?;
/// server.run()?;
/// # Ok(())
/// # }
/// ```
#[allow(missing_debug_implementations)]
pub struct Server<T: Transport> {
    portal: TcpListener,
    local_addr: Option<SocketAddr>,
    transport: T,
    table: ConnTable<T::Session>,
    responder: ResponseBuilder,
    control: Control,
    wakeup: UnixStream,
    revents: Vec<PollFlags>,
}

impl Server<PlainTransport> {
    /// Builds a plaintext server from `config`.
    ///
    /// # Errors
    ///
    /// See [`Server::new`]
    #[inline]
    pub fn http(config: &ServerConfig) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Self::new(config, PlainTransport)
    }
}

#[cfg(feature = "ssl-rustls")]
impl Server<crate::TlsTransport> {
    /// Builds a TLS server from `config`, which needs a [`crate::TlsConfig`].
    ///
    /// # Errors
    ///
    /// - missing TLS configuration
    /// - [`crate::ConfigError`] when the CA, certificate or key file can't
    ///   be loaded
    /// - see [`Server::new`]
    pub fn https(config: &ServerConfig) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let tls = config.tls.clone().ok_or("missing tls configuration")?;
        Self::new(config, crate::TlsTransport::new(tls)?)
    }
}

impl<T: Transport> Server<T> {
    /// Opens or adopts the portal and allocates the connection table with
    /// all of its buffers.
    ///
    /// # Errors
    ///
    /// - limits of zero
    /// - `std::io::Error` when the portal can't be opened or adopted
    ///
    pub fn new(config: &ServerConfig, transport: T) -> Result<Self, Box<dyn Error + Send + Sync>> {
        if config.limits.max_conns == 0 || config.limits.scratch_size == 0 {
            return Err("limits must be at least 1".into());
        }

        let portal = match &config.addr {
            ListenAddr::Bind { host, port } => socket_listener::open_portal(host, *port)?,
            ListenAddr::Inherited(fd) => socket_listener::adopt(*fd)?,
        };
        let local_addr = portal.local_addr().ok();
        let (control, wakeup) = Control::new()?;

        Ok(Self {
            portal,
            local_addr,
            transport,
            table: ConnTable::new(config.limits),
            responder: ResponseBuilder::new(config.root.clone()),
            control,
            wakeup,
            revents: Vec::with_capacity(config.limits.max_conns),
        })
    }

    /// Address of the portal
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns the number of clients currently connected to the server.
    #[must_use]
    pub fn num_connections(&self) -> usize {
        self.table.len()
    }

    /// Handle to stop or reconfigure the server once it runs
    #[must_use]
    pub fn control(&self) -> Control {
        self.control.clone()
    }

    /// Serves until shutdown is requested, then closes every connection
    /// and the portal.
    ///
    /// # Errors
    ///
    /// `std::io::Error` when polling fails
    ///
    pub fn run(mut self) -> IoResult<()> {
        if let Some(addr) = self.local_addr {
            log::info!("serving on {addr}");
        }

        let result = loop {
            match self.tick() {
                Ok(Directive::Shutdown) => break Ok(()),
                Ok(_) => {}
                Err(err) => {
                    log::error!("poll failed: {err}");
                    break Err(err);
                }
            }
        };

        log::info!("shutting down, closing {} connections", self.table.len());
        self.table.clear();
        result
    }

    fn tick(&mut self) -> IoResult<Directive> {
        self.poll()?;

        let directive = self.control.directive();
        match directive {
            Directive::Shutdown => return Ok(directive),
            Directive::Reconfigure => self.reconfigure(),
            Directive::Continue => {}
        }
        control::drain(&mut self.wakeup);

        self.accept_all();
        self.dispatch();
        Ok(directive)
    }

    /// Blocks until a descriptor is ready or a signal arrives, then stores
    /// the readiness of every connection.
    fn poll(&mut self) -> IoResult<()> {
        let mut fds = Vec::with_capacity(self.table.len() + 2);
        fds.push(PollFd::new(self.portal.as_fd(), PollFlags::POLLIN));
        fds.push(PollFd::new(self.wakeup.as_fd(), PollFlags::POLLIN));
        fds.extend(
            self.table
                .registrations()
                .map(|(fd, interest)| PollFd::new(fd, poll_flags(interest))),
        );

        self.revents.clear();
        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => self.revents.extend(
                fds[2..]
                    .iter()
                    .map(|fd| fd.revents().unwrap_or(PollFlags::empty())),
            ),
            // a signal, flags are looked at next
            Err(Errno::EINTR) => {}
            Err(errno) => return Err(errno.into()),
        }
        drop(fds);

        let len = self.table.len();
        self.revents.resize(len, PollFlags::empty());
        self.table.set_revents(self.revents.drain(..));
        Ok(())
    }

    fn reconfigure(&mut self) {
        log::info!("reconfiguring");
        match self.transport.reconfigure() {
            Ok(()) => log::info!("reconfigured"),
            Err(err) => log::warn!("reconfigure failed, keeping previous configuration: {err}"),
        }
    }

    /// Accepts until the portal would block.
    fn accept_all(&mut self) {
        loop {
            let (stream, peer) = match self.portal.accept() {
                Ok(accepted) => accepted,
                Err(err) if err.kind() == IoErrorKind::Interrupted => continue,
                Err(err) if err.kind() == IoErrorKind::WouldBlock => break,
                Err(err) => {
                    log::warn!("accept failed: {err}");
                    break;
                }
            };

            if let Err(err) = stream.set_nonblocking(true) {
                log::warn!("{peer}: {err}");
                continue;
            }
            if !self.table.make_room() {
                log::warn!("{peer}: rejected, no connection to evict");
                continue;
            }
            let session = match self.transport.accept(stream) {
                Ok(session) => session,
                Err(err) => {
                    log::warn!("{peer}: session setup failed: {err}");
                    continue;
                }
            };

            log::info!("{peer}: accepted");
            if self.table.insert(Conn::new(session, peer)).is_err() {
                log::warn!("{peer}: rejected, table full");
            }
        }
    }

    /// Drives every connection with pending readiness once. A removal moves
    /// the last slot into the current index, which is then visited again.
    fn dispatch(&mut self) {
        let mut idx = 0;
        while let Some((conn, scratch, reg)) = self.table.get_mut(idx) {
            let revents = std::mem::replace(&mut reg.revents, PollFlags::empty());
            if revents.is_empty() {
                idx += 1;
                continue;
            }

            let peer = conn.peer();
            let result = if revents.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL) {
                Err(ConnError::Socket)
            } else {
                conn.drive(scratch, &mut reg.interest, &mut self.responder)
            };

            match result {
                Ok(()) => idx += 1,
                Err(err) => {
                    log::info!("{peer}: {err}");
                    self.table.remove(idx);
                }
            }
        }
    }
}

fn poll_flags(interest: Interest) -> PollFlags {
    match interest {
        Interest::Read => PollFlags::POLLIN,
        Interest::Write => PollFlags::POLLOUT,
    }
}
