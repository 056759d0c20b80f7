//! # Brick
//!
//! A single-threaded, non-blocking HTTP/1.1 server for static files, with
//! optional TLS termination.
//!
//! One `poll` call per loop iteration covers the listening socket and every
//! connection. Connections live in a fixed capacity table; when it's full,
//! admitting a new connection evicts one from the peer address holding the
//! most slots, or refuses the newcomer if every peer is distinct.
//!
//! Every connection cycles through three phases: it reads a `GET` request
//! head, writes the response head (with the body of error responses inline)
//! and streams the requested file. Then it waits for the next request on the
//! same stream.
//!
//! ## Creating the server
//!
//! ```no_run
//! use brick::{ListenAddr, Server, ServerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let server = Server::http(&ServerConfig {
//!     addr: ListenAddr::bind("0.0.0.0", 8080),
//!     root: "/srv/www".into(),
//!     ..ServerConfig::default()
//! })?;
//! # let _ = server;
//! # Ok(())
//! # }
//! ```
//!
//! ## Running and stopping
//!
//! [`Server::run`] blocks the calling thread until shutdown. A [`Control`]
//! handle taken beforehand stops it or makes the transport reload its
//! configuration, either programmatically or from `SIGINT`/`SIGTERM` and
//! `SIGUSR1` once [`Control::register_signals`] was called.
//!
//! ```no_run
//! # let server = brick::Server::http(&brick::ServerConfig::default()).unwrap();
//! let control = server.control();
//! let handle = std::thread::spawn(move || server.run());
//!
//! control.request_shutdown();
//! handle.join().unwrap().unwrap();
//! ```
//!
//! ## TLS
//!
//! With the `ssl-rustls` feature, [`Server::https`] serves over TLS with a
//! context built from a CA file, a certificate chain and a private key.
//! Reconfiguring rebuilds the context from the same files; connections
//! already established keep the context they started with.

#[cfg(feature = "log")]
use env_logger as _;

pub use common::{limits, LimitsConfig, StatusCode};
pub use control::{Control, Directive};
pub use request::{parse, ParseError, RequestHead};
pub use sanitize::{sanitize, PathRejected};
pub use server::Server;
pub use server_config::{ListenAddr, ServerConfig};
#[cfg(feature = "ssl-rustls")]
pub use ssl::{ConfigError, TlsConfig, TlsSession, TlsTransport};
pub use transport::{IoOutcome, PlainSession, PlainTransport, Session, Transport};

mod buffer;
mod common;
mod conn_table;
mod connection;
mod control;
mod log;
pub mod request;
mod response;
pub mod sanitize;
mod server;
mod server_config;
mod socket_listener;
pub mod ssl;
pub mod transport;
