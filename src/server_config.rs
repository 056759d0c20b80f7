use std::os::fd::RawFd;
use std::path::PathBuf;

use crate::common::LimitsConfig;

/// Where the listening portal comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    /// Resolve `host` and bind `port`, `0` picks a free port
    Bind {
        /// Host name or address literal
        host: String,
        /// TCP port
        port: u16,
    },
    /// Adopt a descriptor that is already bound and listening, e.g. one
    /// left open by a privileged parent process
    Inherited(RawFd),
}

impl ListenAddr {
    /// Create `[ListenAddr::Bind]`
    pub fn bind<H: Into<String>>(host: H, port: u16) -> Self {
        Self::Bind {
            host: host.into(),
            port,
        }
    }
}

/// Represents the config parameters required to create a server.
///
/// # Example
///
/// ```
/// # use brick::{ListenAddr, ServerConfig};
/// let cfg = ServerConfig {
///     addr: ListenAddr::bind("127.0.0.1", 8080),
///     root: "/srv/www".into(),
///     ..ServerConfig::default()
/// };
/// ```
///
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to listen to.
    pub addr: ListenAddr,

    /// Document root requested paths are resolved below
    pub root: PathBuf,

    /// Connection table and buffer sizes
    pub limits: LimitsConfig,

    /// If `Some`, then the server will use TLS to encode the communications.
    #[cfg(feature = "ssl-rustls")]
    pub tls: Option<crate::TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: ListenAddr::bind("127.0.0.1", 0),
            root: PathBuf::from("."),
            limits: LimitsConfig::default(),
            #[cfg(feature = "ssl-rustls")]
            tls: None,
        }
    }
}
