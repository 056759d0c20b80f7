//! TLS termination with Rustls.
//!
//! The server-wide [`TlsTransport`] owns the TLS context built from a CA
//! file, a certificate chain and a private key. Every accepted connection
//! gets a [`TlsSession`] holding its own reference to the context in effect
//! at accept time, so [`Transport::reconfigure`](crate::Transport::reconfigure)
//! only changes what new connections see.
#![cfg(feature = "ssl-rustls")]

use std::path::PathBuf;

pub(crate) mod rustls;
pub use self::rustls::{TlsSession, TlsTransport};

/// Files the TLS context is (re)built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM bundle of CA certificates, checked on every (re)load
    pub ca_file: PathBuf,
    /// PEM certificate chain sent to clients
    pub cert_file: PathBuf,
    /// PEM private key of the certificate
    pub key_file: PathBuf,
}

impl TlsConfig {
    /// Create `[TlsConfig]`
    #[must_use]
    pub fn new<P: Into<PathBuf>>(ca_file: P, cert_file: P, key_file: P) -> Self {
        Self {
            ca_file: ca_file.into(),
            cert_file: cert_file.into(),
            key_file: key_file.into(),
        }
    }
}

/// Error building the TLS context
#[derive(Debug)]
pub enum ConfigError {
    /// File couldn't be read
    Io(PathBuf, std::io::Error),
    /// File contains no usable PEM item
    Empty(PathBuf),
    /// Rustls refused the material
    Tls(::rustls::Error),
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, err) => Some(err),
            ConfigError::Tls(err) => Some(err),
            ConfigError::Empty(_) => None,
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, err) => write!(f, "{}: {err}", path.display()),
            ConfigError::Empty(path) => write!(f, "{}: no PEM item found", path.display()),
            ConfigError::Tls(err) => write!(f, "tls: {err}"),
        }
    }
}
