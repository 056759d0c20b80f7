use std::error::Error;
use std::fs::File;
use std::io::{
    BufReader, Error as IoError, ErrorKind as IoErrorKind, Read, Result as IoResult, Write,
};
use std::net::TcpStream;
use std::os::fd::{AsFd, BorrowedFd};
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{RootCertStore, ServerConfig, ServerConnection};
use zeroize::Zeroizing;

use super::{ConfigError, TlsConfig};
use crate::log;
use crate::transport::{IoOutcome, Session, Transport};

/// TLS transport owning the server-wide context
pub struct TlsTransport {
    files: TlsConfig,
    context: Arc<ServerConfig>,
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTransport")
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}

impl TlsTransport {
    /// Builds the initial context from `files`.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if any of the files can't be loaded
    pub fn new(files: TlsConfig) -> Result<Self, ConfigError> {
        let context = load_context(&files)?;
        Ok(Self { files, context })
    }
}

impl Transport for TlsTransport {
    type Session = TlsSession;

    fn accept(&self, stream: TcpStream) -> IoResult<TlsSession> {
        let conn = ServerConnection::new(Arc::clone(&self.context))
            .map_err(|err| IoError::new(IoErrorKind::InvalidData, err))?;
        Ok(TlsSession { conn, stream })
    }

    fn reconfigure(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.context = load_context(&self.files)?;
        Ok(())
    }
}

fn load_context(files: &TlsConfig) -> Result<Arc<ServerConfig>, ConfigError> {
    // the CA file has to load, clients are never asked for a certificate
    let mut roots = RootCertStore::empty();
    for ca in load_certs(&files.ca_file)? {
        roots.add(ca).map_err(ConfigError::Tls)?;
    }
    log::debug!("{} CA certificates in {}", roots.len(), files.ca_file.display());

    let certs = load_certs(&files.cert_file)?;
    let key = load_key(&files.key_file)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(ConfigError::Tls)?;

    Ok(Arc::new(config))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let file = File::open(path).map_err(|err| ConfigError::Io(path.to_owned(), err))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ConfigError::Io(path.to_owned(), err))?;
    if certs.is_empty() {
        return Err(ConfigError::Empty(path.to_owned()));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    let pem = Zeroizing::new(
        std::fs::read(path).map_err(|err| ConfigError::Io(path.to_owned(), err))?,
    );
    rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(|err| ConfigError::Io(path.to_owned(), err))?
        .ok_or_else(|| ConfigError::Empty(path.to_owned()))
}

/// TLS session over a non-blocking [`TcpStream`]
pub struct TlsSession {
    conn: ServerConnection,
    stream: TcpStream,
}

impl std::fmt::Debug for TlsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsSession")
            .field("stream", &self.stream)
            .field("handshaking", &self.conn.is_handshaking())
            .finish_non_exhaustive()
    }
}

impl TlsSession {
    /// Pushes queued TLS records to the socket.
    fn flush_tls(&mut self) -> Result<(), IoOutcome> {
        while self.conn.wants_write() {
            match self.conn.write_tls(&mut self.stream) {
                Ok(_) => {}
                Err(err) if err.kind() == IoErrorKind::Interrupted => {}
                Err(err) if err.kind() == IoErrorKind::WouldBlock => {
                    return Err(IoOutcome::WantsWrite)
                }
                Err(err) => return Err(IoOutcome::Failed(err)),
            }
        }
        Ok(())
    }
}

impl Session for TlsSession {
    fn read(&mut self, buf: &mut [u8]) -> IoOutcome {
        loop {
            match self.conn.reader().read(buf) {
                // 0 after close_notify
                Ok(n) => return IoOutcome::Progress(n),
                Err(err) if err.kind() == IoErrorKind::WouldBlock => {}
                Err(err) => return IoOutcome::Failed(err),
            }

            // handshake flights go out before more records are read
            if let Err(out) = self.flush_tls() {
                return out;
            }

            match self.conn.read_tls(&mut self.stream) {
                Ok(0) => return IoOutcome::Progress(0),
                Ok(_) => {
                    if let Err(err) = self.conn.process_new_packets() {
                        // best effort, the alert is already queued
                        let _ = self.flush_tls();
                        return IoOutcome::Failed(IoError::new(IoErrorKind::InvalidData, err));
                    }
                }
                Err(err) if err.kind() == IoErrorKind::Interrupted => {}
                Err(err) if err.kind() == IoErrorKind::WouldBlock => return IoOutcome::WantsRead,
                Err(err) => return IoOutcome::Failed(err),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> IoOutcome {
        if let Err(out) = self.flush_tls() {
            return out;
        }
        if buf.is_empty() {
            return IoOutcome::Progress(0);
        }

        let n = match self.conn.writer().write(buf) {
            Ok(n) => n,
            Err(err) => return IoOutcome::Failed(err),
        };
        match self.flush_tls() {
            Ok(()) | Err(IoOutcome::WantsWrite) => IoOutcome::Progress(n),
            Err(out) => out,
        }
    }

    fn wants_flush(&self) -> bool {
        self.conn.wants_write()
    }
}

impl AsFd for TlsSession {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }
}
