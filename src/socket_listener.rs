//! Listening portal: a bound, listening, non-blocking TCP socket

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use crate::common::limits::BACKLOG;
use crate::log;

/// Resolves `host` and `port` and binds the first address that accepts a
/// listening socket.
///
/// # Errors
///
/// - `std::io::Error` when the address doesn't resolve or no resolved
///   address can be bound
///
pub(crate) fn open_portal(host: &str, port: u16) -> std::io::Result<TcpListener> {
    let addresses: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    log::debug!("addresses: {addresses:?}");

    let mut last_err = None;
    for address in addresses {
        match bind(address) {
            Ok(listener) => return Ok(listener),
            Err(err) => {
                log::debug!("bind {address} failed: {err}");
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("{host}:{port} resolves to no address"),
        )
    }))
}

fn bind(address: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(address),
        socket2::Type::STREAM,
        None,
    )?;
    socket.set_reuse_address(true)?;
    socket.bind(&address.into())?;
    socket.listen(BACKLOG)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Adopts an inherited, already listening descriptor as the portal.
///
/// # Errors
///
/// - `std::io::Error` when `fd` is no listening TCP socket
///
pub(crate) fn adopt(fd: RawFd) -> std::io::Result<TcpListener> {
    // SAFETY: the descriptor is handed over by the parent process and owned
    // by nothing else in this one
    #[allow(unsafe_code)]
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };

    let socket = socket2::Socket::from(owned);
    if socket.r#type()? != socket2::Type::STREAM {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("descriptor {fd} is no stream socket"),
        ));
    }
    // fails for anything but a bound socket
    let _ = socket.local_addr()?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}
