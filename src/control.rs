//! Shutdown and reconfigure requests for the event loop
//!
//! Signal handlers only set atomic flags. The loop consumes them once per
//! tick as a [`Directive`]. Programmatic requests also write a byte to a
//! socket the loop polls, so they take effect without waiting for other
//! traffic.

use std::io::{Read, Result as IoResult, Write};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};

/// What the loop does after waking up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Keep serving
    Continue,
    /// Re-derive the transport configuration, then keep serving
    Reconfigure,
    /// Tear everything down and return
    Shutdown,
}

/// Handle to request shutdown or reconfiguration of a running server
#[derive(Clone, Debug)]
pub struct Control {
    shutdown: Arc<AtomicBool>,
    reconfigure: Arc<AtomicBool>,
    waker: Arc<UnixStream>,
}

impl Control {
    /// Creates the flags and the socket pair; the returned stream is the
    /// end to poll.
    pub(crate) fn new() -> IoResult<(Self, UnixStream)> {
        let (waker, wakeup) = UnixStream::pair()?;
        waker.set_nonblocking(true)?;
        wakeup.set_nonblocking(true)?;
        let control = Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            reconfigure: Arc::new(AtomicBool::new(false)),
            waker: Arc::new(waker),
        };
        Ok((control, wakeup))
    }

    /// Routes `SIGINT` and `SIGTERM` to shutdown and `SIGUSR1` to
    /// reconfiguration.
    ///
    /// # Errors
    ///
    /// A handler couldn't be installed.
    pub fn register_signals(&self) -> IoResult<()> {
        let _ = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown))?;
        let _ = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown))?;
        let _ = signal_hook::flag::register(SIGUSR1, Arc::clone(&self.reconfigure))?;
        Ok(())
    }

    /// Asks the loop to shut down at its next wake-up.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake();
    }

    /// Asks the loop to reconfigure at its next wake-up.
    pub fn request_reconfigure(&self) {
        self.reconfigure.store(true, Ordering::SeqCst);
        self.wake();
    }

    /// Consumes pending requests, shutdown dominating.
    pub(crate) fn directive(&self) -> Directive {
        let reconfigure = self.reconfigure.swap(false, Ordering::SeqCst);
        if self.shutdown.load(Ordering::SeqCst) {
            Directive::Shutdown
        } else if reconfigure {
            Directive::Reconfigure
        } else {
            Directive::Continue
        }
    }

    fn wake(&self) {
        // a full socket already wakes the loop
        let _ = (&*self.waker).write(&[1]);
    }
}

/// Empties the polled end of the wake-up pair.
pub(crate) fn drain(wakeup: &mut UnixStream) {
    let mut buf = [0u8; 64];
    while matches!(wakeup.read(&mut buf), Ok(n) if n > 0) {}
}
