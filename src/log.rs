//! Logging facade
//!
//! With the default `log` feature these are the macros of the `log` crate.
//! Without it every macro expands to a closure that is never called: the
//! arguments are still checked and count as used, but nothing is formatted.

#[cfg(feature = "log")]
pub(crate) use log::{debug, error, info, warn};

#[cfg(not(feature = "log"))]
macro_rules! log_mock {
    (target: $target:expr, $($arg:tt)+) => {{
        let _ = || {
            let _ = (&$target, format_args!($($arg)+));
        };
    }};
    ($($arg:tt)+) => {{
        let _ = || {
            let _ = format_args!($($arg)+);
        };
    }};
}

#[cfg(not(feature = "log"))]
pub(crate) use {log_mock as debug, log_mock as error, log_mock as info, log_mock as warn};
