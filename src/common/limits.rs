//! Limits of the connection table and the per-connection buffers

/// Default maximum number of concurrently admitted connections
pub const MAX_CONNS_DEFAULT: usize = 1000;
/// Default capacity of the per-connection scratch buffer
pub const SCRATCH_SIZE_DEFAULT: usize = 2048;
/// Backlog of the listening portal
pub const BACKLOG: i32 = 128;
/// Capacity of the request target field, longer targets are truncated
pub const MAX_PATH: usize = 200;
/// Capacity of a recognized header value, longer values are truncated
pub const MAX_HEADER: usize = 200;

/// [`Config`] for `limits`
///
/// Both values are fixed for the lifetime of a [`Server`](crate::Server):
/// the table and every scratch buffer are allocated once on creation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Capacity of the connection table
    pub max_conns: usize,
    /// Capacity of each connection's scratch buffer
    pub scratch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_conns: MAX_CONNS_DEFAULT,
            scratch_size: SCRATCH_SIZE_DEFAULT,
        }
    }
}
