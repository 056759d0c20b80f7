//! Fixed capacity scratch buffer with a flush cursor and a fill cursor
//!
//! Layout: `[0, offset)` already flushed, `[offset, length)` pending,
//! `[length, capacity)` free. `offset <= length <= capacity` always holds,
//! every operation that would break it is rejected with [`CursorError`].

use std::io::{Error as IoError, ErrorKind as IoErrorKind, Result as IoResult, Write};

/// A cursor operation was outside the valid range of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CursorError {
    requested: usize,
    available: usize,
}

impl std::error::Error for CursorError {}

impl std::fmt::Display for CursorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cursor out of range: requested {} of {} bytes",
            self.requested, self.available
        )
    }
}

/// Reusable per-connection buffer, allocated once and never resized.
pub(crate) struct ScratchBuffer {
    data: Box<[u8]>,
    offset: usize,
    length: usize,
}

impl ScratchBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            offset: 0,
            length: 0,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes valid in the buffer
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.length
    }

    /// Bytes filled but not yet flushed
    #[inline]
    pub(crate) fn unflushed_len(&self) -> usize {
        self.length - self.offset
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.length == self.data.len()
    }

    #[inline]
    pub(crate) fn is_flushed(&self) -> bool {
        self.offset == self.length
    }

    /// Resets both cursors, the content is left as is.
    #[inline]
    pub(crate) fn clear(&mut self) {
        self.offset = 0;
        self.length = 0;
    }

    /// All valid bytes, flushed or not
    pub(crate) fn filled(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Valid bytes not yet flushed
    pub(crate) fn unflushed(&self) -> &[u8] {
        &self.data[self.offset..self.length]
    }

    /// Free space behind the fill cursor, to be followed by [`Self::commit`]
    pub(crate) fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.length..]
    }

    /// Marks `n` bytes behind the fill cursor as valid.
    pub(crate) fn commit(&mut self, n: usize) -> Result<(), CursorError> {
        let available = self.data.len() - self.length;
        if n > available {
            return Err(CursorError {
                requested: n,
                available,
            });
        }
        self.length += n;
        Ok(())
    }

    /// Marks `n` pending bytes as flushed.
    pub(crate) fn advance(&mut self, n: usize) -> Result<(), CursorError> {
        let available = self.unflushed_len();
        if n > available {
            return Err(CursorError {
                requested: n,
                available,
            });
        }
        self.offset += n;
        Ok(())
    }

    /// Drops the last `n` valid bytes.
    pub(crate) fn truncate_back(&mut self, n: usize) -> Result<(), CursorError> {
        let available = self.unflushed_len();
        if n > available {
            return Err(CursorError {
                requested: n,
                available,
            });
        }
        self.length -= n;
        Ok(())
    }
}

impl Write for ScratchBuffer {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        let spare = self.spare_mut();
        let n = buf.len().min(spare.len());
        if n == 0 && !buf.is_empty() {
            return Err(IoError::new(IoErrorKind::WriteZero, "scratch buffer full"));
        }
        spare[..n].copy_from_slice(&buf[..n]);
        self.length += n;
        Ok(n)
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl std::fmt::Debug for ScratchBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchBuffer")
            .field("capacity", &self.capacity())
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}
