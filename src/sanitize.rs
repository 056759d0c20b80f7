//! In place sanitizing of request targets
//!
//! A clean path starts with a single `/`, has no empty segments and no
//! segment starting with `.`, which rules out `..` traversal and dotfiles
//! alike. A trailing `/` is kept.

use arrayvec::ArrayVec;

/// Path was refused, to be answered with `400 Bad Request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathRejected;

impl std::error::Error for PathRejected {}

impl std::fmt::Display for PathRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("path rejected")
    }
}

/// Sanitizes `path` in place.
///
/// Sanitizing a clean path leaves it unchanged. On error the content of
/// `path` is unspecified.
///
/// # Errors
///
/// [`PathRejected`] if `path` doesn't start with `/` or one of its segments
/// starts with `.`
pub fn sanitize<const N: usize>(path: &mut ArrayVec<u8, N>) -> Result<(), PathRejected> {
    if path.first() != Some(&b'/') {
        return Err(PathRejected);
    }

    let len = path.len();
    let mut read = 0;
    let mut write = 1;
    loop {
        while read < len && path[read] == b'/' {
            read += 1;
        }
        if read == len {
            break;
        }
        if path[read] == b'.' {
            return Err(PathRejected);
        }

        // segment including its trailing slash, if any
        let end = path[read..]
            .iter()
            .position(|&b| b == b'/')
            .map_or(len, |p| read + p + 1);
        path.copy_within(read..end, write);
        write += end - read;
        read = end;
    }
    path.truncate(write);

    Ok(())
}
