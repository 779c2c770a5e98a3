// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Failure kinds for the named-semaphore and shared-memory wrappers.
// The platform layer produces plain io::Error values (carrying errno /
// GetLastError); the core wrappers lift them into these kinds.

use std::error;
use std::fmt;
use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a semaphore or segment operation failed.
///
/// Every variant that originates in an OS call keeps the underlying
/// [`io::Error`] so the raw OS error code stays available for diagnosis.
#[derive(Debug)]
pub enum Error {
    /// Rejected before any OS call: empty name, zero size, interior NUL,
    /// out-of-range offset.
    InvalidArgument(&'static str),
    /// The operation requires an Open instance but this one is Unopened.
    NotOpen,
    /// `create()` was called on an instance that is already Open.
    /// Call `close()` first.
    AlreadyOpen,
    /// The backend rejected create-or-open (permission, exhaustion,
    /// invalid name) or the exact-size resize step.
    CreationFailed(io::Error),
    /// The backing object was created but mapping it into the address
    /// space failed. The backing object has already been torn down.
    MapFailed(io::Error),
    /// An OS-level wait failure. Timeouts are not errors; they surface as
    /// `Ok(false)` from `wait`.
    WaitFailed(io::Error),
    /// A multi-unit `increment` failed after `released` of `requested`
    /// units had been made available. Released units are not revocable.
    /// On the handle-style backend the release is a single atomic batch,
    /// so `released` is always 0 there.
    PartialRelease {
        released: u32,
        requested: u32,
        source: io::Error,
    },
}

impl Error {
    /// The underlying OS error, if this failure carries one.
    pub fn os_error(&self) -> Option<&io::Error> {
        match self {
            Error::InvalidArgument(_) | Error::NotOpen | Error::AlreadyOpen => None,
            Error::CreationFailed(e) | Error::MapFailed(e) | Error::WaitFailed(e) => Some(e),
            Error::PartialRelease { source, .. } => Some(source),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            Error::NotOpen => write!(f, "instance is not open"),
            Error::AlreadyOpen => write!(f, "instance is already open"),
            Error::CreationFailed(e) => write!(f, "create-or-open failed: {e}"),
            Error::MapFailed(e) => write!(f, "mapping failed: {e}"),
            Error::WaitFailed(e) => write!(f, "wait failed: {e}"),
            Error::PartialRelease {
                released,
                requested,
                source,
            } => write!(
                f,
                "released {released} of {requested} units before failing: {source}"
            ),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.os_error()
            .map(|e| e as &(dyn error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_partial_release() {
        let e = Error::PartialRelease {
            released: 3,
            requested: 5,
            source: io::Error::from_raw_os_error(22),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 of 5"));
    }

    #[test]
    fn os_error_exposed() {
        let e = Error::CreationFailed(io::Error::from_raw_os_error(13));
        assert_eq!(e.os_error().and_then(io::Error::raw_os_error), Some(13));
        assert!(Error::NotOpen.os_error().is_none());
    }
}
