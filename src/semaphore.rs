// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Cross-process counting semaphore, identified by a system-wide name.
// Delegates to platform::PlatformSemaphore (POSIX or Windows).

use crate::error::{Error, Result};
use crate::platform::PlatformSemaphore;

/// A named, cross-process counting semaphore.
///
/// An instance is either Unopened or Open; there is no other observable
/// state. [`Self::create`] moves it to Open, [`Self::close`] (or drop)
/// back to Unopened, and the same instance may then be driven through
/// `create` again.
///
/// The type is move-only: exactly one live owner per OS handle. Teardown
/// cannot race an in-progress [`Self::wait`] on the same instance —
/// `close` needs the exclusive borrow that `wait` is holding. For
/// intra-process sharing, wrap the value in `Arc` and use the `&self`
/// operations.
///
/// Names are passed to the OS verbatim. POSIX wants a leading `/`; this
/// library neither validates nor normalizes that — caller responsibility.
pub struct NamedSemaphore {
    inner: Option<PlatformSemaphore>,
}

impl NamedSemaphore {
    /// An Unopened semaphore.
    pub const fn new() -> Self {
        Self { inner: None }
    }

    /// Open or create the named semaphore; convenience for `new` + `create`.
    pub fn open(name: &str, initial_count: u32) -> Result<Self> {
        let mut sem = Self::new();
        sem.create(name, initial_count)?;
        Ok(sem)
    }

    /// Open or create the OS semaphore under `name` with `initial_count`
    /// units, moving this instance to Open.
    ///
    /// If the name already exists, the backend attaches to the existing
    /// object and `initial_count` has no effect.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] for an empty name or one with an interior
    /// NUL (rejected before any OS call), [`Error::AlreadyOpen`] if this
    /// instance is Open (close it first), [`Error::CreationFailed`] if the
    /// backend rejects the create-or-open.
    pub fn create(&mut self, name: &str, initial_count: u32) -> Result<()> {
        if self.inner.is_some() {
            return Err(Error::AlreadyOpen);
        }
        if name.is_empty() {
            return Err(Error::InvalidArgument("semaphore name is empty"));
        }
        if name.as_bytes().contains(&0) {
            return Err(Error::InvalidArgument("semaphore name contains NUL"));
        }
        let sem = PlatformSemaphore::open(name, initial_count).map_err(Error::CreationFailed)?;
        log::trace!("semaphore {name:?} opened (initial count {initial_count})");
        self.inner = Some(sem);
        Ok(())
    }

    /// Block until the count is positive (then decrement it atomically) or
    /// until `timeout_ms` elapses. `None` waits unboundedly.
    ///
    /// Returns `Ok(true)` if a unit was acquired, `Ok(false)` on timeout.
    /// On the POSIX backend the relative timeout becomes an absolute
    /// CLOCK_REALTIME deadline, so it is subject to clock adjustments.
    ///
    /// # Errors
    /// [`Error::NotOpen`] on an Unopened instance, [`Error::WaitFailed`]
    /// on an OS-level failure.
    pub fn wait(&self, timeout_ms: Option<u64>) -> Result<bool> {
        let sem = self.inner.as_ref().ok_or(Error::NotOpen)?;
        sem.wait(timeout_ms).map_err(Error::WaitFailed)
    }

    /// Release `count` units, unblocking up to `count` waiters. `count` of
    /// zero is a no-op success.
    ///
    /// On the Windows backend this is one atomic batch. The POSIX backend
    /// has no bulk primitive and issues `count` single-unit releases; a
    /// mid-sequence failure reports [`Error::PartialRelease`] and the units
    /// already released stay released. Do not assume multi-unit increment
    /// is all-or-nothing.
    ///
    /// # Errors
    /// [`Error::NotOpen`] on an Unopened instance, [`Error::PartialRelease`]
    /// on a release failure.
    pub fn increment(&self, count: u32) -> Result<()> {
        let sem = self.inner.as_ref().ok_or(Error::NotOpen)?;
        if count == 0 {
            return Ok(());
        }
        sem.post(count).map_err(|f| Error::PartialRelease {
            released: f.released,
            requested: count,
            source: f.source,
        })
    }

    /// Release the OS handle and, on the POSIX backend, unlink the name.
    /// Idempotent; a no-op on an Unopened instance. Never fails: teardown
    /// errors are swallowed and the instance is Unopened afterwards
    /// regardless.
    ///
    /// Waiters in other processes are not disturbed — both backends keep
    /// the underlying object alive until its last handle is closed. A peer
    /// that must wake remote waiters before going away signals them with
    /// [`Self::increment`] first.
    pub fn close(&mut self) {
        if let Some(sem) = self.inner.take() {
            log::trace!("semaphore {:?} closed", sem.name());
        }
    }

    /// Whether this instance is Open.
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// The name this instance is open under, or `None` when Unopened.
    pub fn name(&self) -> Option<&str> {
        self.inner.as_ref().map(PlatformSemaphore::name)
    }

    /// Best-effort removal of a named semaphore from the OS namespace
    /// without an open handle. No-op on Windows, where the object vanishes
    /// with its last handle. Useful for clearing stale names left by a
    /// crashed process.
    pub fn remove(name: &str) {
        PlatformSemaphore::unlink_by_name(name);
    }
}

impl Default for NamedSemaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for NamedSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedSemaphore")
            .field("name", &self.name())
            .field("open", &self.is_open())
            .finish()
    }
}
