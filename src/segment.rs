// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Cross-process shared memory segment, identified by a system-wide name
// and mapped into the calling process's address space.
// Delegates to platform::PlatformShm (POSIX or Windows).

use std::ptr;

use crate::error::{Error, Result};
use crate::platform::PlatformShm;

/// A named, cross-process shared memory region.
///
/// An instance is either Unopened or Open. [`Self::create`] opens or
/// creates the backing object, sizes it, and maps it read/write shared;
/// every failure path tears the backing object down again, so a failed
/// `create` never leaves an orphan and never leaves this instance
/// partially open.
///
/// The region's contents carry no locking and no memory ordering — any
/// thread in this process and any process holding the same name may write
/// concurrently. Serialize access with a [`crate::NamedSemaphore`] or
/// another external mechanism.
///
/// Like the semaphore, the type is move-only with `&mut self` teardown,
/// so `close` cannot race the accessors on the same instance.
pub struct SharedMemorySegment {
    inner: Option<PlatformShm>,
}

impl SharedMemorySegment {
    /// An Unopened segment.
    pub const fn new() -> Self {
        Self { inner: None }
    }

    /// Open or create a named segment; convenience for `new` + `create`.
    pub fn open(name: &str, size: usize) -> Result<Self> {
        let mut seg = Self::new();
        seg.create(name, size)?;
        Ok(seg)
    }

    /// Open or create the backing object under `name`, size it to exactly
    /// `size` bytes (when newly created), and map it into this process,
    /// moving the instance to Open.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] for an empty name, an interior NUL, or a
    /// zero size (all rejected before any OS call); [`Error::AlreadyOpen`]
    /// if the instance is Open; [`Error::CreationFailed`] if create-or-open
    /// or the exact-size resize fails (the partially created object is
    /// removed again); [`Error::MapFailed`] if the mapping step fails (the
    /// backing object is torn down as a side effect).
    pub fn create(&mut self, name: &str, size: usize) -> Result<()> {
        if self.inner.is_some() {
            return Err(Error::AlreadyOpen);
        }
        if name.is_empty() {
            return Err(Error::InvalidArgument("segment name is empty"));
        }
        if name.as_bytes().contains(&0) {
            return Err(Error::InvalidArgument("segment name contains NUL"));
        }
        if size == 0 {
            return Err(Error::InvalidArgument("segment size is zero"));
        }
        let mut shm = PlatformShm::open(name, size).map_err(Error::CreationFailed)?;
        shm.map().map_err(Error::MapFailed)?;
        log::trace!("segment {name:?} mapped ({size} bytes)");
        self.inner = Some(shm);
        Ok(())
    }

    /// Unmap the region, release the backing handle and, on the POSIX
    /// backend, unlink the name. Idempotent; a no-op on an Unopened
    /// instance. Never fails, and the instance is Unopened afterwards
    /// regardless of OS errors during teardown.
    ///
    /// Other processes holding the same name keep their mappings; only the
    /// name is removed from the namespace.
    pub fn close(&mut self) {
        if let Some(shm) = self.inner.take() {
            log::trace!("segment {:?} closed", shm.name());
        }
    }

    /// Whether this instance is Open.
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// The name this instance is open under, or `None` when Unopened.
    pub fn name(&self) -> Option<&str> {
        self.inner.as_ref().map(PlatformShm::name)
    }

    /// The byte count fixed at creation, or 0 when Unopened.
    pub fn size(&self) -> usize {
        self.inner.as_ref().map_or(0, PlatformShm::size)
    }

    /// Pointer to the start of the mapped region, or null when Unopened.
    /// While non-null, `[ptr, ptr + size)` is mapped read/write and shared.
    pub fn as_ptr(&self) -> *const u8 {
        self.inner.as_ref().map_or(ptr::null(), PlatformShm::as_ptr)
    }

    /// Mutable pointer to the start of the mapped region, or null when
    /// Unopened.
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.inner
            .as_ref()
            .map_or(ptr::null_mut(), PlatformShm::as_mut_ptr)
    }

    /// Copy `bytes` into the region at `offset`. Bounds-checked; no
    /// locking or ordering is applied.
    ///
    /// # Errors
    /// [`Error::NotOpen`] on an Unopened instance,
    /// [`Error::InvalidArgument`] if `offset + bytes.len()` exceeds the
    /// segment size.
    pub fn write_at(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let shm = self.inner.as_ref().ok_or(Error::NotOpen)?;
        let end = offset
            .checked_add(bytes.len())
            .ok_or(Error::InvalidArgument("range overflows"))?;
        if end > shm.size() {
            return Err(Error::InvalidArgument("range past end of segment"));
        }
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), shm.as_mut_ptr().add(offset), bytes.len());
        }
        Ok(())
    }

    /// Copy `buf.len()` bytes out of the region at `offset` into `buf`.
    /// Bounds-checked; no locking or ordering is applied.
    ///
    /// # Errors
    /// Same conditions as [`Self::write_at`].
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let shm = self.inner.as_ref().ok_or(Error::NotOpen)?;
        let end = offset
            .checked_add(buf.len())
            .ok_or(Error::InvalidArgument("range overflows"))?;
        if end > shm.size() {
            return Err(Error::InvalidArgument("range past end of segment"));
        }
        unsafe {
            ptr::copy_nonoverlapping(shm.as_ptr().add(offset), buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    /// Best-effort removal of a named segment from the OS namespace
    /// without an open handle. No-op on Windows. Useful for clearing stale
    /// names left by a crashed process.
    pub fn remove(name: &str) {
        PlatformShm::unlink_by_name(name);
    }
}

impl Default for SharedMemorySegment {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SharedMemorySegment {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SharedMemorySegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemorySegment")
            .field("name", &self.name())
            .field("size", &self.size())
            .field("open", &self.is_open())
            .finish()
    }
}
