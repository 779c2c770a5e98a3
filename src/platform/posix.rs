// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX implementation of the named semaphore and shared memory backends.
// Semaphores: sem_open / sem_wait / sem_timedwait / sem_post / sem_close /
// sem_unlink.  Shared memory: shm_open / ftruncate / mmap / munmap / close /
// shm_unlink.

use std::ffi::CString;
use std::io;
use std::ptr;

/// Permission bits for created objects: rw for user, group, other.
const PERMS: libc::mode_t = 0o666;

fn c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Outcome of a failed multi-unit release: how many units went out before
/// the failing `sem_post`, plus the OS error it failed with.
#[derive(Debug)]
pub struct ReleaseFailure {
    pub released: u32,
    pub source: io::Error,
}

// ---------------------------------------------------------------------------
// Adaptive backoff — used by the macOS timed-wait emulation.
// ---------------------------------------------------------------------------

#[cfg(target_os = "macos")]
fn adaptive_yield(k: &mut u32) {
    if *k < 4 {
        // busy spin
    } else if *k < 16 {
        std::hint::spin_loop();
    } else if *k < 32 {
        std::thread::yield_now();
    } else {
        std::thread::sleep(std::time::Duration::from_millis(1));
        return;
    }
    *k += 1;
}

// ---------------------------------------------------------------------------
// PlatformSemaphore — POSIX named semaphore
// ---------------------------------------------------------------------------

pub struct PlatformSemaphore {
    sem: *mut libc::sem_t,
    name: String,
}

// Safety: POSIX intends sem_t* to be shared between threads after
// initialisation; all operations on it are thread-safe.
unsafe impl Send for PlatformSemaphore {}
unsafe impl Sync for PlatformSemaphore {}

impl PlatformSemaphore {
    /// Open or create the named semaphore with the given initial count.
    pub fn open(name: &str, initial: u32) -> io::Result<Self> {
        let c = c_name(name)?;
        loop {
            let sem = unsafe {
                libc::sem_open(
                    c.as_ptr(),
                    libc::O_CREAT,
                    PERMS as libc::c_uint,
                    initial as libc::c_uint,
                )
            };
            if sem == libc::SEM_FAILED {
                let e = io::Error::last_os_error();
                if e.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(e);
            }
            return Ok(Self {
                sem,
                name: name.to_string(),
            });
        }
    }

    /// Block until a unit is available, or until `timeout_ms` elapses.
    /// `None` blocks indefinitely. `Ok(true)` = acquired, `Ok(false)` = timeout.
    pub fn wait(&self, timeout_ms: Option<u64>) -> io::Result<bool> {
        match timeout_ms {
            None => loop {
                if unsafe { libc::sem_wait(self.sem) } == 0 {
                    return Ok(true);
                }
                let e = io::Error::last_os_error();
                if e.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(e);
            },
            Some(ms) => self.wait_timeout(ms),
        }
    }

    /// Timed wait against an absolute CLOCK_REALTIME deadline.
    #[cfg(not(target_os = "macos"))]
    fn wait_timeout(&self, ms: u64) -> io::Result<bool> {
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
        let ns_total = ts.tv_nsec as u64 + (ms % 1000) * 1_000_000;
        ts.tv_sec += (ms / 1000) as libc::time_t + (ns_total / 1_000_000_000) as libc::time_t;
        ts.tv_nsec = (ns_total % 1_000_000_000) as libc::c_long;
        loop {
            if unsafe { libc::sem_timedwait(self.sem, &ts) } == 0 {
                return Ok(true);
            }
            let e = io::Error::last_os_error();
            match e.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::ETIMEDOUT) => return Ok(false),
                _ => return Err(e),
            }
        }
    }

    /// macOS lacks sem_timedwait — emulate via sem_trywait polling.
    #[cfg(target_os = "macos")]
    fn wait_timeout(&self, ms: u64) -> io::Result<bool> {
        let deadline = std::time::Instant::now() + std::time::Duration::from_millis(ms);
        let mut k = 0u32;
        loop {
            if unsafe { libc::sem_trywait(self.sem) } == 0 {
                return Ok(true);
            }
            let e = io::Error::last_os_error();
            match e.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EINTR) => {}
                _ => return Err(e),
            }
            if std::time::Instant::now() >= deadline {
                return Ok(false);
            }
            adaptive_yield(&mut k);
        }
    }

    /// Release `count` units. POSIX has no bulk release, so this issues
    /// `count` independent sem_post calls; a mid-sequence failure stops the
    /// loop and reports how many units had already gone out.
    pub fn post(&self, count: u32) -> Result<(), ReleaseFailure> {
        for released in 0..count {
            if unsafe { libc::sem_post(self.sem) } != 0 {
                return Err(ReleaseFailure {
                    released,
                    source: io::Error::last_os_error(),
                });
            }
        }
        Ok(())
    }

    /// The name this semaphore was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove a named semaphore from the OS namespace without an open handle.
    pub fn unlink_by_name(name: &str) {
        if let Ok(c) = CString::new(name) {
            unsafe { libc::sem_unlink(c.as_ptr()) };
        }
    }
}

impl Drop for PlatformSemaphore {
    fn drop(&mut self) {
        // Waiters in other processes are unaffected: sem_unlink removes the
        // name only, the object lives until its last sem_close.
        unsafe { libc::sem_close(self.sem) };
        Self::unlink_by_name(&self.name);
    }
}

// ---------------------------------------------------------------------------
// PlatformShm — POSIX shared memory
// ---------------------------------------------------------------------------

pub struct PlatformShm {
    fd: libc::c_int,
    mem: *mut u8,
    size: usize,
    name: String,
}

// Safety: the shared memory region is process-shared by design.
unsafe impl Send for PlatformShm {}
unsafe impl Sync for PlatformShm {}

impl PlatformShm {
    /// Open or create the backing object and size it to exactly `size` bytes.
    /// The object is not yet mapped; call [`Self::map`] next.
    ///
    /// The resize step only runs when this call created the object (exclusive
    /// create succeeded). On macOS, ftruncate on an already-sized object
    /// fails with EINVAL, and on any OS it would clobber an existing
    /// segment's length.
    pub fn open(name: &str, size: usize) -> io::Result<Self> {
        let c = c_name(name)?;

        let fd = unsafe {
            libc::shm_open(
                c.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                PERMS as libc::c_uint,
            )
        };
        let fd = if fd != -1 {
            unsafe { libc::fchmod(fd, PERMS) };
            if unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
                let err = io::Error::last_os_error();
                // Tear the partially created object down before reporting.
                unsafe {
                    libc::close(fd);
                    libc::shm_unlink(c.as_ptr());
                }
                return Err(err);
            }
            fd
        } else {
            let e = io::Error::last_os_error();
            if e.raw_os_error() != Some(libc::EEXIST) {
                return Err(e);
            }
            // Already exists — attach without truncation.
            let fd = unsafe { libc::shm_open(c.as_ptr(), libc::O_RDWR, PERMS as libc::c_uint) };
            if fd == -1 {
                return Err(io::Error::last_os_error());
            }
            fd
        };

        Ok(Self {
            fd,
            mem: ptr::null_mut(),
            size,
            name: name.to_string(),
        })
    }

    /// Map the whole backing object read/write, shared across all mappers.
    /// On failure the backing object is closed and unlinked as a side
    /// effect, leaving this value fully torn down.
    pub fn map(&mut self) -> io::Result<()> {
        let mem = unsafe {
            libc::mmap(
                ptr::null_mut(),
                self.size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.fd,
                0,
            )
        };
        if mem == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(self.fd) };
            self.fd = -1;
            Self::unlink_by_name(&self.name);
            return Err(err);
        }
        self.mem = mem as *mut u8;
        Ok(())
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.mem
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.mem
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove a named segment from the OS namespace without an open handle.
    pub fn unlink_by_name(name: &str) {
        if let Ok(c) = CString::new(name) {
            unsafe { libc::shm_unlink(c.as_ptr()) };
        }
    }
}

impl Drop for PlatformShm {
    fn drop(&mut self) {
        if !self.mem.is_null() {
            unsafe { libc::munmap(self.mem as *mut libc::c_void, self.size) };
            self.mem = ptr::null_mut();
        }
        if self.fd >= 0 {
            unsafe { libc::close(self.fd) };
            self.fd = -1;
            Self::unlink_by_name(&self.name);
        }
    }
}
