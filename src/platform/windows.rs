// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Windows implementation of the named semaphore and shared memory backends.
// Semaphores: CreateSemaphoreW / WaitForSingleObject / ReleaseSemaphore /
// CloseHandle.  Shared memory: CreateFileMappingW / MapViewOfFile /
// UnmapViewOfFile / CloseHandle (pagefile-backed, no file to unlink).

use std::io;
use std::ptr;

use windows_sys::Win32::Foundation::{
    CloseHandle, HANDLE, INVALID_HANDLE_VALUE, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, MapViewOfFile, UnmapViewOfFile, FILE_MAP_ALL_ACCESS,
    MEMORY_MAPPED_VIEW_ADDRESS, PAGE_READWRITE, SEC_COMMIT,
};
use windows_sys::Win32::System::Threading::{
    CreateSemaphoreW, ReleaseSemaphore, WaitForSingleObject, INFINITE,
};

/// Encode a name as a null-terminated wide string for Win32 APIs.
fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Outcome of a failed release. ReleaseSemaphore is a single atomic batch,
/// so a failure here has always released 0 of the requested units.
#[derive(Debug)]
pub struct ReleaseFailure {
    pub released: u32,
    pub source: io::Error,
}

// ---------------------------------------------------------------------------
// PlatformSemaphore — Win32 named semaphore
// ---------------------------------------------------------------------------

pub struct PlatformSemaphore {
    handle: HANDLE,
    name: String,
}

// Safety: Win32 semaphore handles may be used from any thread.
unsafe impl Send for PlatformSemaphore {}
unsafe impl Sync for PlatformSemaphore {}

impl PlatformSemaphore {
    /// Open or create the named semaphore with the given initial count and
    /// a practically unbounded ceiling.
    pub fn open(name: &str, initial: u32) -> io::Result<Self> {
        let wide = to_wide(name);
        let initial = initial.min(i32::MAX as u32) as i32;
        let handle =
            unsafe { CreateSemaphoreW(ptr::null(), initial, i32::MAX, wide.as_ptr()) };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            handle,
            name: name.to_string(),
        })
    }

    /// Block until a unit is available, or until `timeout_ms` elapses.
    /// `None` blocks indefinitely. `Ok(true)` = acquired, `Ok(false)` = timeout.
    pub fn wait(&self, timeout_ms: Option<u64>) -> io::Result<bool> {
        let ms = match timeout_ms {
            None => INFINITE,
            // INFINITE is 0xFFFFFFFF; saturate just below it.
            Some(ms) => ms.min((INFINITE - 1) as u64) as u32,
        };
        let ret = unsafe { WaitForSingleObject(self.handle, ms) };
        match ret {
            WAIT_OBJECT_0 => Ok(true),
            WAIT_TIMEOUT => Ok(false),
            _ => Err(io::Error::last_os_error()),
        }
    }

    /// Release `count` units in one atomic batch.
    pub fn post(&self, count: u32) -> Result<(), ReleaseFailure> {
        let n = count.min(i32::MAX as u32) as i32;
        if unsafe { ReleaseSemaphore(self.handle, n, ptr::null_mut()) } == 0 {
            return Err(ReleaseFailure {
                released: 0,
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    /// The name this semaphore was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// No-op: Win32 named objects vanish with their last handle.
    pub fn unlink_by_name(_name: &str) {}
}

impl Drop for PlatformSemaphore {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { CloseHandle(self.handle) };
        }
    }
}

// ---------------------------------------------------------------------------
// PlatformShm — Windows shared memory via pagefile-backed file mapping
// ---------------------------------------------------------------------------

pub struct PlatformShm {
    handle: HANDLE,
    mem: *mut u8,
    size: usize,
    name: String,
}

// Safety: the shared memory region is process-shared by design.
unsafe impl Send for PlatformShm {}
unsafe impl Sync for PlatformShm {}

impl PlatformShm {
    /// Open or create the backing file mapping of exactly `size` bytes.
    /// The object is not yet mapped; call [`Self::map`] next.
    pub fn open(name: &str, size: usize) -> io::Result<Self> {
        let wide = to_wide(name);
        let size64 = size as u64;
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                ptr::null(),
                PAGE_READWRITE | SEC_COMMIT,
                (size64 >> 32) as u32,
                size64 as u32,
                wide.as_ptr(),
            )
        };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            handle,
            mem: ptr::null_mut(),
            size,
            name: name.to_string(),
        })
    }

    /// Map the whole backing object read/write, shared across all mappers.
    /// On failure the backing handle is closed as a side effect, leaving
    /// this value fully torn down.
    pub fn map(&mut self) -> io::Result<()> {
        let view = unsafe { MapViewOfFile(self.handle, FILE_MAP_ALL_ACCESS, 0, 0, self.size) };
        if view.Value.is_null() {
            let err = io::Error::last_os_error();
            unsafe { CloseHandle(self.handle) };
            self.handle = ptr::null_mut();
            return Err(err);
        }
        self.mem = view.Value.cast();
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

    /// No-op: the mapping is pagefile-backed, there is no name to unlink.
    pub fn unlink_by_name(_name: &str) {}
}

impl Drop for PlatformShm {
    fn drop(&mut self) {
        if !self.mem.is_null() {
            let view = MEMORY_MAPPED_VIEW_ADDRESS {
                Value: self.mem.cast(),
            };
            unsafe { UnmapViewOfFile(view) };
            self.mem = ptr::null_mut();
        }
        if !self.handle.is_null() {
            unsafe { CloseHandle(self.handle) };
        }
    }
}
