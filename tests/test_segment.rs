// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Lifecycle, mapping, and cross-instance visibility tests for
// SharedMemorySegment.

use std::sync::atomic::{AtomicUsize, Ordering};

use named_ipc::{Error, SharedMemorySegment};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_name(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("/{prefix}_seg_{}_{n}", std::process::id())
}

#[test]
fn create_reports_size_and_address() {
    let name = unique_name("create");
    SharedMemorySegment::remove(&name);

    let mut seg = SharedMemorySegment::new();
    seg.create(&name, 1024).expect("create");
    assert_eq!(seg.size(), 1024);
    assert!(!seg.as_ptr().is_null());
    assert_eq!(seg.name(), Some(name.as_str()));
}

#[test]
fn empty_name_rejected() {
    let mut seg = SharedMemorySegment::new();
    let err = seg.create("", 256).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(!seg.is_open(), "failed create must leave instance Unopened");
    assert!(seg.as_ptr().is_null());
}

#[test]
fn zero_size_rejected() {
    let name = unique_name("zero");
    let mut seg = SharedMemorySegment::new();
    let err = seg.create(&name, 0).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(!seg.is_open());
    assert_eq!(seg.size(), 0);
}

#[test]
fn interior_nul_rejected() {
    let mut seg = SharedMemorySegment::new();
    let err = seg.create("/bad\0name", 64).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(!seg.is_open());
}

#[test]
fn create_while_open_rejected() {
    let name = unique_name("double_create");
    SharedMemorySegment::remove(&name);

    let mut seg = SharedMemorySegment::new();
    seg.create(&name, 128).expect("create");

    let other = unique_name("double_create_other");
    let err = seg.create(&other, 128).unwrap_err();
    assert!(matches!(err, Error::AlreadyOpen));
    assert_eq!(seg.name(), Some(name.as_str()));
}

#[test]
fn recreate_after_close() {
    let first = unique_name("recreate_a");
    let second = unique_name("recreate_b");
    SharedMemorySegment::remove(&first);
    SharedMemorySegment::remove(&second);

    let mut seg = SharedMemorySegment::new();
    seg.create(&first, 256).expect("first create");
    seg.close();
    seg.create(&second, 512).expect("second create");
    assert_eq!(seg.size(), 512);
    assert_eq!(seg.name(), Some(second.as_str()));
}

#[test]
fn raw_write_read() {
    let name = unique_name("raw");
    SharedMemorySegment::remove(&name);

    let seg = SharedMemorySegment::open(&name, 512).expect("open");

    let payload = b"shared memory test data";
    unsafe {
        std::ptr::copy_nonoverlapping(payload.as_ptr(), seg.as_mut_ptr(), payload.len());
    }
    let read_back = unsafe { std::slice::from_raw_parts(seg.as_ptr(), payload.len()) };
    assert_eq!(read_back, payload);
}

#[test]
fn cross_instance_visibility() {
    let name = unique_name("visibility");
    SharedMemorySegment::remove(&name);

    let writer = SharedMemorySegment::open(&name, 4096).expect("open writer");
    let reader = SharedMemorySegment::open(&name, 4096).expect("open reader");

    let payload = b"bytes at offset 128";
    let offset = 128;
    writer.write_at(offset, payload).expect("write_at");

    let mut buf = vec![0u8; payload.len()];
    reader.read_at(offset, &mut buf).expect("read_at");
    assert_eq!(&buf, payload, "peer mapping must observe the write");
}

#[test]
fn write_read_at_roundtrip() {
    let name = unique_name("roundtrip");
    SharedMemorySegment::remove(&name);

    let seg = SharedMemorySegment::open(&name, 256).expect("open");

    seg.write_at(0, &[1, 2, 3, 4]).expect("write at 0");
    seg.write_at(252, &[9, 9, 9, 9]).expect("write at end");

    let mut buf = [0u8; 4];
    seg.read_at(0, &mut buf).expect("read at 0");
    assert_eq!(buf, [1, 2, 3, 4]);
    seg.read_at(252, &mut buf).expect("read at end");
    assert_eq!(buf, [9, 9, 9, 9]);
}

#[test]
fn out_of_range_access_rejected() {
    let name = unique_name("bounds");
    SharedMemorySegment::remove(&name);

    let seg = SharedMemorySegment::open(&name, 64).expect("open");

    assert!(matches!(
        seg.write_at(60, &[0; 8]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        seg.write_at(usize::MAX, &[0; 2]),
        Err(Error::InvalidArgument(_))
    ));
    let mut buf = [0u8; 8];
    assert!(matches!(
        seg.read_at(60, &mut buf),
        Err(Error::InvalidArgument(_))
    ));

    // In-range boundary cases still work.
    seg.write_at(56, &[0; 8]).expect("write to the last 8 bytes");
    seg.write_at(64, &[]).expect("empty write at end");
}

#[test]
fn accessors_on_unopened_fail() {
    let seg = SharedMemorySegment::new();
    assert!(matches!(seg.write_at(0, &[1]), Err(Error::NotOpen)));
    let mut buf = [0u8; 1];
    assert!(matches!(seg.read_at(0, &mut buf), Err(Error::NotOpen)));
}

#[test]
fn close_is_idempotent_and_resets_getters() {
    let name = unique_name("idem");
    SharedMemorySegment::remove(&name);

    let mut seg = SharedMemorySegment::new();
    seg.create(&name, 128).expect("create");
    assert!(seg.is_open());

    seg.close();
    seg.close();
    assert!(!seg.is_open());
    assert!(seg.name().is_none());
    assert_eq!(seg.size(), 0);
    assert!(seg.as_ptr().is_null());
    assert!(seg.as_mut_ptr().is_null());
}

#[test]
fn close_never_opened_is_noop() {
    let mut seg = SharedMemorySegment::new();
    seg.close();
    assert!(!seg.is_open());
}

#[test]
fn struct_through_shared_memory() {
    let name = unique_name("typed");
    SharedMemorySegment::remove(&name);

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Payload {
        value: i32,
        text: [u8; 32],
    }

    let a = SharedMemorySegment::open(&name, 1024).expect("open a");
    let b = SharedMemorySegment::open(&name, 1024).expect("open b");

    let data = Payload {
        value: 42,
        text: {
            let mut buf = [0u8; 32];
            buf[..12].copy_from_slice(b"hello, peer!");
            buf
        },
    };

    unsafe {
        std::ptr::write(a.as_mut_ptr() as *mut Payload, data);
    }
    let read_back = unsafe { *(b.as_ptr() as *const Payload) };
    assert_eq!(read_back, data);
}

#[test]
fn large_segment() {
    let name = unique_name("large");
    SharedMemorySegment::remove(&name);

    let size = 4 * 1024 * 1024;
    let seg = SharedMemorySegment::open(&name, size).expect("open 4MB");
    assert_eq!(seg.size(), size);

    let pattern: Vec<u8> = (0..1024).map(|i| (i % 256) as u8).collect();
    seg.write_at(size - pattern.len(), &pattern)
        .expect("write tail");
    let mut buf = vec![0u8; pattern.len()];
    seg.read_at(size - pattern.len(), &mut buf).expect("read tail");
    assert_eq!(buf, pattern);
}

#[test]
fn drop_releases_mapping() {
    let name = unique_name("drop");
    SharedMemorySegment::remove(&name);

    {
        let _seg = SharedMemorySegment::open(&name, 256).expect("open");
    }
    // Dropped without an explicit close; a fresh create must work.
    let seg = SharedMemorySegment::open(&name, 256).expect("reopen");
    drop(seg);
}
