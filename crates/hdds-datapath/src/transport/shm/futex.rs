// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Futex wait/wake on words living in shared memory.
//!
//! Uses the shared `FUTEX_WAIT` / `FUTEX_WAKE` operations: the `_PRIVATE`
//! variants never wake a waiter in another process.

use std::ptr;
use std::sync::atomic::AtomicU32;
use std::time::Duration;

const FUTEX_WAIT: i32 = 0;
const FUTEX_WAKE: i32 = 1;

/// Block while `*addr == expected`, for at most `timeout`.
///
/// Returns 0 on wake (or spurious wakeup), -1 with `EAGAIN` when the value
/// already differs and -1 with `ETIMEDOUT` on timeout.
pub fn futex_wait(addr: &AtomicU32, expected: u32, timeout: Option<Duration>) -> i32 {
    let ts = timeout.map(|d| libc::timespec {
        tv_sec: d.as_secs() as libc::time_t,
        tv_nsec: d.subsec_nanos() as libc::c_long,
    });
    let ts_ptr = ts
        .as_ref()
        .map_or(ptr::null(), |t| t as *const libc::timespec);

    // SAFETY: `addr` is a live reference for the duration of the call and
    // `ts_ptr` is either null or points at `ts`, which outlives the syscall.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            addr as *const AtomicU32 as *const u32,
            FUTEX_WAIT,
            expected,
            ts_ptr,
            ptr::null::<u32>(),
            0i32,
        ) as i32
    }
}

/// Wake every waiter blocked on `addr`. Returns the number woken, or -1.
pub fn futex_wake_all(addr: &AtomicU32) -> i32 {
    // SAFETY: `addr` is a live reference; the wake operation ignores the
    // timeout and second address arguments.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            addr as *const AtomicU32 as *const u32,
            FUTEX_WAKE,
            i32::MAX,
            ptr::null::<libc::timespec>(),
            ptr::null::<u32>(),
            0i32,
        ) as i32
    }
}
