// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! POSIX shared memory segment (`shm_open` + `mmap`).
//!
//! Names must start with `/` and contain no other `/`. Dropping a segment
//! unmaps it; removing the name is left to [`ShmSegment::unlink`].

use super::{Result, ShmError};
use std::ffi::CString;
use std::io;
use std::ptr;

/// Mapped shared memory region.
pub struct ShmSegment {
    ptr: *mut u8,
    size: usize,
    name: String,
}

// SAFETY: the mapping is process-wide and only accessed through atomics
// by the types built on top of it.
unsafe impl Send for ShmSegment {}
unsafe impl Sync for ShmSegment {}

impl ShmSegment {
    /// Map the segment `name`, creating it (zero-filled) if it does not exist.
    ///
    /// An existing segment shorter than `size` is grown to `size`.
    pub fn open_or_create(name: &str, size: usize) -> Result<Self> {
        Self::map(name, size, true)
    }

    /// Map an existing segment `name` without ever creating it.
    ///
    /// Fails with `SegmentOpen` (`NotFound`) when no such segment exists and
    /// with `TooSmall` when it is shorter than `size`.
    pub fn open_existing(name: &str, size: usize) -> Result<Self> {
        Self::map(name, size, false)
    }

    fn map(name: &str, size: usize, create: bool) -> Result<Self> {
        Self::validate_name(name)?;
        let c_name = CString::new(name).map_err(|_| ShmError::InvalidName(name.to_string()))?;

        let flags = if create {
            libc::O_CREAT | libc::O_RDWR
        } else {
            libc::O_RDWR
        };
        // SAFETY: `c_name` is a valid NUL-terminated string; the returned fd
        // is checked before use.
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), flags, 0o600) };
        if fd < 0 {
            return Err(ShmError::SegmentOpen(io::Error::last_os_error()));
        }

        // SAFETY: `fd` is a valid descriptor and `stat` is a plain C struct
        // fully written by fstat on success.
        let current_len = unsafe {
            let mut stat: libc::stat = std::mem::zeroed();
            if libc::fstat(fd, &mut stat) < 0 {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(ShmError::SegmentOpen(err));
            }
            stat.st_size as usize
        };

        if current_len < size && !create {
            // SAFETY: `fd` is valid and not used afterwards.
            unsafe { libc::close(fd) };
            return Err(ShmError::TooSmall {
                name: name.to_string(),
                size: current_len,
                required: size,
            });
        }

        if current_len < size {
            // New pages are zero-filled by the kernel.
            // SAFETY: `fd` is valid; failure is reported below.
            if unsafe { libc::ftruncate(fd, size as libc::off_t) } < 0 {
                let err = io::Error::last_os_error();
                // SAFETY: `fd` is valid and not used afterwards.
                unsafe { libc::close(fd) };
                return Err(ShmError::SegmentOpen(err));
            }
        }

        // SAFETY: kernel-chosen address, `size` bytes of a descriptor that is
        // at least that long; MAP_FAILED is checked below.
        let mapped = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        // SAFETY: the mapping holds its own reference to the object.
        unsafe { libc::close(fd) };

        if mapped == libc::MAP_FAILED {
            return Err(ShmError::Mmap(io::Error::last_os_error()));
        }

        Ok(Self {
            ptr: mapped as *mut u8,
            size,
            name: name.to_string(),
        })
    }

    fn validate_name(name: &str) -> Result<()> {
        if !name.starts_with('/') {
            return Err(ShmError::InvalidName(format!(
                "Segment name must start with '/': {name}"
            )));
        }
        if name[1..].contains('/') {
            return Err(ShmError::InvalidName(format!(
                "Segment name cannot contain '/' after prefix: {name}"
            )));
        }
        if name.len() > 255 {
            return Err(ShmError::InvalidName(format!(
                "Segment name too long (max 255): {name}"
            )));
        }
        Ok(())
    }

    /// Remove the segment name. A missing segment is not an error.
    pub fn unlink(name: &str) -> Result<()> {
        let c_name = CString::new(name).map_err(|_| ShmError::InvalidName(name.to_string()))?;

        // SAFETY: `c_name` is a valid NUL-terminated string.
        if unsafe { libc::shm_unlink(c_name.as_ptr()) } < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::NotFound {
                return Err(ShmError::SegmentOpen(err));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`size` come from the successful mmap in
        // `map` and are unmapped exactly once.
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.size);
        }
    }
}

impl std::fmt::Debug for ShmSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmSegment")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        format!("/hdds_dp_test_{tag}_{}_{}", std::process::id(), fastrand::u32(..))
    }

    #[test]
    fn test_invalid_names() {
        assert!(matches!(
            ShmSegment::open_or_create("no_slash", 64),
            Err(ShmError::InvalidName(_))
        ));
        assert!(matches!(
            ShmSegment::open_or_create("/a/b", 64),
            Err(ShmError::InvalidName(_))
        ));
    }

    #[test]
    fn test_open_existing_never_creates() {
        let name = unique_name("missing");
        match ShmSegment::open_existing(&name, 64) {
            Err(ShmError::SegmentOpen(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected NotFound, got {:?}", other),
        }
        let path = format!("/dev/shm{name}");
        assert!(!std::path::Path::new(&path).exists());
    }

    #[test]
    fn test_open_existing_rejects_short_segment() {
        let name = unique_name("short");
        let created = ShmSegment::open_or_create(&name, 16).expect("create segment");
        assert!(matches!(
            ShmSegment::open_existing(&name, 64),
            Err(ShmError::TooSmall { required: 64, .. })
        ));
        let opened = ShmSegment::open_existing(&name, 16).expect("open segment");
        assert_eq!(opened.size(), 16);

        drop(created);
        drop(opened);
        ShmSegment::unlink(&name).expect("unlink");
    }

    #[test]
    fn test_two_mappings_share_memory() {
        let name = unique_name("share");
        let first = ShmSegment::open_or_create(&name, 64).expect("create segment");
        let second = ShmSegment::open_or_create(&name, 64).expect("open segment");

        // SAFETY: both mappings are 64 bytes long.
        unsafe {
            assert_eq!(*second.as_ptr(), 0);
            *first.as_ptr() = 42;
            assert_eq!(*second.as_ptr(), 42);
        }

        drop(first);
        drop(second);
        ShmSegment::unlink(&name).expect("unlink");
        ShmSegment::unlink(&name).expect("unlink twice is fine");
    }
}
