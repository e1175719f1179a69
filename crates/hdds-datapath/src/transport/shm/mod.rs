// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared memory notification for same-host datasharing readers.
//!
//! ```text
//! writer process                      reader process
//!   ReaderLocator                        DataReader
//!     DataSharingNotifier --- /hdds_ds_r<guid> ---> NotifyBucket
//!            notify(): counter += 1, futex wake     wait(snapshot)
//! ```

mod futex;
mod notifier;
mod segment;

pub use futex::{futex_wait, futex_wake_all};
pub use notifier::{DataSharingNotifier, NotifyBucket};
pub use segment::ShmSegment;

use std::fmt;
use std::io;

/// Errors of the shared memory notification path.
#[derive(Debug)]
pub enum ShmError {
    /// `shm_open` / `ftruncate` failed.
    SegmentOpen(io::Error),
    /// Memory mapping failed.
    Mmap(io::Error),
    /// Invalid segment name.
    InvalidName(String),
    /// Existing segment is shorter than the mapping asked for.
    TooSmall {
        name: String,
        size: usize,
        required: usize,
    },
    /// Notifier used before `enable()`.
    NotEnabled,
}

impl fmt::Display for ShmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SegmentOpen(e) => write!(f, "Shared memory segment open failed: {e}"),
            Self::Mmap(e) => write!(f, "Memory mapping failed: {e}"),
            Self::InvalidName(name) => write!(f, "Invalid segment name: {name}"),
            Self::TooSmall {
                name,
                size,
                required,
            } => write!(
                f,
                "Segment {name} too small: {size} bytes, need {required}"
            ),
            Self::NotEnabled => write!(f, "Datasharing notifier is not enabled"),
        }
    }
}

impl std::error::Error for ShmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SegmentOpen(e) | Self::Mmap(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for SHM operations
pub type Result<T> = std::result::Result<T, ShmError>;
