// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport helpers used by the delivery endpoints.

/// Shared memory notification for datasharing readers.
#[cfg(target_os = "linux")]
pub mod shm;

/// SHM stub for non-Linux platforms: the notifier never enables.
#[cfg(not(target_os = "linux"))]
pub mod shm {
    //! Stub module -- datasharing notification is only available on Linux.

    use crate::core::Guid;
    use std::fmt;
    use std::time::Duration;

    #[derive(Debug)]
    pub enum ShmError {
        /// Notifier used before `enable()`.
        NotEnabled,
        /// Shared memory is not supported on this platform.
        Unsupported,
    }

    impl fmt::Display for ShmError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::NotEnabled => write!(f, "Datasharing notifier is not enabled"),
                Self::Unsupported => write!(f, "Shared memory is only supported on Linux"),
            }
        }
    }

    impl std::error::Error for ShmError {}

    pub type Result<T> = std::result::Result<T, ShmError>;

    #[derive(Debug)]
    pub struct DataSharingNotifier {
        shm_directory: String,
    }

    impl DataSharingNotifier {
        pub fn new(shm_directory: impl Into<String>) -> Self {
            Self {
                shm_directory: shm_directory.into(),
            }
        }

        pub fn segment_name(shm_directory: &str, reader: &Guid) -> String {
            let guid_hex: String = reader.as_bytes().iter().map(|b| format!("{b:02x}")).collect();
            format!("{shm_directory}_r{guid_hex}")
        }

        pub fn enable(&mut self, reader: &Guid) -> Result<()> {
            log::warn!(
                "[DataSharingNotifier] shared memory unavailable, cannot notify {} ({})",
                reader,
                Self::segment_name(&self.shm_directory, reader)
            );
            Err(ShmError::Unsupported)
        }

        pub fn create(&mut self, _reader: &Guid) -> Result<()> {
            Err(ShmError::Unsupported)
        }

        pub fn disable(&mut self) {}

        pub fn is_enabled(&self) -> bool {
            false
        }

        pub fn notify(&self) -> Result<()> {
            Err(ShmError::NotEnabled)
        }

        pub fn snapshot(&self) -> Result<u32> {
            Err(ShmError::NotEnabled)
        }

        pub fn wait_for_notification(&self, _snapshot: u32, _timeout: Duration) -> Result<bool> {
            Err(ShmError::NotEnabled)
        }

        pub fn unlink(_shm_directory: &str, _reader: &Guid) -> Result<()> {
            Ok(())
        }
    }
}
