// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datasharing "new data" notification towards one reader.
//!
//! Each datasharing reader owns a one-bucket segment named after its GUID.
//! Writers bump the bucket counter and wake the futex; the reader snapshots
//! the counter before waiting so a notification racing with the wait is
//! never lost.

use super::futex::{futex_wait, futex_wake_all};
use super::segment::ShmSegment;
use super::{Result, ShmError};
use crate::core::Guid;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Notification counter, alone on its cache line.
#[repr(C, align(64))]
pub struct NotifyBucket {
    pub val: AtomicU32,
    _pad: [u8; 60],
}

impl NotifyBucket {
    pub const fn new() -> Self {
        Self {
            val: AtomicU32::new(0),
            _pad: [0u8; 60],
        }
    }

    #[inline]
    pub fn notify(&self) {
        self.val.fetch_add(1, Ordering::Release);
        futex_wake_all(&self.val);
    }

    #[inline]
    pub fn snapshot(&self) -> u32 {
        self.val.load(Ordering::Acquire)
    }

    /// Wait until the counter moves away from `snapshot`.
    #[inline]
    pub fn wait(&self, snapshot: u32, timeout: Option<Duration>) -> i32 {
        futex_wait(&self.val, snapshot, timeout)
    }
}

impl Default for NotifyBucket {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer-side handle on a datasharing reader's notification segment.
///
/// Disabled until [`enable`](Self::enable) maps the reader's segment.
#[derive(Debug)]
pub struct DataSharingNotifier {
    shm_directory: String,
    segment: Option<ShmSegment>,
}

impl DataSharingNotifier {
    pub const SEGMENT_SIZE: usize = std::mem::size_of::<NotifyBucket>();

    pub fn new(shm_directory: impl Into<String>) -> Self {
        Self {
            shm_directory: shm_directory.into(),
            segment: None,
        }
    }

    /// Segment name of `reader`: directory prefix + `_r` + GUID in hex.
    pub fn segment_name(shm_directory: &str, reader: &Guid) -> String {
        let guid_hex: String = reader.as_bytes().iter().map(|b| format!("{b:02x}")).collect();
        format!("{shm_directory}_r{guid_hex}")
    }

    /// Writer side: map the notification segment `reader` published.
    ///
    /// Never creates the segment; fails when the reader has not created it,
    /// so the caller can fall back to the network.
    pub fn enable(&mut self, reader: &Guid) -> Result<()> {
        let name = Self::segment_name(&self.shm_directory, reader);
        let segment = ShmSegment::open_existing(&name, Self::SEGMENT_SIZE)?;
        log::debug!("[DataSharingNotifier] enabled for reader {} ({})", reader, name);
        self.segment = Some(segment);
        Ok(())
    }

    /// Reader side: create (or reopen) the notification segment of `reader`.
    ///
    /// The reader owns the segment and removes it with [`unlink`](Self::unlink).
    pub fn create(&mut self, reader: &Guid) -> Result<()> {
        let name = Self::segment_name(&self.shm_directory, reader);
        let segment = ShmSegment::open_or_create(&name, Self::SEGMENT_SIZE)?;
        log::debug!("[DataSharingNotifier] created segment {} for reader {}", name, reader);
        self.segment = Some(segment);
        Ok(())
    }

    pub fn disable(&mut self) {
        if let Some(segment) = self.segment.take() {
            log::debug!("[DataSharingNotifier] disabled ({})", segment.name());
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.segment.is_some()
    }

    fn bucket(&self) -> Result<&NotifyBucket> {
        let segment = self.segment.as_ref().ok_or(ShmError::NotEnabled)?;
        // SAFETY: the mapping is SEGMENT_SIZE bytes, page aligned, and lives
        // as long as `self.segment`.
        Ok(unsafe { &*(segment.as_ptr() as *const NotifyBucket) })
    }

    /// Signal "new data available" to the reader.
    pub fn notify(&self) -> Result<()> {
        self.bucket()?.notify();
        Ok(())
    }

    /// Current counter, to pass to [`wait_for_notification`](Self::wait_for_notification).
    pub fn snapshot(&self) -> Result<u32> {
        Ok(self.bucket()?.snapshot())
    }

    /// Wait up to `timeout` for a notification after `snapshot`.
    ///
    /// Returns whether the counter moved.
    pub fn wait_for_notification(&self, snapshot: u32, timeout: Duration) -> Result<bool> {
        let bucket = self.bucket()?;
        if bucket.snapshot() == snapshot {
            bucket.wait(snapshot, Some(timeout));
        }
        Ok(bucket.snapshot() != snapshot)
    }

    /// Remove the notification segment of `reader` (reader-side cleanup).
    pub fn unlink(shm_directory: &str, reader: &Guid) -> Result<()> {
        ShmSegment::unlink(&Self::segment_name(shm_directory, reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn test_directory() -> String {
        format!("/hdds_dp_test{}_{}", std::process::id(), fastrand::u32(..))
    }

    #[test]
    fn test_bucket_layout() {
        assert_eq!(std::mem::align_of::<NotifyBucket>(), 64);
        assert_eq!(DataSharingNotifier::SEGMENT_SIZE, 64);
    }

    #[test]
    fn test_segment_name() {
        let guid = Guid::new([0x01; 12], [0, 0, 1, 7]);
        assert_eq!(
            DataSharingNotifier::segment_name("/hdds_ds", &guid),
            "/hdds_ds_r01010101010101010101010100000107"
        );
    }

    #[test]
    fn test_disabled_notifier_fails() {
        let notifier = DataSharingNotifier::new("/hdds_ds");
        assert!(!notifier.is_enabled());
        assert!(matches!(notifier.notify(), Err(ShmError::NotEnabled)));
    }

    #[test]
    fn test_enable_without_reader_segment_fails() {
        let dir = test_directory();
        let reader = Guid::new([0x44; 12], [0, 0, 1, 7]);

        let mut writer_side = DataSharingNotifier::new(dir.clone());
        assert!(matches!(
            writer_side.enable(&reader),
            Err(ShmError::SegmentOpen(_))
        ));
        assert!(!writer_side.is_enabled());

        let path = format!("/dev/shm{}", DataSharingNotifier::segment_name(&dir, &reader));
        assert!(!std::path::Path::new(&path).exists());
    }

    #[test]
    fn test_notify_wakes_reader_side() {
        let dir = test_directory();
        let reader = Guid::new([0x22; 12], [0, 0, 1, 7]);

        let mut reader_side = DataSharingNotifier::new(dir.clone());
        reader_side.create(&reader).expect("reader creates its segment");
        let snapshot = reader_side.snapshot().expect("enabled");

        let mut writer_side = DataSharingNotifier::new(dir.clone());
        writer_side.enable(&reader).expect("writer maps reader segment");

        let reader_side = Arc::new(reader_side);
        let waiter = {
            let reader_side = Arc::clone(&reader_side);
            thread::spawn(move || {
                reader_side
                    .wait_for_notification(snapshot, Duration::from_secs(2))
                    .expect("enabled")
            })
        };

        thread::sleep(Duration::from_millis(10));
        writer_side.notify().expect("notify");
        assert!(waiter.join().expect("waiter thread"));

        writer_side.disable();
        assert!(!writer_side.is_enabled());
        DataSharingNotifier::unlink(&dir, &reader).expect("cleanup");
    }

    #[test]
    fn test_wait_times_out_without_notification() {
        let dir = test_directory();
        let reader = Guid::new([0x33; 12], [0, 0, 1, 7]);
        let mut notifier = DataSharingNotifier::new(dir.clone());
        notifier.create(&reader).expect("create");

        let snapshot = notifier.snapshot().expect("enabled");
        let moved = notifier
            .wait_for_notification(snapshot, Duration::from_millis(20))
            .expect("enabled");
        assert!(!moved);
        DataSharingNotifier::unlink(&dir, &reader).expect("cleanup");
    }
}
