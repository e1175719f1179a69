// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS consumed by the data path
//!
//! Read-only configuration handed to the history cache and the delivery
//! endpoints at construction time.
//!
//! # Examples
//!
//! ```
//! use hdds_datapath::{History, HistoryAttributes, ReaderHistoryQos, ResourceLimits};
//!
//! let qos = ReaderHistoryQos::new(History::KeepLast(4)).with_limits(ResourceLimits {
//!     max_instances: 8,
//!     ..Default::default()
//! });
//! assert!(qos.validate().is_ok());
//!
//! // Keyed KEEP_LAST reserves depth * max_instances slots.
//! let attrs = HistoryAttributes::from_qos(&qos, true);
//! assert_eq!(attrs.maximum_reserved_caches, 32);
//! ```

#[cfg(feature = "qos-loaders")]
pub mod loaders;

use crate::{Error, Result};

/// Value standing for "no limit" once a zero limit has been normalized.
///
/// Matches the DDS convention of mapping unlimited onto `i32::MAX`.
pub const LENGTH_UNLIMITED: usize = i32::MAX as usize;

/// History policy
///
/// Determines how many samples to keep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum History {
    /// Keep the last N samples (per instance for keyed topics), dropping the oldest.
    KeepLast(u32),
    /// Keep all samples within resource limits; admission fails once they are reached.
    KeepAll,
}

impl Default for History {
    fn default() -> Self {
        Self::KeepLast(1)
    }
}

/// Resource limits for the reader history
///
/// A value of 0 means unlimited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ResourceLimits {
    /// Maximum total samples across all instances
    pub max_samples: usize,
    /// Maximum instances
    pub max_instances: usize,
    /// Maximum samples per instance
    pub max_samples_per_instance: usize,
    /// Samples pre-allocated at construction
    pub allocated_samples: usize,
}

impl ResourceLimits {
    /// Replace every 0 ("unlimited") with [`LENGTH_UNLIMITED`].
    #[must_use]
    pub fn normalized(&self) -> Self {
        fn unlimited_if_zero(v: usize) -> usize {
            if v == 0 {
                LENGTH_UNLIMITED
            } else {
                v
            }
        }

        Self {
            max_samples: unlimited_if_zero(self.max_samples),
            max_instances: unlimited_if_zero(self.max_instances),
            max_samples_per_instance: unlimited_if_zero(self.max_samples_per_instance),
            allocated_samples: self.allocated_samples,
        }
    }
}

/// History-related QoS of a DataReader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ReaderHistoryQos {
    pub history: History,
    pub resource_limits: ResourceLimits,
}

impl ReaderHistoryQos {
    /// QoS with the given history and unlimited resources.
    pub fn new(history: History) -> Self {
        Self {
            history,
            resource_limits: ResourceLimits::default(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, resource_limits: ResourceLimits) -> Self {
        self.resource_limits = resource_limits;
        self
    }

    /// Validate QoS configuration
    ///
    /// # Validation Rules
    ///
    /// - History::KeepLast(n) where n > 0
    /// - max_samples_per_instance <= max_samples when both are bounded (non-zero)
    pub fn validate(&self) -> Result<()> {
        if let History::KeepLast(0) = self.history {
            return Err(Error::InvalidQos(
                "History::KeepLast(n) requires n > 0".to_string(),
            ));
        }

        let rl = self.resource_limits;
        if rl.max_samples != 0
            && rl.max_samples_per_instance != 0
            && rl.max_samples_per_instance > rl.max_samples
        {
            return Err(Error::InvalidQos(format!(
                "max_samples_per_instance ({}) must be <= max_samples ({})",
                rl.max_samples_per_instance, rl.max_samples
            )));
        }

        Ok(())
    }
}

/// Capacity of the base history derived from QoS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryAttributes {
    /// Slots reserved up front.
    pub initial_reserved_caches: usize,
    /// Hard capacity; reaching it blocks further admission until a removal.
    pub maximum_reserved_caches: usize,
}

impl HistoryAttributes {
    /// KEEP_ALL reserves `max_samples`; KEEP_LAST(d) reserves `d`, times
    /// `max_instances` for keyed topics.
    pub fn from_qos(qos: &ReaderHistoryQos, keyed: bool) -> Self {
        let limits = qos.resource_limits.normalized();
        let mut initial = limits.allocated_samples;
        let mut maximum = limits.max_samples;

        if let History::KeepLast(depth) = qos.history {
            maximum = depth as usize;
            if keyed {
                maximum = maximum
                    .saturating_mul(limits.max_instances)
                    .min(LENGTH_UNLIMITED);
            }
            initial = initial.min(maximum);
        }

        Self {
            initial_reserved_caches: initial,
            maximum_reserved_caches: maximum,
        }
    }
}

/// Whether writers deliver to readers of the same process directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IntraprocessDelivery {
    /// Always go through the transport.
    Off,
    /// Same-process readers are served by direct delivery.
    #[default]
    Full,
}

/// Shared-memory (datasharing) configuration of a writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataSharingConfig {
    /// Prefix of the POSIX shm names used for reader notification segments.
    pub shm_directory: String,
}

impl Default for DataSharingConfig {
    fn default() -> Self {
        Self {
            shm_directory: "/hdds_ds".to_string(),
        }
    }
}
