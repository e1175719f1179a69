// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Value types shared by both halves of the data path.

mod change;
mod guid;
mod locator;

pub use change::{CacheChange, ChangeKind, InstanceHandle, SampleIdentity, SequenceNumber};
pub use guid::Guid;
pub use locator::{
    Locator, LocatorList, LOCATOR_KIND_INVALID, LOCATOR_KIND_SHM, LOCATOR_KIND_UDPV4,
    LOCATOR_KIND_UDPV6,
};

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock in nanoseconds since the Unix epoch (0 if the clock is before it).
pub fn current_time_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
