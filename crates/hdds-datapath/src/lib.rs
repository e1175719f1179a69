// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HDDS data path
//!
//! The two pieces of the HDDS data path that decide what a subscriber keeps
//! and how a publisher reaches each matched subscriber.
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  Subscription side                                                  |
//! |   transport -> deserializer -> CacheChange                          |
//! |        -> DataReaderHistory::received_change (QoS admission)        |
//! |        -> application take (get_first_untaken_info)                 |
//! +---------------------------------------------------------------------+
//! |  Publication side                                                   |
//! |   application write -> writer -> for each matched reader:           |
//! |        ReaderLocator::send (unicast / multicast)                    |
//! |        ReaderLocator::datasharing_notify (in-process / SHM)         |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DataReaderHistory`] | Bounded, QoS-governed sample history cache |
//! | [`ReaderLocator`] | Per-remote-reader delivery endpoint |
//! | [`CacheChange`] | One sample plus its metadata |
//! | [`ReaderHistoryQos`] | History + resource limits consumed at construction |
//!
//! ## Quick Start
//!
//! ```rust
//! use hdds_datapath::{
//!     CacheChange, DataReaderHistory, Guid, History, ReaderHistoryQos, TakeCursorReader,
//! };
//! use std::sync::Arc;
//!
//! let qos = ReaderHistoryQos::new(History::KeepLast(2));
//! let history = DataReaderHistory::new("sensors", "Temperature", qos, false, None)?;
//! history.bind_reader(Arc::new(TakeCursorReader::new(Guid::new([1; 12], [0, 0, 1, 4]))));
//!
//! let writer = Guid::new([2; 12], [0, 0, 1, 3]);
//! for seq in 1..=3 {
//!     history.received_change(Arc::new(CacheChange::alive(writer, seq, vec![0u8; 4])), 0)?;
//! }
//! assert_eq!(history.len(), 2);
//! # Ok::<(), hdds_datapath::Error>(())
//! ```

pub mod core;
mod error;
pub mod history;
pub mod qos;
pub mod transport;
pub mod writer;

pub use crate::core::{
    current_time_ns, CacheChange, ChangeKind, Guid, InstanceHandle, Locator, LocatorList,
    SampleIdentity, SequenceNumber,
};
pub use error::{Error, Result};
pub use history::{
    Admission, DataReaderHistory, Md5KeyExtractor, InstanceInfo, InstanceStateKind, KeyExtractor,
    ReaderBinding, SampleInfo, SampleRejectedReason, SampleStateKind, TakeCursorReader,
    ViewStateKind,
};
pub use qos::{
    DataSharingConfig, History, HistoryAttributes, IntraprocessDelivery, ReaderHistoryQos,
    ResourceLimits, LENGTH_UNLIMITED,
};
pub use writer::{
    DataSharingListener, LocalDomain, LocalReader, ReaderLocator, SyncSender, UdpSyncSender,
};
