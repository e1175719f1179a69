// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer-side delivery: one [`ReaderLocator`] per matched reader.

mod local_domain;
mod reader_locator;
mod sender;

pub use local_domain::{DataSharingListener, LocalDomain, LocalReader};
pub use reader_locator::{LocatorInfo, ReaderLocator};
pub use sender::{SyncSender, UdpSyncSender};
