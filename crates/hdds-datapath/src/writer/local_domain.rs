// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-local reader registry used for intraprocess delivery.
//!
//! Entries are `Weak`: the registry never keeps a reader alive, its owner
//! does. Lookups lazily prune readers that have been dropped.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

use crate::core::Guid;
use crate::qos::IntraprocessDelivery;

/// A reader living in this process, reachable without any transport.
pub trait LocalReader: Send + Sync {
    fn guid(&self) -> Guid;
    fn datasharing_listener(&self) -> &DataSharingListener;
}

#[derive(Debug, Default)]
struct ListenerCounters {
    notifications: u64,
    same_process: u64,
}

/// "New data available" signal of a reader.
///
/// Counts notifications and wakes threads blocked in [`wait_for`](Self::wait_for).
#[derive(Debug, Default)]
pub struct DataSharingListener {
    counters: Mutex<ListenerCounters>,
    cond: Condvar,
}

impl DataSharingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal new data. `same_process` is set when the writer lives in
    /// this process and skipped shared memory.
    pub fn notify(&self, same_process: bool) {
        let mut counters = self.counters.lock();
        counters.notifications += 1;
        if same_process {
            counters.same_process += 1;
        }
        self.cond.notify_all();
    }

    pub fn notification_count(&self) -> u64 {
        self.counters.lock().notifications
    }

    pub fn same_process_count(&self) -> u64 {
        self.counters.lock().same_process
    }

    /// Block until more than `seen` notifications happened or `timeout`
    /// expires. Returns the current count.
    pub fn wait_for(&self, seen: u64, timeout: Duration) -> u64 {
        let mut counters = self.counters.lock();
        if counters.notifications <= seen {
            // Either outcome is reported through the count below.
            let _ = self
                .cond
                .wait_while_for(&mut counters, |c| c.notifications <= seen, timeout);
        }
        counters.notifications
    }
}

/// Registry of the readers of this process.
pub struct LocalDomain {
    readers: DashMap<Guid, Weak<dyn LocalReader>>,
    intraprocess: IntraprocessDelivery,
}

impl LocalDomain {
    pub fn new(intraprocess: IntraprocessDelivery) -> Self {
        Self {
            readers: DashMap::new(),
            intraprocess,
        }
    }

    pub fn register_reader(&self, reader: Arc<dyn LocalReader>) {
        let guid = reader.guid();
        self.readers.insert(guid, Arc::downgrade(&reader));
        log::debug!("[LocalDomain] registered local reader {}", guid);
    }

    pub fn unregister_reader(&self, guid: &Guid) -> bool {
        self.readers.remove(guid).is_some()
    }

    /// Live local reader with this GUID, if any.
    pub fn find_local_reader(&self, guid: &Guid) -> Option<Arc<dyn LocalReader>> {
        if guid.is_unknown() {
            return None;
        }
        // Guard dropped before any removal (DashMap shard lock).
        let weak = self.readers.get(guid).map(|entry| entry.value().clone())?;
        match weak.upgrade() {
            Some(reader) => Some(reader),
            None => {
                self.readers.remove(guid);
                log::debug!("[LocalDomain] pruned dropped local reader {}", guid);
                None
            }
        }
    }

    /// Whether `writer` should hand data to `reader` directly instead of
    /// through a transport.
    pub fn should_intraprocess_between(&self, writer: &Guid, reader: &Guid) -> bool {
        if self.intraprocess == IntraprocessDelivery::Off {
            return false;
        }
        let local = self.find_local_reader(reader).is_some();
        if local {
            log::trace!("[LocalDomain] {} -> {} is intraprocess", writer, reader);
        }
        local
    }

    pub fn intraprocess(&self) -> IntraprocessDelivery {
        self.intraprocess
    }

    /// Registered readers, dropped ones included until pruned.
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

impl Default for LocalDomain {
    fn default() -> Self {
        Self::new(IntraprocessDelivery::default())
    }
}

impl std::fmt::Debug for LocalDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDomain")
            .field("readers", &self.readers.len())
            .field("intraprocess", &self.intraprocess)
            .finish()
    }
}
