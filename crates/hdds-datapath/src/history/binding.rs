// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader side of the history: the object a `DataReaderHistory` is bound to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::DataReaderHistory;
use crate::core::{CacheChange, Guid};

/// Reader owning a [`DataReaderHistory`].
///
/// Callbacks run while the history lock is held and may call back into
/// the history (the lock is re-entrant).
pub trait ReaderBinding: Send + Sync {
    fn guid(&self) -> Guid;

    /// Oldest change the application has not taken yet.
    fn next_untaken(&self, history: &DataReaderHistory) -> Option<Arc<CacheChange>>;

    /// Called once the application has been handed `change`.
    fn change_read_by_user(
        &self,
        history: &DataReaderHistory,
        change: &Arc<CacheChange>,
        mark_as_read: bool,
    );

    /// Whether security plugins protect the key of this reader's topic.
    fn is_key_protected(&self) -> bool {
        false
    }
}

/// Take-only reader: every change handed out is removed from the history.
#[derive(Debug)]
pub struct TakeCursorReader {
    guid: Guid,
    key_protected: bool,
    taken: AtomicU64,
}

impl TakeCursorReader {
    pub fn new(guid: Guid) -> Self {
        Self {
            guid,
            key_protected: false,
            taken: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_key_protection(mut self, key_protected: bool) -> Self {
        self.key_protected = key_protected;
        self
    }

    /// Changes taken so far.
    pub fn taken_count(&self) -> u64 {
        self.taken.load(Ordering::Relaxed)
    }
}

impl ReaderBinding for TakeCursorReader {
    fn guid(&self) -> Guid {
        self.guid
    }

    fn next_untaken(&self, history: &DataReaderHistory) -> Option<Arc<CacheChange>> {
        history.first_change()
    }

    fn change_read_by_user(
        &self,
        history: &DataReaderHistory,
        change: &Arc<CacheChange>,
        _mark_as_read: bool,
    ) {
        match history.remove_change_sub(change) {
            Ok(()) => {
                self.taken.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                log::warn!(
                    "[TakeCursorReader] reader={} failed to take change {}: {}",
                    self.guid,
                    change.sequence_number,
                    e
                );
            }
        }
    }

    fn is_key_protected(&self) -> bool {
        self.key_protected
    }
}
