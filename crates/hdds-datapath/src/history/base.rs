// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Base reader history: ordered, capacity-bounded store of received changes.
//!
//! Not synchronized; `DataReaderHistory` owns it behind its lock.

use std::sync::Arc;

use crate::core::CacheChange;
use crate::qos::HistoryAttributes;

/// Upper bound on slots reserved eagerly, whatever `initial_reserved_caches` says.
const MAX_EAGER_RESERVE: usize = 4096;

/// Ordered sequence of changes in reception order (oldest first).
#[derive(Debug)]
pub struct ReaderHistory {
    changes: Vec<Arc<CacheChange>>,
    attributes: HistoryAttributes,
}

impl ReaderHistory {
    pub fn new(attributes: HistoryAttributes) -> Self {
        let reserve = attributes
            .initial_reserved_caches
            .min(attributes.maximum_reserved_caches)
            .min(MAX_EAGER_RESERVE);
        Self {
            changes: Vec::with_capacity(reserve),
            attributes,
        }
    }

    /// Append a change. Fails when the history holds `maximum_reserved_caches` changes.
    pub fn add_change(&mut self, change: Arc<CacheChange>) -> bool {
        if self.is_at_capacity() {
            return false;
        }
        self.changes.push(change);
        true
    }

    /// Position of the change with the same sequence number and writer.
    pub fn find_change(&self, change: &CacheChange) -> Option<usize> {
        self.changes.iter().position(|c| c.same_change(change))
    }

    /// Remove the change at `index`; later changes shift down by one.
    pub fn remove_at(&mut self, index: usize) -> Option<Arc<CacheChange>> {
        if index < self.changes.len() {
            Some(self.changes.remove(index))
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&Arc<CacheChange>> {
        self.changes.get(index)
    }

    pub fn first(&self) -> Option<&Arc<CacheChange>> {
        self.changes.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<CacheChange>> {
        self.changes.iter()
    }

    pub fn as_slice(&self) -> &[Arc<CacheChange>] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn is_at_capacity(&self) -> bool {
        self.changes.len() >= self.attributes.maximum_reserved_caches
    }

    pub fn attributes(&self) -> HistoryAttributes {
        self.attributes
    }
}
