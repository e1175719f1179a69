// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DataReaderHistory: QoS-governed sample history of a DataReader.
//!
//! Wraps the base [`ReaderHistory`] with the four admission rules
//! (KEEP_ALL / KEEP_LAST x keyed / unkeyed), the per-instance partition
//! used by keyed topics, and deadline bookkeeping.
//!
//! # Locking
//!
//! Every operation holds a re-entrant lock for its whole duration. The
//! bound reader is allowed to call back into the history while an outer
//! operation holds the lock (e.g. removing the change it just handed out
//! from `get_first_untaken_info`). The `RefCell` inside the lock is never
//! borrowed across such callbacks.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{ReentrantMutex, RwLock};

use super::base::ReaderHistory;
use super::binding::ReaderBinding;
use super::key::KeyExtractor;
use super::sample_info::{SampleInfo, SampleRejectedReason};
use crate::core::{CacheChange, InstanceHandle};
use crate::qos::{History, HistoryAttributes, ReaderHistoryQos, ResourceLimits};
use crate::{Error, Result};

/// Handle of the single implicit instance of an unkeyed topic.
pub const UNKEYED_INSTANCE_HANDLE: InstanceHandle = {
    let mut raw = [0u8; 16];
    raw[0] = 1;
    InstanceHandle::new(raw)
};

/// Admission rule, fixed at construction from (keyed, history kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdmissionRule {
    KeepAllNoKey,
    KeepLastNoKey(usize),
    KeepAllWithKey,
    KeepLastWithKey(usize),
}

impl AdmissionRule {
    fn select(history: History, keyed: bool) -> Self {
        match (history, keyed) {
            (History::KeepAll, false) => Self::KeepAllNoKey,
            (History::KeepAll, true) => Self::KeepAllWithKey,
            (History::KeepLast(depth), false) => Self::KeepLastNoKey(depth as usize),
            (History::KeepLast(depth), true) => Self::KeepLastWithKey(depth as usize),
        }
    }
}

#[derive(Debug, Default)]
struct Instance {
    /// Reception order, oldest first.
    changes: Vec<Arc<CacheChange>>,
    next_deadline: Option<Instant>,
}

#[derive(Debug)]
struct HistoryState {
    base: ReaderHistory,
    instances: BTreeMap<InstanceHandle, Instance>,
    /// Deadline of the whole cache (unkeyed topics).
    next_deadline: Option<Instant>,
    /// Full-history guard: set once `maximum_reserved_caches` is reached.
    is_full: bool,
}

/// Outcome of a successful admission.
#[derive(Debug, Clone, Default)]
pub struct Admission {
    /// Change dropped to make room (KEEP_LAST only).
    pub evicted: Option<Arc<CacheChange>>,
}

/// Snapshot of one instance returned by [`DataReaderHistory::lookup_instance`].
#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub handle: InstanceHandle,
    pub changes: Vec<Arc<CacheChange>>,
}

/// Sample history cache of a DataReader.
///
/// # Example
///
/// ```rust
/// use hdds_datapath::{
///     CacheChange, DataReaderHistory, Error, Guid, History, InstanceHandle, ReaderHistoryQos,
///     ResourceLimits, TakeCursorReader,
/// };
/// use std::sync::Arc;
///
/// let qos = ReaderHistoryQos::new(History::KeepAll).with_limits(ResourceLimits {
///     max_samples_per_instance: 1,
///     ..Default::default()
/// });
/// let history = DataReaderHistory::new("robots", "Pose", qos, true, None)?;
/// history.bind_reader(Arc::new(TakeCursorReader::new(Guid::new([1; 12], [0, 0, 1, 7]))));
///
/// let writer = Guid::new([2; 12], [0, 0, 1, 2]);
/// let key = InstanceHandle::new([0xA; 16]);
/// history.received_change(Arc::new(CacheChange::alive(writer, 1, vec![]).with_instance(key)), 0)?;
/// let second = history.received_change(Arc::new(CacheChange::alive(writer, 2, vec![]).with_instance(key)), 0);
/// assert!(matches!(second, Err(Error::ResourceLimitExceeded(_))));
/// # Ok::<(), Error>(())
/// ```
pub struct DataReaderHistory {
    topic_name: String,
    type_name: String,
    keyed: bool,
    rule: AdmissionRule,
    limits: ResourceLimits,
    key_extractor: Option<Arc<dyn KeyExtractor>>,
    binding: RwLock<Option<Arc<dyn ReaderBinding>>>,
    state: ReentrantMutex<RefCell<HistoryState>>,
}

impl DataReaderHistory {
    /// Build a history for a topic.
    ///
    /// `key_extractor` is consulted for keyed changes that arrive without an
    /// instance handle; without one such changes are rejected.
    pub fn new(
        topic_name: impl Into<String>,
        type_name: impl Into<String>,
        qos: ReaderHistoryQos,
        keyed: bool,
        key_extractor: Option<Arc<dyn KeyExtractor>>,
    ) -> Result<Self> {
        qos.validate()?;
        let attributes = HistoryAttributes::from_qos(&qos, keyed);

        Ok(Self {
            topic_name: topic_name.into(),
            type_name: type_name.into(),
            keyed,
            rule: AdmissionRule::select(qos.history, keyed),
            limits: qos.resource_limits.normalized(),
            key_extractor,
            binding: RwLock::new(None),
            state: ReentrantMutex::new(RefCell::new(HistoryState {
                base: ReaderHistory::new(attributes),
                instances: BTreeMap::new(),
                next_deadline: None,
                is_full: false,
            })),
        })
    }

    /// Attach the reader that owns this history.
    pub fn bind_reader(&self, reader: Arc<dyn ReaderBinding>) {
        log::debug!(
            "[DataReaderHistory] topic={} bound to reader {}",
            self.topic_name,
            reader.guid()
        );
        *self.binding.write() = Some(reader);
    }

    /// Detach the reader; later operations fail with [`Error::Unbound`].
    pub fn unbind_reader(&self) -> Option<Arc<dyn ReaderBinding>> {
        self.binding.write().take()
    }

    fn bound_reader(&self, operation: &str) -> Result<Arc<dyn ReaderBinding>> {
        match self.binding.read().as_ref() {
            Some(reader) => Ok(Arc::clone(reader)),
            None => {
                log::error!(
                    "[DataReaderHistory::{}] You need to create a Reader with this History before using it",
                    operation
                );
                Err(Error::Unbound)
            }
        }
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Admit a change received from the transport.
    ///
    /// `unknown_missing` counts changes known to exist upstream but not yet
    /// received; KEEP_ALL unkeyed admission reserves room for them.
    pub fn received_change(
        &self,
        mut change: Arc<CacheChange>,
        unknown_missing: usize,
    ) -> Result<Admission> {
        let reader = self.bound_reader("received_change")?;
        let guard = self.state.lock();

        match self.rule {
            AdmissionRule::KeepAllNoKey => {
                let mut state = guard.borrow_mut();
                if state.base.len().saturating_add(unknown_missing) < self.limits.max_samples {
                    self.add_received_change(&mut state, change, None)
                } else {
                    log::warn!(
                        "[DataReaderHistory] topic={} change {} rejected: max_samples ({}) reached",
                        self.topic_name,
                        change.sequence_number,
                        self.limits.max_samples
                    );
                    Err(Error::ResourceLimitExceeded(
                        SampleRejectedReason::ResourceLimit,
                    ))
                }
            }
            AdmissionRule::KeepLastNoKey(depth) => {
                let mut state = guard.borrow_mut();
                let mut evicted = None;
                if state.base.len() >= depth {
                    // Reception order is presentation order: the oldest is first.
                    if let Some(oldest) = state.base.first().cloned() {
                        evicted = Some(self.remove_change_nts(&mut state, &oldest)?);
                    }
                }
                self.add_received_change(&mut state, change, evicted)
            }
            AdmissionRule::KeepAllWithKey => {
                let handle = self.resolve_instance_handle(&mut change, reader.is_key_protected())?;
                let mut state = guard.borrow_mut();
                let handle = self.find_key_nts(&mut state, handle)?;

                let size = state.instances.get(&handle).map_or(0, |i| i.changes.len());
                if size < self.limits.max_samples_per_instance {
                    self.add_received_change_with_key(&mut state, handle, change, None)
                } else {
                    log::warn!(
                        "[DataReaderHistory] topic={} change {} not added due to maximum number of samples per instance",
                        self.topic_name,
                        change.sequence_number
                    );
                    Err(Error::ResourceLimitExceeded(
                        SampleRejectedReason::SamplesPerInstanceLimit,
                    ))
                }
            }
            AdmissionRule::KeepLastWithKey(depth) => {
                let handle = self.resolve_instance_handle(&mut change, reader.is_key_protected())?;
                let mut state = guard.borrow_mut();
                let handle = self.find_key_nts(&mut state, handle)?;

                let oldest = state
                    .instances
                    .get(&handle)
                    .filter(|i| i.changes.len() >= depth)
                    .and_then(|i| i.changes.first().cloned());
                let evicted = match oldest {
                    Some(oldest) => Some(self.remove_change_nts(&mut state, &oldest)?),
                    None => None,
                };
                self.add_received_change_with_key(&mut state, handle, change, evicted)
            }
        }
    }

    /// Instance handle of a keyed change, extracting it from the payload
    /// when the writer did not send one.
    fn resolve_instance_handle(
        &self,
        change: &mut Arc<CacheChange>,
        key_protected: bool,
    ) -> Result<InstanceHandle> {
        if change.instance_handle.is_defined() {
            return Ok(change.instance_handle);
        }

        let handle = self
            .key_extractor
            .as_ref()
            .and_then(|extractor| extractor.compute_key(&change.payload, key_protected))
            .filter(InstanceHandle::is_defined);

        match handle {
            Some(handle) => {
                Arc::make_mut(change).instance_handle = handle;
                Ok(handle)
            }
            None => {
                log::warn!(
                    "[DataReaderHistory] topic={} change {} dropped: no instance handle and key extraction failed",
                    self.topic_name,
                    change.sequence_number
                );
                Err(Error::KeyResolution(format!(
                    "change {} from {} carries no key",
                    change.sequence_number, change.writer_guid
                )))
            }
        }
    }

    fn add_received_change(
        &self,
        state: &mut HistoryState,
        change: Arc<CacheChange>,
        evicted: Option<Arc<CacheChange>>,
    ) -> Result<Admission> {
        if state.is_full {
            log::warn!(
                "[DataReaderHistory] Attempting to add Data to Full ReaderHistory: {}",
                self.type_name
            );
            return Err(Error::HistoryFull);
        }

        if !state.base.add_change(Arc::clone(&change)) {
            state.is_full = true;
            return Err(Error::HistoryFull);
        }
        if state.base.is_at_capacity() {
            state.is_full = true;
        }

        log::debug!(
            "[DataReaderHistory] {}: Change {} added from: {}",
            self.type_name,
            change.sequence_number,
            change.writer_guid
        );
        Ok(Admission { evicted })
    }

    fn add_received_change_with_key(
        &self,
        state: &mut HistoryState,
        handle: InstanceHandle,
        change: Arc<CacheChange>,
        evicted: Option<Arc<CacheChange>>,
    ) -> Result<Admission> {
        let admission = self.add_received_change(state, Arc::clone(&change), evicted)?;
        if let Some(instance) = state.instances.get_mut(&handle) {
            instance.changes.push(change);
        }
        Ok(admission)
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Resolve the instance of `handle`, creating it if a slot is available.
    ///
    /// At `max_instances`, the first empty instance is reclaimed for the new
    /// key. Unkeyed histories always resolve to the implicit instance.
    pub fn find_key(&self, handle: InstanceHandle) -> Result<InstanceHandle> {
        self.bound_reader("find_key")?;
        if !self.keyed {
            return Ok(UNKEYED_INSTANCE_HANDLE);
        }
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        self.find_key_nts(&mut state, handle)
    }

    fn find_key_nts(
        &self,
        state: &mut HistoryState,
        handle: InstanceHandle,
    ) -> Result<InstanceHandle> {
        if state.instances.contains_key(&handle) {
            return Ok(handle);
        }

        if state.instances.len() < self.limits.max_instances {
            state.instances.insert(handle, Instance::default());
            return Ok(handle);
        }

        let reclaimable = state
            .instances
            .iter()
            .find(|(_, instance)| instance.changes.is_empty())
            .map(|(h, _)| *h);

        match reclaimable {
            Some(empty) => {
                state.instances.remove(&empty);
                state.instances.insert(handle, Instance::default());
                log::debug!(
                    "[DataReaderHistory] topic={} reclaimed empty instance slot for new key",
                    self.topic_name
                );
                Ok(handle)
            }
            None => {
                log::warn!(
                    "[DataReaderHistory] topic={} new instance rejected: max_instances ({}) reached",
                    self.topic_name,
                    self.limits.max_instances
                );
                Err(Error::KeyResolution(format!(
                    "max_instances ({}) reached and no instance is empty",
                    self.limits.max_instances
                )))
            }
        }
    }

    /// Look up an instance.
    ///
    /// Keyed: `exact` finds `handle` itself, otherwise the first instance
    /// strictly greater than `handle`. Unkeyed: only `(NIL, exact=false)`
    /// matches, returning the implicit instance holding every change.
    pub fn lookup_instance(&self, handle: InstanceHandle, exact: bool) -> Option<InstanceInfo> {
        let guard = self.state.lock();
        let state = guard.borrow();

        if !self.keyed {
            if handle.is_defined() || exact {
                return None;
            }
            return Some(InstanceInfo {
                handle: UNKEYED_INSTANCE_HANDLE,
                changes: state.base.as_slice().to_vec(),
            });
        }

        let found = if exact {
            state.instances.get_key_value(&handle)
        } else {
            state
                .instances
                .range((Bound::Excluded(handle), Bound::Unbounded))
                .next()
        };

        found.map(|(handle, instance)| InstanceInfo {
            handle: *handle,
            changes: instance.changes.clone(),
        })
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Remove a change (located by sequence number + writer) from the
    /// history and its instance. Resets the full-history guard.
    pub fn remove_change_sub(&self, change: &CacheChange) -> Result<()> {
        self.bound_reader("remove_change_sub")?;
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        self.remove_change_nts(&mut state, change).map(|_| ())
    }

    /// Remove a change while the caller iterates with `cursor`.
    ///
    /// Keyed histories: `cursor` indexes the change's instance and must point
    /// at the removed change. Unkeyed histories: `cursor` indexes the base
    /// history. Either way it is left on the element that followed the
    /// removed one.
    pub fn remove_change_sub_at(&self, change: &CacheChange, cursor: &mut usize) -> Result<()> {
        self.bound_reader("remove_change_sub")?;
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let Some(index) = state.base.find_change(change) else {
            log::debug!(
                "[DataReaderHistory] topic={} trying to remove a change not in history",
                self.topic_name
            );
            return Err(Error::NotFound);
        };

        if self.keyed {
            let handle = state
                .base
                .get(index)
                .map_or(change.instance_handle, |stored| stored.instance_handle);
            let position = state
                .instances
                .get(&handle)
                .and_then(|instance| instance.changes.iter().position(|c| c.same_change(change)));
            if let Some(position) = position {
                debug_assert_eq!(*cursor, position, "cursor must point at the removed change");
                *cursor = position;
            }
        } else {
            *cursor = index;
        }

        self.remove_at_nts(&mut state, index).map(|_| ())
    }

    /// Remove the change at `index` of the base history, cleaning its
    /// instance partition as well.
    pub fn remove_change_at(&self, index: usize) -> Result<Arc<CacheChange>> {
        self.bound_reader("remove_change_at")?;
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        self.remove_at_nts(&mut state, index)
    }

    fn remove_change_nts(
        &self,
        state: &mut HistoryState,
        change: &CacheChange,
    ) -> Result<Arc<CacheChange>> {
        match state.base.find_change(change) {
            Some(index) => self.remove_at_nts(state, index),
            None => {
                if self.keyed {
                    log::error!(
                        "[DataReaderHistory] Change not found on this key, something is wrong"
                    );
                }
                log::debug!(
                    "[DataReaderHistory] topic={} trying to remove a change not in history",
                    self.topic_name
                );
                Err(Error::NotFound)
            }
        }
    }

    fn remove_at_nts(&self, state: &mut HistoryState, index: usize) -> Result<Arc<CacheChange>> {
        let removed = state.base.remove_at(index).ok_or(Error::NotFound)?;

        if self.keyed {
            let detached = state
                .instances
                .get_mut(&removed.instance_handle)
                .and_then(|instance| {
                    let position = instance.changes.iter().position(|c| c.same_change(&removed))?;
                    Some(instance.changes.remove(position))
                });
            if detached.is_none() {
                log::error!(
                    "[DataReaderHistory] Change not found on this key, something is wrong"
                );
            }
        }

        state.is_full = false;
        Ok(removed)
    }

    // ========================================================================
    // Deadlines
    // ========================================================================

    /// Set the next deadline of an instance (or of the whole cache when unkeyed).
    pub fn set_next_deadline(&self, handle: InstanceHandle, deadline: Instant) -> Result<()> {
        self.bound_reader("set_next_deadline")?;
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        if !self.keyed {
            state.next_deadline = Some(deadline);
            return Ok(());
        }

        let instance = state.instances.get_mut(&handle).ok_or(Error::NotFound)?;
        instance.next_deadline = Some(deadline);
        Ok(())
    }

    /// Instance with the earliest deadline, and that deadline.
    ///
    /// Instances with no deadline set sort after every set one.
    pub fn get_next_deadline(&self) -> Result<(InstanceHandle, Option<Instant>)> {
        self.bound_reader("get_next_deadline")?;
        let guard = self.state.lock();
        let state = guard.borrow();

        if !self.keyed {
            return Ok((UNKEYED_INSTANCE_HANDLE, state.next_deadline));
        }

        state
            .instances
            .iter()
            .min_by_key(|(_, instance)| (instance.next_deadline.is_none(), instance.next_deadline))
            .map(|(handle, instance)| (*handle, instance.next_deadline))
            .ok_or(Error::NoInstances)
    }

    // ========================================================================
    // Take path
    // ========================================================================

    /// Info of the oldest untaken change, which the bound reader then takes.
    ///
    /// Returns `Ok(None)` when nothing is left to take.
    pub fn get_first_untaken_info(&self) -> Result<Option<SampleInfo>> {
        let reader = self.bound_reader("get_first_untaken_info")?;
        // Held across the reader callbacks; they re-enter the lock.
        let _guard = self.state.lock();

        let Some(change) = reader.next_untaken(self) else {
            return Ok(None);
        };
        let info = SampleInfo::from_change(&change);
        reader.change_read_by_user(self, &change, false);
        Ok(Some(info))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Snapshot of the changes in reception order.
    pub fn changes(&self) -> Vec<Arc<CacheChange>> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.base.as_slice().to_vec()
    }

    pub fn first_change(&self) -> Option<Arc<CacheChange>> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.base.first().cloned()
    }

    pub fn len(&self) -> usize {
        let guard = self.state.lock();
        let len = guard.borrow().base.len();
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of instance records, empty ones included.
    pub fn instance_count(&self) -> usize {
        let guard = self.state.lock();
        let count = guard.borrow().instances.len();
        count
    }

    /// Whether the full-history guard is currently set.
    pub fn is_full(&self) -> bool {
        let guard = self.state.lock();
        let full = guard.borrow().is_full;
        full
    }

    pub fn attributes(&self) -> HistoryAttributes {
        let guard = self.state.lock();
        let attributes = guard.borrow().base.attributes();
        attributes
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn has_keys(&self) -> bool {
        self.keyed
    }
}

impl std::fmt::Debug for DataReaderHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataReaderHistory")
            .field("topic_name", &self.topic_name)
            .field("type_name", &self.type_name)
            .field("rule", &self.rule)
            .field("limits", &self.limits)
            .field("bound", &self.binding.read().is_some())
            .finish_non_exhaustive()
    }
}
