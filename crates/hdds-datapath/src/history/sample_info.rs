// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SampleInfo handed to the application alongside each taken sample.

use crate::core::{CacheChange, ChangeKind, InstanceHandle, SampleIdentity};

/// Sample state per DDS spec (NOT_READ vs READ).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStateKind {
    Read,
    NotRead,
}

/// View state per DDS spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStateKind {
    New,
    NotNew,
}

/// Instance state per DDS spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStateKind {
    Alive,
    NotAliveDisposed,
    NotAliveNoWriters,
}

/// Reason why a sample was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleRejectedReason {
    /// Sample was not rejected.
    #[default]
    NotRejected,
    /// Sample rejected due to resource limits (max_samples).
    ResourceLimit,
    /// Sample rejected due to instance limits (max_instances).
    InstanceLimit,
    /// Sample rejected due to samples-per-instance limit.
    SamplesPerInstanceLimit,
}

/// Read-only metadata of a taken sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleInfo {
    pub sample_state: SampleStateKind,
    pub view_state: ViewStateKind,
    pub instance_state: InstanceStateKind,
    pub disposed_generation_count: i32,
    pub no_writers_generation_count: i32,
    pub sample_rank: i32,
    pub generation_rank: i32,
    pub absolute_generation_rank: i32,
    pub source_timestamp_ns: u64,
    pub reception_timestamp_ns: u64,
    pub instance_handle: InstanceHandle,
    /// Handle of the writer that published the sample.
    pub publication_handle: InstanceHandle,
    pub sample_identity: SampleIdentity,
    pub related_sample_identity: SampleIdentity,
    /// False for samples that only carry an instance state change.
    pub valid_data: bool,
}

impl SampleInfo {
    /// Build the info record for a change about to be handed to the application.
    ///
    /// Generation counters and ranks are not tracked per instance yet, so
    /// they report the values of a first-generation sample.
    pub fn from_change(change: &CacheChange) -> Self {
        // Unregistered kinds are not modeled as NOT_ALIVE_NO_WRITERS yet and
        // report ALIVE.
        let instance_state = match change.kind {
            ChangeKind::Alive => InstanceStateKind::Alive,
            ChangeKind::NotAliveDisposed => InstanceStateKind::NotAliveDisposed,
            _ => InstanceStateKind::Alive,
        };

        Self {
            sample_state: SampleStateKind::NotRead,
            view_state: ViewStateKind::NotNew,
            instance_state,
            disposed_generation_count: 0,
            no_writers_generation_count: 1,
            sample_rank: 0,
            generation_rank: 0,
            absolute_generation_rank: 0,
            source_timestamp_ns: change.source_timestamp_ns,
            reception_timestamp_ns: change.reception_timestamp_ns,
            instance_handle: change.instance_handle,
            publication_handle: InstanceHandle::from_guid(&change.writer_guid),
            sample_identity: change.sample_identity(),
            related_sample_identity: change.related_sample_identity,
            valid_data: change.kind == ChangeKind::Alive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Guid;

    fn change(kind: ChangeKind) -> CacheChange {
        CacheChange::alive(Guid::new([4; 12], [0, 0, 1, 2]), 11, vec![1, 2])
            .with_kind(kind)
            .with_source_timestamp(1_000)
    }

    #[test]
    fn test_alive_sample_info() {
        let c = change(ChangeKind::Alive);
        let info = SampleInfo::from_change(&c);
        assert!(info.valid_data);
        assert_eq!(info.instance_state, InstanceStateKind::Alive);
        assert_eq!(info.sample_state, SampleStateKind::NotRead);
        assert_eq!(info.view_state, ViewStateKind::NotNew);
        assert_eq!(info.no_writers_generation_count, 1);
        assert_eq!(info.source_timestamp_ns, 1_000);
        assert_eq!(info.sample_identity, SampleIdentity::new(c.writer_guid, 11));
        assert_eq!(info.publication_handle.0, c.writer_guid.as_bytes());
    }

    #[test]
    fn test_disposed_sample_info() {
        let info = SampleInfo::from_change(&change(ChangeKind::NotAliveDisposed));
        assert!(!info.valid_data);
        assert_eq!(info.instance_state, InstanceStateKind::NotAliveDisposed);
    }

    #[test]
    fn test_unregistered_maps_to_alive() {
        for kind in [
            ChangeKind::NotAliveUnregistered,
            ChangeKind::NotAliveDisposedUnregistered,
        ] {
            let info = SampleInfo::from_change(&change(kind));
            assert!(!info.valid_data);
            assert_eq!(info.instance_state, InstanceStateKind::Alive);
        }
    }

    #[test]
    fn test_related_identity_copied() {
        let request = SampleIdentity::new(Guid::new([5; 12], [0, 0, 3, 3]), 77);
        let c = change(ChangeKind::Alive).with_related(request);
        assert_eq!(SampleInfo::from_change(&c).related_sample_identity, request);
    }
}
