// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cache change: one data sample plus the metadata the history needs.

use super::guid::Guid;
use super::current_time_ns;

/// Instance handle for keyed topics (16-byte key hash).
///
/// The all-zero handle is "undefined" (HANDLE_NIL). Handles order
/// lexicographically so instances can be walked in key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InstanceHandle(pub [u8; 16]);

impl InstanceHandle {
    /// Undefined handle.
    pub const NIL: InstanceHandle = InstanceHandle([0u8; 16]);

    /// Create a new instance handle from a key hash.
    pub const fn new(key_hash: [u8; 16]) -> Self {
        Self(key_hash)
    }

    /// Publication handle of a writer (its GUID bytes).
    pub fn from_guid(guid: &Guid) -> Self {
        Self(guid.as_bytes())
    }

    /// Check whether the handle carries a key hash.
    pub fn is_defined(&self) -> bool {
        self.0 != [0u8; 16]
    }

    /// Get the raw key hash bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

/// RTPS sequence number.
pub type SequenceNumber = i64;

/// Identity of a sample across the domain: writer GUID + sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SampleIdentity {
    pub writer_guid: Guid,
    pub sequence_number: SequenceNumber,
}

impl SampleIdentity {
    /// Identity carried by samples that are not replies to anything.
    pub const UNKNOWN: SampleIdentity = SampleIdentity {
        writer_guid: Guid::UNKNOWN,
        sequence_number: 0,
    };

    pub const fn new(writer_guid: Guid, sequence_number: SequenceNumber) -> Self {
        Self {
            writer_guid,
            sequence_number,
        }
    }
}

/// Kind of change (instance lifecycle transition carried by the sample).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeKind {
    /// Regular data sample.
    #[default]
    Alive,
    /// Instance disposed by the writer.
    NotAliveDisposed,
    /// Instance unregistered by the writer.
    NotAliveUnregistered,
    /// Instance disposed and unregistered.
    NotAliveDisposedUnregistered,
}

/// One received sample with its metadata.
///
/// Built by the deserializer, then shared as `Arc<CacheChange>` between the
/// base history and the per-instance partition. Two changes are "the same
/// change" when sequence number and writer GUID match.
#[derive(Debug, Clone)]
pub struct CacheChange {
    pub kind: ChangeKind,
    pub writer_guid: Guid,
    pub instance_handle: InstanceHandle,
    pub sequence_number: SequenceNumber,
    pub payload: Vec<u8>,
    /// Source timestamp (nanoseconds since epoch, writer clock).
    pub source_timestamp_ns: u64,
    /// Reception timestamp (nanoseconds since epoch, local clock).
    pub reception_timestamp_ns: u64,
    /// Request this sample answers (request/reply), `UNKNOWN` otherwise.
    pub related_sample_identity: SampleIdentity,
}

impl CacheChange {
    /// Alive sample without a transmitted key (unkeyed topics, or keyed
    /// topics where the key must be extracted from the payload).
    pub fn alive(writer_guid: Guid, sequence_number: SequenceNumber, payload: Vec<u8>) -> Self {
        let now = current_time_ns();
        Self {
            kind: ChangeKind::Alive,
            writer_guid,
            instance_handle: InstanceHandle::NIL,
            sequence_number,
            payload,
            source_timestamp_ns: now,
            reception_timestamp_ns: now,
            related_sample_identity: SampleIdentity::UNKNOWN,
        }
    }

    /// Set the instance handle transmitted with the sample.
    #[must_use]
    pub fn with_instance(mut self, instance_handle: InstanceHandle) -> Self {
        self.instance_handle = instance_handle;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ChangeKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_related(mut self, related: SampleIdentity) -> Self {
        self.related_sample_identity = related;
        self
    }

    #[must_use]
    pub fn with_source_timestamp(mut self, source_timestamp_ns: u64) -> Self {
        self.source_timestamp_ns = source_timestamp_ns;
        self
    }

    /// Identity of this sample.
    pub fn sample_identity(&self) -> SampleIdentity {
        SampleIdentity::new(self.writer_guid, self.sequence_number)
    }

    /// Content equality used to locate a change inside a history.
    #[inline]
    pub fn same_change(&self, other: &CacheChange) -> bool {
        self.sequence_number == other.sequence_number && self.writer_guid == other.writer_guid
    }
}
