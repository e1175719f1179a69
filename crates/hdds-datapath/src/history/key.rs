// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Instance key extraction for changes received without a key hash.

use crate::core::InstanceHandle;

/// Derives the instance handle of a keyed sample from its serialized payload.
///
/// Used when the remote writer did not transmit a key hash inline.
/// `key_protected` is set when the reader's security attributes protect
/// the key; implementations must then hash the key even if it would fit
/// in 16 bytes.
pub trait KeyExtractor: Send + Sync {
    fn compute_key(&self, payload: &[u8], key_protected: bool) -> Option<InstanceHandle>;
}

impl<F> KeyExtractor for F
where
    F: Fn(&[u8], bool) -> Option<InstanceHandle> + Send + Sync,
{
    fn compute_key(&self, payload: &[u8], key_protected: bool) -> Option<InstanceHandle> {
        self(payload, key_protected)
    }
}

/// Key extractor for types whose @key members are serialized first.
///
/// The first `key_len` payload bytes (after the 4-byte encapsulation
/// header) are the key. Keys up to 16 bytes are used verbatim unless the
/// key is protected; longer keys are hashed with MD5, the RTPS key hash,
/// so locally computed handles match the ones writers send inline.
#[derive(Debug, Clone, Copy)]
pub struct Md5KeyExtractor {
    key_len: usize,
}

/// Size of the CDR encapsulation header preceding serialized data.
const ENCAPSULATION_HEADER_LEN: usize = 4;

impl Md5KeyExtractor {
    pub fn new(key_len: usize) -> Self {
        Self { key_len }
    }

    fn md5_key_hash(key: &[u8]) -> [u8; 16] {
        use md5::{Digest, Md5};
        let mut hasher = Md5::new();
        hasher.update(key);
        let mut hash = [0u8; 16];
        hash.copy_from_slice(&hasher.finalize());
        hash
    }
}

impl KeyExtractor for Md5KeyExtractor {
    fn compute_key(&self, payload: &[u8], key_protected: bool) -> Option<InstanceHandle> {
        if self.key_len == 0 {
            return None;
        }
        let end = ENCAPSULATION_HEADER_LEN.checked_add(self.key_len)?;
        let key = payload.get(ENCAPSULATION_HEADER_LEN..end)?;

        if key.len() <= 16 && !key_protected {
            let mut raw = [0u8; 16];
            raw[..key.len()].copy_from_slice(key);
            return Some(InstanceHandle::new(raw));
        }
        Some(InstanceHandle::new(Self::md5_key_hash(key)))
    }
}
