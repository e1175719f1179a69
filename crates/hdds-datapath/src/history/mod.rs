// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader-side sample history.
//!
//! [`DataReaderHistory`] decides which received changes a DataReader keeps:
//!
//! | keyed | history | admission |
//! |-------|---------|-----------|
//! | no  | KEEP_ALL     | while `len + unknown_missing < max_samples` |
//! | no  | KEEP_LAST(d) | evict the oldest change once `len == d` |
//! | yes | KEEP_ALL     | while the instance holds `< max_samples_per_instance` |
//! | yes | KEEP_LAST(d) | evict the instance's oldest change once it holds `d` |
//!
//! Whatever the rule, nothing is admitted while the history sits at
//! `maximum_reserved_caches` (see [`HistoryAttributes`](crate::HistoryAttributes)).

mod base;
mod binding;
mod data_reader;
mod key;
mod sample_info;


pub use base::ReaderHistory;
pub use binding::{ReaderBinding, TakeCursorReader};
pub use data_reader::{Admission, DataReaderHistory, InstanceInfo, UNKEYED_INSTANCE_HANDLE};
pub use key::{Md5KeyExtractor, KeyExtractor};
pub use sample_info::{
    InstanceStateKind, SampleInfo, SampleRejectedReason, SampleStateKind, ViewStateKind,
};
