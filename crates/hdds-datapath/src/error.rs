// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use crate::history::SampleRejectedReason;
use crate::transport::shm::ShmError;

/// Errors returned by data path operations.
///
/// Rejections are ordinary outcomes of QoS enforcement: the sample is
/// dropped and the reliability layer decides whether to ask for it again.
///
/// # Example
///
/// ```rust
/// use hdds_datapath::{Error, SampleRejectedReason};
///
/// let err = Error::ResourceLimitExceeded(SampleRejectedReason::SamplesPerInstanceLimit);
/// assert!(err.is_rejection());
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // State Errors
    // ========================================================================
    /// History used before a reader was bound to it.
    Unbound,
    /// `start()` called on an endpoint that already tracks a remote reader.
    AlreadyBound,

    // ========================================================================
    // Admission Errors
    // ========================================================================
    /// A resource limit would be exceeded and no eviction applies.
    ResourceLimitExceeded(SampleRejectedReason),
    /// History reached `maximum_reserved_caches`.
    HistoryFull,
    /// The change has no usable instance handle or no instance slot is free.
    KeyResolution(String),

    // ========================================================================
    // Consistency Errors
    // ========================================================================
    /// Change (or instance) not present in the history.
    NotFound,
    /// Keyed history has no instance to report.
    NoInstances,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// QoS policy is invalid.
    InvalidQos(String),
    /// Configuration file not found at specified path.
    ConfigFileNotFound(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// I/O error with underlying cause.
    IoError(std::io::Error),
    /// Shared memory notification failure.
    Shm(ShmError),
    /// Synchronous send did not complete before its deadline.
    SendFailed(String),
}

impl Error {
    /// True for non-fatal admission rejections (sample dropped, retry possible).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::ResourceLimitExceeded(_) | Error::HistoryFull | Error::KeyResolution(_)
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Unbound => write!(f, "History is not bound to a reader"),
            Error::AlreadyBound => write!(f, "Endpoint already bound to a remote reader"),
            Error::ResourceLimitExceeded(reason) => {
                write!(f, "Resource limit exceeded: {:?}", reason)
            }
            Error::HistoryFull => write!(f, "Reader history is full"),
            Error::KeyResolution(msg) => write!(f, "Key resolution failed: {}", msg),
            Error::NotFound => write!(f, "Change not found in history"),
            Error::NoInstances => write!(f, "History holds no instances"),
            Error::InvalidQos(msg) => write!(f, "Invalid QoS: {}", msg),
            Error::ConfigFileNotFound(path) => write!(f, "Config file not found: {}", path),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::Shm(e) => write!(f, "Shared memory error: {}", e),
            Error::SendFailed(msg) => write!(f, "Send failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::Shm(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}

impl From<ShmError> for Error {
    fn from(e: ShmError) -> Self {
        Error::Shm(e)
    }
}

/// Convenient alias for results using the crate `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
