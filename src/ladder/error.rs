//! Ladder engine error types.

use crate::ladder::types::DataMode;
use thiserror::Error;

/// Errors surfaced by the ladder engine.
///
/// The engine keeps most failure modes local and silent by design (unknown
/// order ids, absent levels, short frames); only construction faults and
/// mode violations reach the caller as errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LadderError {
    /// Tick size is not a finite positive number.
    #[error("invalid tick size: {size} (must be finite and > 0)")]
    InvalidTickSize {
        /// The rejected tick size.
        size: f64,
    },

    /// Queue capacity is not a power of two, or is below the minimum of 2.
    #[error("invalid queue capacity: {capacity} (must be a power of two >= 2)")]
    InvalidQueueCapacity {
        /// The rejected capacity.
        capacity: usize,
    },

    /// An ingestion entry point was invoked while the engine was in the
    /// other data mode. Recoverable: the engine state is untouched.
    #[error("mode violation: engine is in {actual} mode, operation requires {required}")]
    ModeViolation {
        /// Mode the operation requires.
        required: DataMode,
        /// Mode the engine is currently in.
        actual: DataMode,
    },

    /// Snapshot (de)serialization failed at the host boundary.
    #[error("snapshot serialization error: {message}")]
    Serialization {
        /// Underlying error message.
        message: String,
    },

    /// Snapshot package integrity check failed.
    #[error("snapshot checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch {
        /// Checksum carried by the package.
        expected: String,
        /// Checksum computed from the payload.
        actual: String,
    },

    /// Snapshot package version is not supported by this build.
    #[error("unsupported snapshot version: {version} (expected {expected})")]
    UnsupportedVersion {
        /// Version carried by the package.
        version: u32,
        /// Version this build understands.
        expected: u32,
    },
}
