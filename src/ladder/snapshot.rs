//! Immutable book snapshots emitted once per flush.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::trace;

use crate::ladder::book::BookLevel;
use crate::ladder::error::LadderError;
use crate::ladder::types::{DirtyLevelChange, Order};

/// Per-price order sequences keyed by price formatted to tick precision.
///
/// String keys keep the serialized mapping deterministic and avoid
/// float-key collisions at the host boundary; orders are ordered by
/// ascending order id (priority ordering is a consumer concern).
pub type OrdersByPrice = BTreeMap<String, Vec<Order>>;

/// A point-in-time view of the book plus the changes since the last flush.
///
/// Produced by value; the engine never retains a reference to an emitted
/// snapshot, so subscribers may keep or ship it freely. Both level arrays
/// are ascending by price; consumers render bids visually reversed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LadderSnapshot {
    /// Highest bid price in the book, if any.
    pub best_bid: Option<f64>,
    /// Lowest ask price in the book, if any.
    pub best_ask: Option<f64>,
    /// Mean of best bid and best ask when both exist.
    pub mid_price: Option<f64>,
    /// Bid levels in the visible window, ascending by price.
    pub bids: Vec<BookLevel>,
    /// Ask levels in the visible window, ascending by price.
    pub asks: Vec<BookLevel>,
    /// Monotonic timestamp taken at flush time (nanoseconds since engine
    /// start; the unit is stable within a process).
    pub timestamp: u64,
    /// Per-price bid orders, present in MBO mode.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bid_orders: Option<OrdersByPrice>,
    /// Per-price ask orders, present in MBO mode.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ask_orders: Option<OrdersByPrice>,
    /// Per-level changes drained in this batch, in enqueue order.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dirty_changes: Option<Vec<DirtyLevelChange>>,
    /// Whether the set of present price levels changed in this batch.
    pub structural_change: bool,
}

impl LadderSnapshot {
    /// Spread (best ask − best bid) when both sides exist.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Total quantity across the visible bid levels.
    pub fn total_bid_quantity(&self) -> i64 {
        let quantity = self.bids.iter().map(|level| level.quantity).sum();
        trace!("total_bid_quantity: {quantity}");
        quantity
    }

    /// Total quantity across the visible ask levels.
    pub fn total_ask_quantity(&self) -> i64 {
        let quantity = self.asks.iter().map(|level| level.quantity).sum();
        trace!("total_ask_quantity: {quantity}");
        quantity
    }

    /// Serialize to the host JSON schema.
    ///
    /// # Errors
    /// Returns [`LadderError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, LadderError> {
        serde_json::to_string(self).map_err(|error| LadderError::Serialization {
            message: error.to_string(),
        })
    }

    /// Deserialize from the host JSON schema.
    ///
    /// # Errors
    /// Returns [`LadderError::Serialization`] if the payload is malformed.
    pub fn from_json(data: &str) -> Result<Self, LadderError> {
        serde_json::from_str(data).map_err(|error| LadderError::Serialization {
            message: error.to_string(),
        })
    }
}

bitflags! {
    /// Selects which optional sections the batcher attaches to snapshots.
    ///
    /// Hosts that drive a plain ladder can skip the per-order maps; replay
    /// tooling usually wants everything.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SnapshotSections: u32 {
        /// Attach the dirty-change list drained in the batch.
        const DIRTY_CHANGES = 1 << 0;

        /// Attach per-price order sequences (MBO mode only).
        const ORDER_DETAIL = 1 << 1;

        /// Attach every optional section.
        const ALL = Self::DIRTY_CHANGES.bits() | Self::ORDER_DETAIL.bits();
    }
}

impl Default for SnapshotSections {
    fn default() -> Self {
        SnapshotSections::ALL
    }
}

/// Format version for checksum-enabled snapshot packages.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Wrapper adding integrity validation to snapshots crossing a host
/// boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPackage {
    /// Schema version for forward compatibility.
    pub version: u32,
    /// Snapshot payload.
    pub snapshot: LadderSnapshot,
    /// Hex-encoded SHA-256 of the serialized snapshot.
    pub checksum: String,
}

impl SnapshotPackage {
    /// Create a package, computing the checksum of the snapshot contents.
    ///
    /// # Errors
    /// Returns [`LadderError::Serialization`] if the snapshot cannot be
    /// encoded for hashing.
    pub fn new(snapshot: LadderSnapshot) -> Result<Self, LadderError> {
        let checksum = Self::compute_checksum(&snapshot)?;

        Ok(Self {
            version: SNAPSHOT_FORMAT_VERSION,
            snapshot,
            checksum,
        })
    }

    /// Serialize the package to JSON.
    ///
    /// # Errors
    /// Returns [`LadderError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, LadderError> {
        serde_json::to_string(self).map_err(|error| LadderError::Serialization {
            message: error.to_string(),
        })
    }

    /// Deserialize a package from JSON.
    ///
    /// # Errors
    /// Returns [`LadderError::Serialization`] if the payload is malformed.
    pub fn from_json(data: &str) -> Result<Self, LadderError> {
        serde_json::from_str(data).map_err(|error| LadderError::Serialization {
            message: error.to_string(),
        })
    }

    /// Validate the version and checksum.
    ///
    /// # Errors
    /// Returns [`LadderError::UnsupportedVersion`] or
    /// [`LadderError::ChecksumMismatch`] on failure.
    pub fn validate(&self) -> Result<(), LadderError> {
        if self.version != SNAPSHOT_FORMAT_VERSION {
            return Err(LadderError::UnsupportedVersion {
                version: self.version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }

        let computed = Self::compute_checksum(&self.snapshot)?;
        if computed != self.checksum {
            return Err(LadderError::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual: computed,
            });
        }

        Ok(())
    }

    /// Consume the package and return the validated snapshot.
    ///
    /// # Errors
    /// Propagates [`Self::validate`] failures.
    pub fn into_snapshot(self) -> Result<LadderSnapshot, LadderError> {
        self.validate()?;
        Ok(self.snapshot)
    }

    fn compute_checksum(snapshot: &LadderSnapshot) -> Result<String, LadderError> {
        let payload =
            serde_json::to_vec(snapshot).map_err(|error| LadderError::Serialization {
                message: error.to_string(),
            })?;

        let mut hasher = Sha256::new();
        hasher.update(payload);

        Ok(format!("{:x}", hasher.finalize()))
    }
}
