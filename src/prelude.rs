//! Convenience re-exports for the common engine workflow.
//!
//! ```
//! use ladder_rs::prelude::*;
//!
//! let ladder = PriceLadder::new(LadderConfig::default()).unwrap();
//! assert_eq!(ladder.best_bid(), None);
//! ```

pub use crate::ladder::batcher::{BatcherConfig, BatcherMetrics, SnapshotListener, UpdateBatcher};
pub use crate::ladder::book::{BookLevel, OrderBook};
pub use crate::ladder::engine::{LadderConfig, PriceLadder};
pub use crate::ladder::error::LadderError;
pub use crate::ladder::mbo::MboManager;
pub use crate::ladder::snapshot::{LadderSnapshot, SnapshotPackage, SnapshotSections};
pub use crate::ladder::types::{
    DataMode, DirtyLevelChange, Order, OrderUpdate, OrderUpdateKind, PriceLevelUpdate, Side,
};
