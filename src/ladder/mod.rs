//! The price-ladder engine: book, order tracking, batching and snapshots.

pub mod batcher;
pub mod book;
pub mod bridge;
pub mod engine;
pub mod error;
pub mod mbo;
pub mod snapshot;
pub mod sorted_map;
pub mod spsc;
pub mod tick;
pub mod types;
pub mod wire;

mod tests;

pub use batcher::{BatcherConfig, BatcherMetrics, BatcherStats, SnapshotListener, UpdateBatcher};
pub use book::{BookLevel, OrderBook};
pub use engine::{LadderConfig, PriceLadder};
pub use error::LadderError;
pub use mbo::{MboManager, OrderLevel};
pub use snapshot::{
    LadderSnapshot, OrdersByPrice, SNAPSHOT_FORMAT_VERSION, SnapshotPackage, SnapshotSections,
};
pub use sorted_map::SortedLevelMap;
pub use spsc::SpscQueue;
pub use tick::TickGrid;
pub use types::{
    DataMode, DirtyLevelChange, Order, OrderUpdate, OrderUpdateKind, PriceLevelUpdate, Side,
};
