//! # Real-Time Price-Ladder Engine
//!
//! A single-instrument price-ladder core for trading front-ends. The engine
//! ingests a high-rate stream of market-data updates (aggregated
//! price-level updates or individual-order MBO updates), maintains a
//! sorted two-sided limit order book, and emits coalesced snapshots with
//! per-level dirty tracking so an incremental UI redraws only affected
//! rows.
//!
//! ## Key Features
//!
//! - **Cache-friendly book storage**: both sides live in contiguous sorted
//!   containers keyed by integer tick counts, sized for the 100–200 visible
//!   levels a ladder actually shows. Lookups are binary searches; row
//!   access is positional.
//!
//! - **Micro-batching**: updates pass through bounded lock-free SPSC rings
//!   and are coalesced in short time windows (100 µs by default), so one
//!   snapshot summarizes a burst instead of repainting per tick.
//!
//! - **Dirty-change tracking**: every level mutation is logged; each
//!   snapshot carries the per-level changes and a structural flag telling
//!   consumers whether the row set itself changed.
//!
//! - **Market-by-order mode**: a per-price order tracker aggregates
//!   individual orders into book levels and exposes per-price order arrays
//!   for depth displays, including own-order highlighting.
//!
//! - **Host-friendly boundary**: snapshots are immutable owned values with
//!   a stable JSON schema, optional checksum packaging, compact binary
//!   update frames, and std/tokio channel bridges.
//!
//! ## Scheduling model
//!
//! The engine is single-threaded cooperative: the producer call path both
//! enqueues and flushes, and every operation completes without yielding.
//! Only the SPSC queues are safe to share, and only in the one-producer /
//! one-consumer configuration. Hosts that need asynchrony wrap the engine
//! in their own task and ship the emitted snapshots across threads.
//!
//! ## Quick start
//!
//! ```
//! use ladder_rs::prelude::*;
//! use std::sync::Arc;
//!
//! let mut ladder = PriceLadder::new(LadderConfig::default()).unwrap();
//! ladder.subscribe(Arc::new(|snapshot| {
//!     if snapshot.structural_change {
//!         // rebuild rows
//!     }
//! }));
//!
//! ladder
//!     .process_price_level_update(PriceLevelUpdate::new(Side::Bid, 100.00, 1_000, 1))
//!     .unwrap();
//! ladder
//!     .process_price_level_update(PriceLevelUpdate::new(Side::Ask, 100.01, 1_500, 1))
//!     .unwrap();
//! ladder.flush();
//!
//! assert_eq!(ladder.mid_price(), Some(100.005));
//! ```

pub mod ladder;
pub mod prelude;
pub mod utils;

pub use ladder::batcher::{
    BatcherConfig, BatcherMetrics, BatcherStats, SnapshotListener, UpdateBatcher,
};
pub use ladder::book::{BookLevel, OrderBook};
pub use ladder::bridge;
pub use ladder::engine::{LadderConfig, PriceLadder};
pub use ladder::error::LadderError;
pub use ladder::mbo::{MboManager, OrderLevel};
pub use ladder::snapshot::{
    LadderSnapshot, OrdersByPrice, SNAPSHOT_FORMAT_VERSION, SnapshotPackage, SnapshotSections,
};
pub use ladder::sorted_map::SortedLevelMap;
pub use ladder::spsc::SpscQueue;
pub use ladder::tick::TickGrid;
pub use ladder::types::{
    DataMode, DirtyLevelChange, Order, OrderUpdate, OrderUpdateKind, PriceLevelUpdate, Side,
};
pub use ladder::wire;
pub use utils::current_time_millis;
