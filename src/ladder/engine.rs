//! The ladder orchestrator: owns the book, the batcher and (in MBO mode)
//! the manager, and runs the mode state machine.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ladder::batcher::{BatcherConfig, BatcherMetrics, SnapshotListener, UpdateBatcher};
use crate::ladder::book::{BookLevel, OrderBook};
use crate::ladder::error::LadderError;
use crate::ladder::mbo::MboManager;
use crate::ladder::tick::TickGrid;
use crate::ladder::types::{DataMode, OrderUpdate, OrderUpdateKind, PriceLevelUpdate, Side};

/// Engine construction parameters.
///
/// `max_levels` sizes the level containers for the worst-case visible depth
/// plus headroom; it is not enforced as a cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderConfig {
    /// Smallest price increment; every stored price is a multiple of it.
    pub tick_size: f64,
    /// Container sizing hint for each book side.
    pub max_levels: usize,
    /// Initial data mode.
    pub mode: DataMode,
    /// Batching and snapshot tuning.
    pub batcher: BatcherConfig,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            tick_size: 0.01,
            max_levels: 256,
            mode: DataMode::PriceLevel,
            batcher: BatcherConfig::default(),
        }
    }
}

/// A single-instrument price-ladder engine.
///
/// Single-threaded cooperative: every entry point completes without
/// yielding, and all state mutation happens on the calling thread. The
/// emitted snapshots are plain values and may be shipped to other threads.
///
/// # Examples
/// ```
/// use ladder_rs::{LadderConfig, PriceLadder, PriceLevelUpdate, Side};
///
/// let mut ladder = PriceLadder::new(LadderConfig::default()).unwrap();
/// ladder
///     .process_price_level_update(PriceLevelUpdate::new(Side::Bid, 100.00, 1_000, 1))
///     .unwrap();
/// ladder.flush();
/// assert_eq!(ladder.best_bid(), Some(100.00));
/// ```
#[derive(Debug)]
pub struct PriceLadder {
    book: OrderBook,
    mbo: Option<MboManager>,
    batcher: UpdateBatcher,
    grid: TickGrid,
    max_levels: usize,
}

impl PriceLadder {
    /// Build an engine from configuration.
    ///
    /// # Errors
    /// Returns [`LadderError::InvalidTickSize`] or
    /// [`LadderError::InvalidQueueCapacity`] on a bad configuration.
    pub fn new(config: LadderConfig) -> Result<Self, LadderError> {
        let grid = TickGrid::new(config.tick_size)?;
        let mut batcher = UpdateBatcher::new(config.batcher)?;
        batcher.set_data_mode(config.mode);

        let mbo = match config.mode {
            DataMode::Mbo => Some(MboManager::new(grid, config.max_levels)),
            DataMode::PriceLevel => None,
        };

        info!(
            "price ladder created: tick {}, {} mode",
            config.tick_size, config.mode
        );

        Ok(Self {
            book: OrderBook::new(grid, config.max_levels),
            mbo,
            batcher,
            grid,
            max_levels: config.max_levels,
        })
    }

    /// Current data mode.
    #[inline]
    pub fn mode(&self) -> DataMode {
        self.batcher.mode()
    }

    /// Register the snapshot handler invoked at each flush.
    ///
    /// Handlers survive [`Self::reset`] and mode switches.
    pub fn subscribe(&mut self, listener: SnapshotListener) {
        self.batcher.subscribe(listener);
    }

    /// Enqueue one aggregated price-level update.
    ///
    /// Returns `Ok(false)` when the batcher rejected the update (paused, or
    /// the queue refused it twice).
    ///
    /// # Errors
    /// Returns [`LadderError::ModeViolation`] outside `PriceLevel` mode.
    pub fn process_price_level_update(
        &mut self,
        update: PriceLevelUpdate,
    ) -> Result<bool, LadderError> {
        self.require_mode(DataMode::PriceLevel)?;
        Ok(self
            .batcher
            .queue_update(&mut self.book, self.mbo.as_mut(), update))
    }

    /// Enqueue one market-by-order update.
    ///
    /// # Errors
    /// Returns [`LadderError::ModeViolation`] outside `Mbo` mode.
    pub fn process_order_update(
        &mut self,
        update: OrderUpdate,
        kind: OrderUpdateKind,
    ) -> Result<bool, LadderError> {
        self.require_mode(DataMode::Mbo)?;
        Ok(self
            .batcher
            .queue_order_update(&mut self.book, self.mbo.as_mut(), update, kind))
    }

    /// Enqueue a span of price-level updates in order, stopping at the
    /// first rejection. Returns the number enqueued.
    ///
    /// # Errors
    /// Returns [`LadderError::ModeViolation`] outside `PriceLevel` mode.
    pub fn process_batch(&mut self, updates: &[PriceLevelUpdate]) -> Result<usize, LadderError> {
        self.require_mode(DataMode::PriceLevel)?;
        Ok(self
            .batcher
            .queue_batch(&mut self.book, self.mbo.as_mut(), updates))
    }

    /// Drain pending updates and emit a snapshot if anything was pending.
    pub fn flush(&mut self) {
        self.batcher.flush(&mut self.book, self.mbo.as_mut());
    }

    /// Flag or unflag a level as carrying one of the local trader's orders.
    pub fn mark_own_order(&mut self, price: f64, side: Side, has_own_order: bool) {
        self.book.mark_own_order(price, side, has_own_order);
    }

    /// Highest bid price, if any.
    pub fn best_bid(&self) -> Option<f64> {
        self.book.best_bid()
    }

    /// Lowest ask price, if any.
    pub fn best_ask(&self) -> Option<f64> {
        self.book.best_ask()
    }

    /// Mean of best bid and best ask when both sides are populated.
    pub fn mid_price(&self) -> Option<f64> {
        self.book.mid_price()
    }

    /// Best ask − best bid when both sides are populated.
    pub fn spread(&self) -> Option<f64> {
        self.book.spread()
    }

    /// The `n` highest bids, best first.
    pub fn top_bids(&self, n: usize) -> Vec<BookLevel> {
        self.book.top_bids(n)
    }

    /// The `n` lowest asks, best first.
    pub fn top_asks(&self, n: usize) -> Vec<BookLevel> {
        self.book.top_asks(n)
    }

    /// Read access to the book.
    #[inline]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Read access to the MBO manager while in `Mbo` mode.
    #[inline]
    pub fn mbo_manager(&self) -> Option<&MboManager> {
        self.mbo.as_ref()
    }

    /// Batcher health counters.
    pub fn metrics(&self) -> BatcherMetrics {
        self.batcher.metrics()
    }

    /// Switch between aggregated and market-by-order ingestion.
    ///
    /// A no-op when the mode is unchanged. Otherwise the batcher drains and
    /// pauses, all book and order state is dropped, and one empty snapshot
    /// with `structural_change = true` is published before ingestion
    /// resumes; consumers rebuild their row set from it.
    pub fn set_data_mode(&mut self, mode: DataMode) {
        if mode == self.mode() {
            return;
        }

        debug!("switching data mode: {} -> {}", self.mode(), mode);
        self.batcher.pause(&mut self.book, self.mbo.as_mut());

        self.book.clear();
        if let Some(manager) = self.mbo.as_mut() {
            manager.reset(&mut self.book);
        }
        if mode == DataMode::Mbo && self.mbo.is_none() {
            self.mbo = Some(MboManager::new(self.grid, self.max_levels));
        }

        self.batcher.set_data_mode(mode);
        self.book.mark_structural_change();
        self.batcher.emit_snapshot(&mut self.book, self.mbo.as_mut());
        self.batcher.resume();
    }

    /// Drop all market state and statistics, keeping configuration, mode
    /// and subscribers.
    pub fn reset(&mut self) {
        debug!("ladder reset");
        self.batcher.pause(&mut self.book, self.mbo.as_mut());
        self.batcher.clear_pending();

        self.book.clear();
        if let Some(manager) = self.mbo.as_mut() {
            manager.reset(&mut self.book);
        }

        self.batcher.reset_statistics();
        self.batcher.resume();
    }

    fn require_mode(&self, required: DataMode) -> Result<(), LadderError> {
        let actual = self.mode();
        if actual != required {
            return Err(LadderError::ModeViolation { required, actual });
        }
        Ok(())
    }
}
