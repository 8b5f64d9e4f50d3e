//! Micro-batching engine: coalesces updates behind bounded SPSC queues and
//! emits one snapshot per flush.
//!
//! Scheduling is single-threaded cooperative: the producer call path both
//! enqueues and, once the time window or size threshold is hit, drains.
//! There is no background timer; with sparse producers a host drives
//! `flush` from its own loop.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::ladder::book::OrderBook;
use crate::ladder::error::LadderError;
use crate::ladder::mbo::MboManager;
use crate::ladder::snapshot::{LadderSnapshot, SnapshotSections};
use crate::ladder::spsc::SpscQueue;
use crate::ladder::types::{DataMode, OrderUpdate, OrderUpdateKind, PriceLevelUpdate};

/// Receives one snapshot value per flush, synchronously on the flushing
/// thread. Keep handlers cheap; ship the value elsewhere for slow work.
pub type SnapshotListener = Arc<dyn Fn(LadderSnapshot) + Send + Sync>;

/// Batching and snapshot tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Soft time window; a producer call past this bound triggers a flush.
    pub batch_interval_us: u64,
    /// Pending-update count that forces a flush.
    pub max_batch_size: usize,
    /// SPSC queue capacity; must be a power of two ≥ 2.
    pub queue_capacity: usize,
    /// Number of rows in the emitted snapshot window.
    pub visible_levels: usize,
    /// Synthesize zero-quantity rows for empty ticks in the window.
    pub fill_empty_levels: bool,
    /// Pin the snapshot window to this center instead of following the mid.
    pub center_price: Option<f64>,
    /// Which optional snapshot sections to attach.
    pub sections: SnapshotSections,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_interval_us: 100,
            max_batch_size: 1_000,
            queue_capacity: 4_096,
            visible_levels: 100,
            fill_empty_levels: false,
            center_price: None,
            sections: SnapshotSections::ALL,
        }
    }
}

impl BatcherConfig {
    #[inline]
    fn batch_interval(&self) -> Duration {
        Duration::from_micros(self.batch_interval_us)
    }
}

/// Rolling ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherStats {
    /// Updates drained into the book or manager since the last stats reset.
    pub total_updates_processed: u64,
    /// Flushes that drained at least one update.
    pub total_batches_flushed: u64,
}

/// Point-in-time batcher health, for host dashboards and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatcherMetrics {
    /// Updates drained since the last stats reset.
    pub updates_processed: u64,
    /// Flushes that drained at least one update.
    pub batches_flushed: u64,
    /// Mean updates per flushed batch.
    pub average_batch_size: f64,
    /// Updates enqueued but not yet drained.
    pub pending: usize,
    /// Fill ratio of the active queue, `0.0..=1.0`.
    pub queue_utilization: f64,
}

/// Owns both update queues, the flush timer and the snapshot pipeline.
///
/// The batcher holds no reference to the book or manager; the orchestrator
/// lends them to every call that drains. Queue-full pressure triggers one
/// inline flush and retry; a second failure surfaces as a rejected enqueue
/// for the caller's drop/throttle policy.
pub struct UpdateBatcher {
    config: BatcherConfig,
    mode: DataMode,
    paused: bool,
    level_queue: SpscQueue<PriceLevelUpdate>,
    order_queue: SpscQueue<(OrderUpdate, OrderUpdateKind)>,
    level_scratch: Vec<PriceLevelUpdate>,
    order_scratch: Vec<(OrderUpdate, OrderUpdateKind)>,
    pending: usize,
    last_flush: Instant,
    stats: BatcherStats,
    listener: Option<SnapshotListener>,
}

impl UpdateBatcher {
    /// Create a batcher with the given tuning.
    ///
    /// # Errors
    /// Returns [`LadderError::InvalidQueueCapacity`] unless the queue
    /// capacity is a power of two ≥ 2.
    pub fn new(config: BatcherConfig) -> Result<Self, LadderError> {
        Ok(Self {
            level_queue: SpscQueue::with_capacity(config.queue_capacity)?,
            order_queue: SpscQueue::with_capacity(config.queue_capacity)?,
            level_scratch: Vec::with_capacity(config.max_batch_size),
            order_scratch: Vec::with_capacity(config.max_batch_size),
            config,
            mode: DataMode::PriceLevel,
            paused: false,
            pending: 0,
            last_flush: Instant::now(),
            stats: BatcherStats::default(),
            listener: None,
        })
    }

    /// Current drain target.
    #[inline]
    pub fn mode(&self) -> DataMode {
        self.mode
    }

    /// Point the drain at the book (`PriceLevel`) or the manager (`Mbo`).
    ///
    /// The orchestrator is responsible for pausing, clearing state and
    /// resuming around the switch.
    pub fn set_data_mode(&mut self, mode: DataMode) {
        self.mode = mode;
    }

    /// `true` while enqueues are rejected.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Updates enqueued but not yet drained.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Register the snapshot handler invoked at each flush.
    pub fn subscribe(&mut self, listener: SnapshotListener) {
        self.listener = Some(listener);
    }

    /// Enqueue a price-level update, flushing when the window or size
    /// threshold is reached. Returns `false` when paused, in MBO mode, or
    /// when the queue rejects the update twice.
    pub fn queue_update(
        &mut self,
        book: &mut OrderBook,
        mut mbo: Option<&mut MboManager>,
        update: PriceLevelUpdate,
    ) -> bool {
        if !self.enqueue_level(book, mbo.as_deref_mut(), update) {
            return false;
        }
        self.flush_if_due(book, mbo);
        true
    }

    /// Enqueue without the time/size-driven flush; queue-full pressure
    /// still flushes inline. Used by host-driven batch loops.
    pub fn queue_update_no_flush(
        &mut self,
        book: &mut OrderBook,
        mbo: Option<&mut MboManager>,
        update: PriceLevelUpdate,
    ) -> bool {
        self.enqueue_level(book, mbo, update)
    }

    /// Enqueue a span of price-level updates in order; stops at the first
    /// rejection. Returns the number enqueued.
    pub fn queue_batch(
        &mut self,
        book: &mut OrderBook,
        mut mbo: Option<&mut MboManager>,
        updates: &[PriceLevelUpdate],
    ) -> usize {
        let mut accepted = 0;
        for update in updates {
            if !self.queue_update(book, mbo.as_deref_mut(), *update) {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Enqueue an order update, flushing when the window or size threshold
    /// is reached. Returns `false` when paused, outside MBO mode, or when
    /// the queue rejects the update twice.
    pub fn queue_order_update(
        &mut self,
        book: &mut OrderBook,
        mut mbo: Option<&mut MboManager>,
        update: OrderUpdate,
        kind: OrderUpdateKind,
    ) -> bool {
        if !self.enqueue_order(book, mbo.as_deref_mut(), update, kind) {
            return false;
        }
        self.flush_if_due(book, mbo);
        true
    }

    /// Order-update variant of [`Self::queue_update_no_flush`].
    pub fn queue_order_update_no_flush(
        &mut self,
        book: &mut OrderBook,
        mbo: Option<&mut MboManager>,
        update: OrderUpdate,
        kind: OrderUpdateKind,
    ) -> bool {
        self.enqueue_order(book, mbo, update, kind)
    }

    fn enqueue_level(
        &mut self,
        book: &mut OrderBook,
        mut mbo: Option<&mut MboManager>,
        update: PriceLevelUpdate,
    ) -> bool {
        if self.paused || self.mode != DataMode::PriceLevel {
            return false;
        }

        if !self.level_queue.try_write(update) {
            // Full queue: drain everything pending, then try once more.
            debug!("level queue full; flushing inline");
            self.flush(book, mbo.as_deref_mut());
            if !self.level_queue.try_write(update) {
                return false;
            }
        }

        self.pending += 1;
        true
    }

    fn enqueue_order(
        &mut self,
        book: &mut OrderBook,
        mut mbo: Option<&mut MboManager>,
        update: OrderUpdate,
        kind: OrderUpdateKind,
    ) -> bool {
        if self.paused || self.mode != DataMode::Mbo {
            return false;
        }

        if !self.order_queue.try_write((update, kind)) {
            debug!("order queue full; flushing inline");
            self.flush(book, mbo.as_deref_mut());
            if !self.order_queue.try_write((update, kind)) {
                return false;
            }
        }

        self.pending += 1;
        true
    }

    fn flush_if_due(&mut self, book: &mut OrderBook, mbo: Option<&mut MboManager>) {
        if self.pending >= self.config.max_batch_size
            || self.last_flush.elapsed() >= self.config.batch_interval()
        {
            self.flush(book, mbo);
        }
    }

    /// Drain the active queue into the book (or manager), then assemble and
    /// emit one snapshot summarizing the batch. A flush with nothing
    /// pending is a no-op.
    pub fn flush(&mut self, book: &mut OrderBook, mut mbo: Option<&mut MboManager>) {
        if self.pending == 0 {
            return;
        }

        let drained = match self.mode {
            DataMode::PriceLevel => {
                self.level_scratch.clear();
                self.level_queue.read_batch(&mut self.level_scratch);
                for update in &self.level_scratch {
                    book.update_level(update.price, update.quantity, update.num_orders, update.side);
                }
                self.level_scratch.len()
            }
            DataMode::Mbo => {
                self.order_scratch.clear();
                self.order_queue.read_batch(&mut self.order_scratch);
                match mbo.as_deref_mut() {
                    Some(manager) => {
                        for (update, kind) in &self.order_scratch {
                            manager.process_order_update(book, update, *kind);
                        }
                    }
                    None => {
                        debug!(
                            "dropping {} order updates: no manager attached",
                            self.order_scratch.len()
                        );
                    }
                }
                self.order_scratch.len()
            }
        };

        trace!("flush drained {drained} updates");
        self.stats.total_updates_processed += drained as u64;
        if drained > 0 {
            self.stats.total_batches_flushed += 1;
        }

        // Counters reset before the subscriber runs: a listener that
        // reenters the batcher (metrics, another flush) must not observe
        // the drained batch as still pending.
        self.pending = 0;
        self.last_flush = Instant::now();

        self.emit_snapshot(book, mbo);
    }

    /// Assemble a snapshot from the current book state and hand it to the
    /// subscriber. Consumes the dirty log and clears per-level dirty flags;
    /// does not touch the pending counter or the flush timer.
    ///
    /// `flush` calls this after draining; the orchestrator calls it
    /// directly to publish lifecycle snapshots (e.g. after a mode switch).
    pub fn emit_snapshot(&mut self, book: &mut OrderBook, mbo: Option<&mut MboManager>) {
        let center = self.snapshot_center(book);
        let mut snapshot = book.get_snapshot(
            center,
            self.config.visible_levels,
            self.config.fill_empty_levels,
        );

        let (changes, structural) = book.consume_dirty_state();
        snapshot.structural_change = structural;
        if self.config.sections.contains(SnapshotSections::DIRTY_CHANGES) {
            snapshot.dirty_changes = Some(changes);
        }

        if self.mode == DataMode::Mbo
            && self.config.sections.contains(SnapshotSections::ORDER_DETAIL)
        {
            if let Some(manager) = mbo {
                snapshot.bid_orders = Some(manager.bid_orders().clone());
                snapshot.ask_orders = Some(manager.ask_orders().clone());
            }
        }

        book.clear_dirty_flags();

        if let Some(listener) = &self.listener {
            listener(snapshot);
        }
    }

    /// Window center: pinned price if configured, else the mid rounded down
    /// to the grid, else best bid, else best ask, else zero.
    ///
    /// The ask window excludes the center row, so an ask-only book centers
    /// one tick below the best ask to keep it visible.
    fn snapshot_center(&self, book: &OrderBook) -> f64 {
        if let Some(center) = self.config.center_price {
            return center;
        }

        let grid = book.grid();
        if let Some(mid) = book.mid_price() {
            return grid.price_of(grid.floor_to_ticks(mid));
        }
        if let Some(bid) = book.best_bid() {
            return bid;
        }
        if let Some(ask) = book.best_ask() {
            return grid.price_of(grid.to_ticks(ask) - 1);
        }
        0.0
    }

    /// Flush whatever is pending, then reject subsequent enqueues.
    pub fn pause(&mut self, book: &mut OrderBook, mbo: Option<&mut MboManager>) {
        if self.paused {
            return;
        }
        self.flush(book, mbo);
        self.paused = true;
        debug!("batcher paused");
    }

    /// Re-enable enqueues and restart the flush window.
    pub fn resume(&mut self) {
        self.paused = false;
        self.last_flush = Instant::now();
        debug!("batcher resumed");
    }

    /// Zero the rolling counters.
    pub fn reset_statistics(&mut self) {
        self.stats = BatcherStats::default();
    }

    /// Drop all enqueued-but-undrained updates.
    ///
    /// Safe only while no producer is active (the queues' `clear`
    /// contract).
    pub fn clear_pending(&mut self) {
        self.level_queue.clear();
        self.order_queue.clear();
        self.pending = 0;
    }

    /// Rolling counters.
    #[inline]
    pub fn stats(&self) -> BatcherStats {
        self.stats
    }

    /// Snapshot of batcher health.
    pub fn metrics(&self) -> BatcherMetrics {
        let average_batch_size = if self.stats.total_batches_flushed > 0 {
            self.stats.total_updates_processed as f64 / self.stats.total_batches_flushed as f64
        } else {
            0.0
        };

        let active_len = match self.mode {
            DataMode::PriceLevel => self.level_queue.len(),
            DataMode::Mbo => self.order_queue.len(),
        };
        let usable = (self.config.queue_capacity - 1) as f64;

        BatcherMetrics {
            updates_processed: self.stats.total_updates_processed,
            batches_flushed: self.stats.total_batches_flushed,
            average_batch_size,
            pending: self.pending,
            queue_utilization: active_len as f64 / usable,
        }
    }

    /// The tuning this batcher was built with.
    #[inline]
    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }
}

impl std::fmt::Debug for UpdateBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateBatcher")
            .field("mode", &self.mode)
            .field("paused", &self.paused)
            .field("pending", &self.pending)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
