//! Two-sided sorted order book with per-level dirty tracking.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ladder::snapshot::LadderSnapshot;
use crate::ladder::sorted_map::SortedLevelMap;
use crate::ladder::tick::TickGrid;
use crate::ladder::types::{DirtyLevelChange, Side};
use crate::utils::monotonic_nanos;

/// One aggregated price level.
///
/// A level exists in the book iff its quantity is positive; removal and
/// existence are the same fact. The `dirty` and `has_own_orders` flags are
/// engine-internal and do not cross the host boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookLevel {
    /// Level price, tick-aligned.
    pub price: f64,
    /// Aggregate resting quantity; positive for stored levels, zero only on
    /// synthetic fill-empty entries.
    pub quantity: i64,
    /// Number of resting orders behind the aggregate.
    pub num_orders: u32,
    /// Book side.
    pub side: Side,
    /// Changed since the last committed snapshot.
    #[serde(skip)]
    pub dirty: bool,
    /// At least one of the local trader's orders rests here.
    #[serde(skip)]
    pub has_own_orders: bool,
}

impl BookLevel {
    /// Build a live level; starts dirty so the first snapshot repaints it.
    pub fn new(price: f64, quantity: i64, num_orders: u32, side: Side) -> Self {
        Self {
            price,
            quantity,
            num_orders,
            side,
            dirty: true,
            has_own_orders: false,
        }
    }

    /// Build a synthetic zero-quantity entry for fill-empty windows.
    pub fn empty(price: f64, side: Side) -> Self {
        Self {
            price,
            quantity: 0,
            num_orders: 0,
            side,
            dirty: false,
            has_own_orders: false,
        }
    }
}

/// The order book: bids and asks keyed by integer tick count, plus the
/// dirty-change log consumed at each flush.
///
/// Both sides may store crossed prices; the feed owns book sanity and the
/// engine only guarantees per-side ordering.
#[derive(Debug)]
pub struct OrderBook {
    grid: TickGrid,
    bids: SortedLevelMap<i64, BookLevel>,
    asks: SortedLevelMap<i64, BookLevel>,
    dirty_changes: Vec<DirtyLevelChange>,
    structural_change: bool,
}

impl OrderBook {
    /// Create a book on the given price grid.
    ///
    /// `max_levels` sizes the containers for the worst-case visible depth
    /// plus headroom; it is not a hard cap.
    pub fn new(grid: TickGrid, max_levels: usize) -> Self {
        Self {
            grid,
            bids: SortedLevelMap::with_capacity(max_levels),
            asks: SortedLevelMap::with_capacity(max_levels),
            dirty_changes: Vec::new(),
            structural_change: false,
        }
    }

    /// The price grid this book is keyed on.
    #[inline]
    pub fn grid(&self) -> &TickGrid {
        &self.grid
    }

    /// Number of stored bid levels.
    #[inline]
    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    /// Number of stored ask levels.
    #[inline]
    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    fn side_map(&self, side: Side) -> &SortedLevelMap<i64, BookLevel> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_map_mut(&mut self, side: Side) -> &mut SortedLevelMap<i64, BookLevel> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Apply an absolute level update.
    ///
    /// A positive quantity inserts or replaces the level (preserving any
    /// own-order mark on replacement); zero or negative removes it. Every
    /// effective change is appended to the dirty log, and insertions or
    /// removals raise the structural flag. A removal of an absent price is
    /// a no-op that records nothing.
    pub fn update_level(&mut self, price: f64, quantity: i64, num_orders: u32, side: Side) {
        let ticks = self.grid.to_ticks(price);
        self.update_level_at(ticks, quantity, num_orders, side);
    }

    /// Tick-keyed variant of [`Self::update_level`] used by the MBO manager,
    /// which already works in tick space.
    pub(crate) fn update_level_at(&mut self, ticks: i64, quantity: i64, num_orders: u32, side: Side) {
        if quantity <= 0 {
            let removed = self.side_map_mut(side).remove(&ticks);
            if removed {
                let price = self.grid.price_of(ticks);
                trace!("removed {side} level at {price}");
                self.dirty_changes.push(DirtyLevelChange {
                    price,
                    side,
                    is_removal: true,
                    is_addition: false,
                });
                self.structural_change = true;
            }
            return;
        }

        let price = self.grid.price_of(ticks);
        let map = self.side_map_mut(side);
        let inserted = match map.try_get_mut(&ticks) {
            Some(level) => {
                level.quantity = quantity;
                level.num_orders = num_orders;
                level.dirty = true;
                false
            }
            None => {
                map.put(ticks, BookLevel::new(price, quantity, num_orders, side));
                true
            }
        };

        trace!("updated {side} level at {price}: qty {quantity}, orders {num_orders}");
        self.dirty_changes.push(DirtyLevelChange {
            price,
            side,
            is_removal: false,
            is_addition: inserted,
        });
        if inserted {
            self.structural_change = true;
        }
    }

    /// Flag or unflag a level as carrying one of the local trader's orders.
    ///
    /// Absent prices are a silent no-op: the feed may confirm an own order
    /// after the level it rested on was already swept.
    pub fn mark_own_order(&mut self, price: f64, side: Side, has_own_order: bool) {
        let ticks = self.grid.to_ticks(price);
        self.mark_own_order_at(ticks, side, has_own_order);
    }

    pub(crate) fn mark_own_order_at(&mut self, ticks: i64, side: Side, has_own_order: bool) {
        let price = self.grid.price_of(ticks);
        if let Some(level) = self.side_map_mut(side).try_get_mut(&ticks) {
            if level.has_own_orders != has_own_order {
                level.has_own_orders = has_own_order;
                level.dirty = true;
                self.dirty_changes.push(DirtyLevelChange {
                    price,
                    side,
                    is_removal: false,
                    is_addition: false,
                });
            }
        }
    }

    /// Look up a stored level.
    pub fn try_get_level(&self, price: f64, side: Side) -> Option<&BookLevel> {
        let ticks = self.grid.to_ticks(price);
        self.side_map(side).try_get(&ticks)
    }

    fn best_bid_ticks(&self) -> Option<i64> {
        self.bids.get_key_by_index(self.bids.len().wrapping_sub(1))
    }

    fn best_ask_ticks(&self) -> Option<i64> {
        self.asks.get_key_by_index(0)
    }

    /// Highest bid price, if any.
    pub fn best_bid(&self) -> Option<f64> {
        self.best_bid_ticks().map(|t| self.grid.price_of(t))
    }

    /// Lowest ask price, if any.
    pub fn best_ask(&self) -> Option<f64> {
        self.best_ask_ticks().map(|t| self.grid.price_of(t))
    }

    /// Mean of best bid and best ask when both sides are populated.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    /// Best ask − best bid when both sides are populated. Negative when the
    /// book is crossed.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// The `n` highest bids, best first.
    pub fn top_bids(&self, n: usize) -> Vec<BookLevel> {
        let count = n.min(self.bids.len());
        let start = self.bids.len() - count;
        let mut levels: Vec<BookLevel> = self.bids.range(start, count).to_vec();
        levels.reverse();
        levels
    }

    /// The `n` lowest asks, best first.
    pub fn top_asks(&self, n: usize) -> Vec<BookLevel> {
        self.asks.range(0, n).to_vec()
    }

    /// Bid levels with prices in `[low, high]`, ascending.
    pub fn bids_in_range(&self, low: f64, high: f64) -> &[BookLevel] {
        Self::levels_in_range(&self.bids, &self.grid, low, high)
    }

    /// Ask levels with prices in `[low, high]`, ascending.
    pub fn asks_in_range(&self, low: f64, high: f64) -> &[BookLevel] {
        Self::levels_in_range(&self.asks, &self.grid, low, high)
    }

    fn levels_in_range<'a>(
        map: &'a SortedLevelMap<i64, BookLevel>,
        grid: &TickGrid,
        low: f64,
        high: f64,
    ) -> &'a [BookLevel] {
        let low_ticks = grid.to_ticks(low);
        let high_ticks = grid.to_ticks(high);
        let start = map.lower_bound(&low_ticks);
        let end = map.upper_bound(&high_ticks);
        map.range(start, end.saturating_sub(start))
    }

    /// Build the level arrays for a snapshot window around `center_price`.
    ///
    /// With `H = visible_levels / 2`, the bid window covers the ticks in
    /// `[center − H·T, center]` and the ask window `(center, center + H·T]`:
    /// the center row deliberately belongs to the bid side. Both arrays are
    /// ascending. With `fill_empty`, every tick in each window yields an
    /// entry, synthesizing zero-quantity levels for missing ticks.
    ///
    /// Best bid/ask/mid are taken from the whole book, not the window.
    pub fn get_snapshot(
        &self,
        center_price: f64,
        visible_levels: usize,
        fill_empty: bool,
    ) -> LadderSnapshot {
        let center = self.grid.floor_to_ticks(center_price);
        let half = (visible_levels / 2) as i64;

        let (bids, asks) = if fill_empty {
            (
                self.filled_window(&self.bids, center - half, center, Side::Bid),
                self.filled_window(&self.asks, center + 1, center + half, Side::Ask),
            )
        } else {
            (
                Self::sparse_window(&self.bids, center - half, center),
                Self::sparse_window(&self.asks, center + 1, center + half),
            )
        };

        LadderSnapshot {
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            mid_price: self.mid_price(),
            bids,
            asks,
            timestamp: monotonic_nanos(),
            bid_orders: None,
            ask_orders: None,
            dirty_changes: None,
            structural_change: false,
        }
    }

    fn sparse_window(
        map: &SortedLevelMap<i64, BookLevel>,
        low: i64,
        high: i64,
    ) -> Vec<BookLevel> {
        if high < low {
            return Vec::new();
        }
        let start = map.lower_bound(&low);
        let end = map.upper_bound(&high);
        map.range(start, end.saturating_sub(start)).to_vec()
    }

    fn filled_window(
        &self,
        map: &SortedLevelMap<i64, BookLevel>,
        low: i64,
        high: i64,
        side: Side,
    ) -> Vec<BookLevel> {
        if high < low {
            return Vec::new();
        }
        let mut levels = Vec::with_capacity((high - low + 1) as usize);
        for ticks in low..=high {
            match map.try_get(&ticks) {
                Some(level) => levels.push(*level),
                None => levels.push(BookLevel::empty(self.grid.price_of(ticks), side)),
            }
        }
        levels
    }

    /// Atomically take and clear the dirty log and structural flag.
    ///
    /// Call exactly once per emitted snapshot.
    pub fn consume_dirty_state(&mut self) -> (Vec<DirtyLevelChange>, bool) {
        let changes = std::mem::take(&mut self.dirty_changes);
        let structural = std::mem::replace(&mut self.structural_change, false);
        (changes, structural)
    }

    /// Raise the structural flag outside the update path.
    ///
    /// Used after lifecycle transitions (mode switches) so the next emitted
    /// snapshot tells consumers to rebuild their row set.
    pub fn mark_structural_change(&mut self) {
        self.structural_change = true;
    }

    /// Clear every stored level's dirty flag after a snapshot is committed.
    pub fn clear_dirty_flags(&mut self) {
        for level in self.bids.values_mut() {
            level.dirty = false;
        }
        for level in self.asks.values_mut() {
            level.dirty = false;
        }
    }

    /// `true` when any stored level is flagged dirty.
    pub fn has_dirty_levels(&self) -> bool {
        self.bids.values().iter().any(|level| level.dirty)
            || self.asks.values().iter().any(|level| level.dirty)
    }

    /// Drop all levels and pending dirty state, keeping the configuration.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.dirty_changes.clear();
        self.structural_change = false;
    }
}
