//! Market-by-order tracking and aggregation into the book.
//!
//! The manager owns per-price order sets plus a global order-id index, and
//! is the sole writer to the book while the engine runs in MBO mode. Every
//! mutation re-propagates the affected level's aggregates so the book and
//! the manager never disagree.

use dashmap::DashMap;
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::ladder::book::OrderBook;
use crate::ladder::snapshot::OrdersByPrice;
use crate::ladder::sorted_map::SortedLevelMap;
use crate::ladder::tick::TickGrid;
use crate::ladder::types::{Order, OrderUpdate, OrderUpdateKind, Side};

/// All resting orders at one price.
///
/// Aggregates (`total_quantity`, `order_count`, `own_count`) are cached and
/// updated incrementally; the rendering array is rebuilt lazily behind
/// `array_dirty`. An empty level is removed from its side immediately.
#[derive(Debug, Clone)]
pub struct OrderLevel {
    ticks: i64,
    side: Side,
    orders: BTreeMap<u64, Order>,
    total_quantity: i64,
    order_count: u32,
    own_count: u32,
    array_dirty: bool,
    cached_array: Vec<Order>,
}

impl OrderLevel {
    fn new(ticks: i64, side: Side) -> Self {
        Self {
            ticks,
            side,
            orders: BTreeMap::new(),
            total_quantity: 0,
            order_count: 0,
            own_count: 0,
            array_dirty: false,
            cached_array: Vec::new(),
        }
    }

    /// Tick-count key of this level.
    #[inline]
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Book side of this level.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Cached sum of resting quantities.
    #[inline]
    pub fn total_quantity(&self) -> i64 {
        self.total_quantity
    }

    /// Cached number of resting orders.
    #[inline]
    pub fn order_count(&self) -> u32 {
        self.order_count
    }

    /// `true` when any resting order belongs to the local trader.
    #[inline]
    pub fn has_own_orders(&self) -> bool {
        self.own_count > 0
    }

    /// Look up a resting order.
    pub fn try_get_order(&self, order_id: u64) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    fn insert(&mut self, order: Order) -> Option<Order> {
        let previous = self.orders.insert(order.order_id, order);
        match previous {
            Some(old) => {
                self.total_quantity += order.quantity - old.quantity;
                self.own_count -= u32::from(old.is_own_order);
                self.own_count += u32::from(order.is_own_order);
            }
            None => {
                self.total_quantity += order.quantity;
                self.order_count += 1;
                self.own_count += u32::from(order.is_own_order);
            }
        }
        self.array_dirty = true;
        previous
    }

    fn apply_quantity(&mut self, order_id: u64, quantity: i64) -> bool {
        match self.orders.get_mut(&order_id) {
            Some(order) => {
                self.total_quantity += quantity - order.quantity;
                order.quantity = quantity;
                self.array_dirty = true;
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, order_id: u64) -> Option<Order> {
        let removed = self.orders.remove(&order_id);
        if let Some(order) = removed {
            self.total_quantity -= order.quantity;
            self.order_count -= 1;
            self.own_count -= u32::from(order.is_own_order);
            self.array_dirty = true;
        }
        removed
    }

    /// The level's orders as a contiguous array, ascending by order id.
    ///
    /// Rebuilt from the order map only when a mutation invalidated the
    /// cache.
    pub fn orders_array(&mut self) -> &[Order] {
        if self.array_dirty {
            self.cached_array.clear();
            self.cached_array.extend(self.orders.values().copied());
            self.array_dirty = false;
        }
        &self.cached_array
    }
}

/// Tracks individual orders per price level and keeps the book's aggregate
/// levels in sync.
///
/// Unknown order ids on Modify/Delete are silent no-ops so that out-of-order
/// feed replays cannot wedge the engine. A dangling index entry (id points
/// at a price level that no longer exists) is treated as corruption: the
/// entry is dropped and the operation ends silently.
#[derive(Debug)]
pub struct MboManager {
    grid: TickGrid,
    bids: SortedLevelMap<i64, OrderLevel>,
    asks: SortedLevelMap<i64, OrderLevel>,
    order_index: DashMap<u64, (i64, Side)>,
    bid_map_dirty: bool,
    ask_map_dirty: bool,
    cached_bid_orders: OrdersByPrice,
    cached_ask_orders: OrdersByPrice,
}

impl MboManager {
    /// Create a manager on the same price grid as the book it feeds.
    pub fn new(grid: TickGrid, max_levels: usize) -> Self {
        Self {
            grid,
            bids: SortedLevelMap::with_capacity(max_levels),
            asks: SortedLevelMap::with_capacity(max_levels),
            order_index: DashMap::new(),
            bid_map_dirty: false,
            ask_map_dirty: false,
            cached_bid_orders: BTreeMap::new(),
            cached_ask_orders: BTreeMap::new(),
        }
    }

    /// Total number of tracked orders.
    pub fn order_count(&self) -> usize {
        self.order_index.len()
    }

    /// Number of price levels on a side.
    pub fn level_count(&self, side: Side) -> usize {
        self.side_map(side).len()
    }

    /// Where an order currently rests, if tracked.
    pub fn order_location(&self, order_id: u64) -> Option<(f64, Side)> {
        self.order_index
            .get(&order_id)
            .map(|entry| (self.grid.price_of(entry.0), entry.1))
    }

    /// Look up the order level at a price.
    pub fn try_get_level(&self, price: f64, side: Side) -> Option<&OrderLevel> {
        let ticks = self.grid.to_ticks(price);
        self.side_map(side).try_get(&ticks)
    }

    fn side_map(&self, side: Side) -> &SortedLevelMap<i64, OrderLevel> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_map_mut(&mut self, side: Side) -> &mut SortedLevelMap<i64, OrderLevel> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    fn mark_side_dirty(&mut self, side: Side) {
        match side {
            Side::Bid => self.bid_map_dirty = true,
            Side::Ask => self.ask_map_dirty = true,
        }
    }

    /// Apply one order update, routing by kind.
    ///
    /// A Modify down to a non-positive quantity is routed to the delete
    /// path: a resting order always keeps a positive quantity.
    pub fn process_order_update(
        &mut self,
        book: &mut OrderBook,
        update: &OrderUpdate,
        kind: OrderUpdateKind,
    ) {
        match kind {
            OrderUpdateKind::Add => self.add_order(book, update),
            OrderUpdateKind::Modify if update.quantity <= 0 => {
                self.delete_order(book, update.order_id)
            }
            OrderUpdateKind::Modify => self.modify_order(book, update),
            OrderUpdateKind::Delete => self.delete_order(book, update.order_id),
        }
    }

    fn add_order(&mut self, book: &mut OrderBook, update: &OrderUpdate) {
        let ticks = self.grid.to_ticks(update.price);

        // A duplicate add replaces the live order. When it names a new
        // resting place, the stale order leaves its old level first.
        if let Some(previous) = self.order_index.get(&update.order_id).map(|e| *e) {
            if previous != (ticks, update.side) {
                debug!(
                    "duplicate add for order {} moved {} -> {}",
                    update.order_id,
                    self.grid.price_of(previous.0),
                    update.price
                );
                self.delete_order(book, update.order_id);
            }
        }

        let order = Order {
            order_id: update.order_id,
            quantity: update.quantity,
            priority: update.priority,
            is_own_order: update.is_own_order,
        };

        let map = self.side_map_mut(update.side);
        if map.try_get(&ticks).is_none() {
            map.put(ticks, OrderLevel::new(ticks, update.side));
        }
        let level = map
            .try_get_mut(&ticks)
            .expect("level present after insert");

        level.insert(order);
        let (quantity, count, own) = (
            level.total_quantity(),
            level.order_count(),
            level.has_own_orders(),
        );

        self.order_index
            .insert(update.order_id, (ticks, update.side));
        self.mark_side_dirty(update.side);

        trace!(
            "add order {} {} {}@{}: level qty {quantity}, {count} orders",
            update.order_id, update.side, update.quantity, update.price
        );
        book.update_level_at(ticks, quantity, count, update.side);
        book.mark_own_order_at(ticks, update.side, own);
    }

    fn modify_order(&mut self, book: &mut OrderBook, update: &OrderUpdate) {
        let Some((ticks, side)) = self.order_index.get(&update.order_id).map(|e| *e) else {
            trace!("modify for unknown order {} ignored", update.order_id);
            return;
        };

        let grid = self.grid;
        let Some(level) = self.side_map_mut(side).try_get_mut(&ticks) else {
            debug!(
                "modify for order {} found no level at {}; dropping index entry",
                update.order_id,
                grid.price_of(ticks)
            );
            self.order_index.remove(&update.order_id);
            return;
        };

        // Priority and ownership stay with the resting order; only the
        // quantity moves.
        if !level.apply_quantity(update.order_id, update.quantity) {
            debug!(
                "modify for order {} missing from its level; dropping index entry",
                update.order_id
            );
            self.order_index.remove(&update.order_id);
            return;
        }

        let (quantity, count, own) = (
            level.total_quantity(),
            level.order_count(),
            level.has_own_orders(),
        );
        self.mark_side_dirty(side);

        trace!(
            "modify order {} -> {}: level qty {quantity}",
            update.order_id, update.quantity
        );
        book.update_level_at(ticks, quantity, count, side);
        book.mark_own_order_at(ticks, side, own);
    }

    fn delete_order(&mut self, book: &mut OrderBook, order_id: u64) {
        let Some((_, (ticks, side))) = self.order_index.remove(&order_id) else {
            trace!("delete for unknown order {order_id} ignored");
            return;
        };

        let grid = self.grid;
        let Some(level) = self.side_map_mut(side).try_get_mut(&ticks) else {
            debug!(
                "delete for order {order_id} found no level at {}; index entry dropped",
                grid.price_of(ticks)
            );
            return;
        };

        if level.remove(order_id).is_none() {
            debug!("delete for order {order_id} missing from its level; index entry dropped");
            return;
        }

        let (quantity, count, own) = (
            level.total_quantity(),
            level.order_count(),
            level.has_own_orders(),
        );
        self.mark_side_dirty(side);

        if count == 0 {
            self.side_map_mut(side).remove(&ticks);
            trace!("delete order {order_id} emptied {side} level at {}", grid.price_of(ticks));
            book.update_level_at(ticks, 0, 0, side);
        } else {
            trace!("delete order {order_id}: level qty {quantity}, {count} orders");
            book.update_level_at(ticks, quantity, count, side);
            book.mark_own_order_at(ticks, side, own);
        }
    }

    /// Per-price bid orders keyed by formatted price, rebuilt lazily.
    pub fn bid_orders(&mut self) -> &OrdersByPrice {
        if self.bid_map_dirty {
            Self::rebuild_side_map(&mut self.cached_bid_orders, &mut self.bids, &self.grid);
            self.bid_map_dirty = false;
        }
        &self.cached_bid_orders
    }

    /// Per-price ask orders keyed by formatted price, rebuilt lazily.
    pub fn ask_orders(&mut self) -> &OrdersByPrice {
        if self.ask_map_dirty {
            Self::rebuild_side_map(&mut self.cached_ask_orders, &mut self.asks, &self.grid);
            self.ask_map_dirty = false;
        }
        &self.cached_ask_orders
    }

    fn rebuild_side_map(
        cache: &mut OrdersByPrice,
        map: &mut SortedLevelMap<i64, OrderLevel>,
        grid: &TickGrid,
    ) {
        cache.clear();
        for level in map.values_mut() {
            let key = grid.format_price(level.ticks());
            cache.insert(key, level.orders_array().to_vec());
        }
    }

    /// Drop every tracked order and level, and clear the book.
    pub fn reset(&mut self, book: &mut OrderBook) {
        debug!("mbo manager reset: dropping {} orders", self.order_index.len());
        self.bids.clear();
        self.asks.clear();
        self.order_index.clear();
        self.cached_bid_orders.clear();
        self.cached_ask_orders.clear();
        self.bid_map_dirty = false;
        self.ask_map_dirty = false;
        book.clear();
    }
}
