//! Property tests pinning the container, queue and aggregation invariants.

use ladder_rs::{
    LadderConfig, MboManager, OrderBook, OrderUpdate, OrderUpdateKind, PriceLadder,
    PriceLevelUpdate, Side, SortedLevelMap, SpscQueue, TickGrid,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone)]
enum MapOp {
    Put(i64, u64),
    Remove(i64),
}

fn map_ops() -> impl Strategy<Value = Vec<MapOp>> {
    prop::collection::vec(
        prop_oneof![
            (-50i64..50, any::<u64>()).prop_map(|(k, v)| MapOp::Put(k, v)),
            (-50i64..50).prop_map(MapOp::Remove),
        ],
        0..200,
    )
}

proptest! {
    /// The sorted container behaves like a BTreeMap with positional access.
    #[test]
    fn prop_sorted_map_matches_model(ops in map_ops()) {
        let mut map: SortedLevelMap<i64, u64> = SortedLevelMap::new();
        let mut model: BTreeMap<i64, u64> = BTreeMap::new();

        for op in ops {
            match op {
                MapOp::Put(k, v) => {
                    let inserted = map.put(k, v);
                    let was_absent = model.insert(k, v).is_none();
                    prop_assert_eq!(inserted, was_absent);
                }
                MapOp::Remove(k) => {
                    prop_assert_eq!(map.remove(&k), model.remove(&k).is_some());
                }
            }
        }

        prop_assert_eq!(map.len(), model.len());
        let model_keys: Vec<i64> = model.keys().copied().collect();
        prop_assert_eq!(map.keys(), &model_keys[..]);
        for (i, (k, v)) in model.iter().enumerate() {
            prop_assert_eq!(map.get_key_by_index(i), Some(*k));
            prop_assert_eq!(map.get_by_index(i), Some(v));
            prop_assert_eq!(map.try_get(k), Some(v));
        }
        for probe in -60i64..60 {
            let expected_lower = model.range(probe..).count();
            prop_assert_eq!(map.len() - map.lower_bound(&probe), expected_lower);
            let expected_upper = model.range((probe + 1)..).count();
            prop_assert_eq!(map.len() - map.upper_bound(&probe), expected_upper);
        }
    }

    /// Every successful write is read exactly once, in order.
    #[test]
    fn prop_spsc_preserves_fifo(
        ops in prop::collection::vec(any::<bool>(), 0..300),
        capacity_pow in 1u32..8,
    ) {
        let capacity = 1usize << capacity_pow;
        let queue: SpscQueue<u64> = SpscQueue::with_capacity(capacity).unwrap();
        let mut model: VecDeque<u64> = VecDeque::new();
        let mut next_value = 0u64;

        for is_write in ops {
            if is_write {
                let accepted = queue.try_write(next_value);
                if model.len() < capacity - 1 {
                    prop_assert!(accepted);
                    model.push_back(next_value);
                    next_value += 1;
                } else {
                    prop_assert!(!accepted);
                }
            } else {
                prop_assert_eq!(queue.try_read(), model.pop_front());
            }
            prop_assert_eq!(queue.len(), model.len());
            prop_assert!(queue.len() <= capacity - 1);
        }

        while let Some(expected) = model.pop_front() {
            prop_assert_eq!(queue.try_read(), Some(expected));
        }
        prop_assert_eq!(queue.try_read(), None);
    }

    /// Stored levels are always positive-quantity and strictly sorted.
    #[test]
    fn prop_book_levels_stay_sorted_and_positive(
        updates in prop::collection::vec(
            (any::<bool>(), 0i64..200, -100i64..10_000),
            0..500,
        ),
    ) {
        let mut book = OrderBook::new(TickGrid::new(0.01).unwrap(), 256);
        for (is_bid, tick, quantity) in updates {
            let side = if is_bid { Side::Bid } else { Side::Ask };
            let price = 100.00 + tick as f64 * 0.01;
            book.update_level(price, quantity, 1, side);
        }

        for side in [Side::Bid, Side::Ask] {
            let levels = match side {
                Side::Bid => book.top_bids(usize::MAX),
                Side::Ask => book.top_asks(usize::MAX),
            };
            for level in &levels {
                prop_assert!(level.quantity > 0);
            }
            for pair in levels.windows(2) {
                match side {
                    Side::Bid => prop_assert!(pair[0].price > pair[1].price),
                    Side::Ask => prop_assert!(pair[0].price < pair[1].price),
                }
            }
        }
    }

    /// The book mirrors the MBO manager exactly after any op sequence.
    #[test]
    fn prop_mbo_aggregation_invariant(
        ops in prop::collection::vec(
            (0u64..20, any::<bool>(), 0i64..10, 0i64..1_000, 0u8..3),
            0..300,
        ),
    ) {
        let grid = TickGrid::new(0.01).unwrap();
        let mut book = OrderBook::new(grid, 64);
        let mut mbo = MboManager::new(grid, 64);

        for (order_id, is_bid, tick, quantity, kind) in ops {
            let side = if is_bid { Side::Bid } else { Side::Ask };
            let update = OrderUpdate {
                order_id,
                side,
                price: 100.00 + tick as f64 * 0.01,
                quantity: quantity + 1,
                priority: order_id as i64,
                is_own_order: order_id % 3 == 0,
            };
            let kind = match kind {
                0 => OrderUpdateKind::Add,
                1 => OrderUpdateKind::Modify,
                _ => OrderUpdateKind::Delete,
            };
            mbo.process_order_update(&mut book, &update, kind);
        }

        // Every (price, side) present in the manager matches the book, and
        // every book level is backed by a manager level.
        for side in [Side::Bid, Side::Ask] {
            for tick in 0i64..10 {
                let price = 100.00 + tick as f64 * 0.01;
                match (mbo.try_get_level(price, side), book.try_get_level(price, side)) {
                    (Some(level), Some(book_level)) => {
                        prop_assert_eq!(book_level.quantity, level.total_quantity());
                        prop_assert_eq!(book_level.num_orders, level.order_count());
                        prop_assert!(level.order_count() > 0);
                    }
                    (None, None) => {}
                    (mbo_level, book_level) => {
                        prop_assert!(
                            false,
                            "mismatch at {} {}: manager={:?} book={:?}",
                            price,
                            side,
                            mbo_level.map(|l| l.total_quantity()),
                            book_level.map(|l| l.quantity),
                        );
                    }
                }
            }
        }

        // Every indexed order id resolves to a live level holding it.
        for order_id in 0u64..20 {
            if let Some((price, side)) = mbo.order_location(order_id) {
                let level = mbo.try_get_level(price, side);
                prop_assert!(level.is_some());
                prop_assert!(level.unwrap().try_get_order(order_id).is_some());
            }
        }
    }

    /// With fill-empty on, the window covers every tick exactly once, split
    /// at the center rule.
    #[test]
    fn prop_fill_empty_window_is_dense(
        updates in prop::collection::vec(
            (any::<bool>(), 0i64..60, 1i64..1_000),
            0..60,
        ),
        visible in (2usize..80).prop_map(|v| v * 2),
    ) {
        let mut config = LadderConfig::default();
        config.batcher.batch_interval_us = 60_000_000;
        config.batcher.max_batch_size = 1_000_000;
        config.batcher.fill_empty_levels = true;
        config.batcher.visible_levels = visible;
        config.batcher.center_price = Some(100.30);

        let mut ladder = PriceLadder::new(config).unwrap();
        let captured = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&captured);
        ladder.subscribe(std::sync::Arc::new(move |s| sink.lock().unwrap().push(s)));

        for (is_bid, tick, quantity) in updates {
            let side = if is_bid { Side::Bid } else { Side::Ask };
            ladder
                .process_price_level_update(PriceLevelUpdate::new(
                    side,
                    100.00 + tick as f64 * 0.01,
                    quantity,
                    1,
                ))
                .unwrap();
        }
        ladder.flush();

        let snapshots = captured.lock().unwrap();
        let snapshot = snapshots.last().unwrap();
        let half = visible / 2;

        prop_assert_eq!(snapshot.bids.len(), half + 1);
        prop_assert_eq!(snapshot.asks.len(), half);

        // Bids end at the center tick; asks start one tick above it.
        prop_assert!((snapshot.bids.last().unwrap().price - 100.30).abs() < 1e-9);
        prop_assert!((snapshot.asks[0].price - 100.31).abs() < 1e-9);

        let prices: Vec<f64> = snapshot
            .bids
            .iter()
            .chain(snapshot.asks.iter())
            .map(|l| l.price)
            .collect();
        for pair in prices.windows(2) {
            prop_assert!((pair[1] - pair[0] - 0.01).abs() < 1e-9);
        }
    }
}
