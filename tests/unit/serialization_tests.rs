//! Host-boundary serialization: JSON schema, checksum packages and binary
//! update frames.

use ladder_rs::prelude::*;
use ladder_rs::wire;
use std::sync::{Arc, Mutex};

fn ladder_with_capture() -> (PriceLadder, Arc<Mutex<Vec<LadderSnapshot>>>) {
    let config = LadderConfig {
        batcher: BatcherConfig {
            batch_interval_us: 60_000_000,
            max_batch_size: 1_000_000,
            ..BatcherConfig::default()
        },
        ..LadderConfig::default()
    };
    let mut ladder = PriceLadder::new(config).unwrap();
    let captured: Arc<Mutex<Vec<LadderSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    ladder.subscribe(Arc::new(move |snapshot| {
        sink.lock().unwrap().push(snapshot);
    }));
    (ladder, captured)
}

#[test]
fn test_emitted_snapshot_serializes_to_host_schema() {
    let (mut ladder, captured) = ladder_with_capture();
    ladder
        .process_price_level_update(PriceLevelUpdate::new(Side::Bid, 100.00, 1_000, 1))
        .unwrap();
    ladder
        .process_price_level_update(PriceLevelUpdate::new(Side::Ask, 100.01, 1_500, 2))
        .unwrap();
    ladder.flush();

    let snapshots = captured.lock().unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&snapshots[0].to_json().unwrap()).unwrap();

    assert_eq!(json["bestBid"], 100.0);
    assert_eq!(json["bestAsk"], 100.01);
    assert_eq!(json["midPrice"], 100.005);
    assert_eq!(json["structuralChange"], true);
    assert!(json["timestamp"].is_u64());

    let bids = json["bids"].as_array().unwrap();
    assert_eq!(bids.len(), 1);
    assert_eq!(bids[0]["price"], 100.0);
    assert_eq!(bids[0]["quantity"], 1_000);
    assert_eq!(bids[0]["numOrders"], 1);
    assert_eq!(bids[0]["side"], 0);

    let asks = json["asks"].as_array().unwrap();
    assert_eq!(asks[0]["side"], 1);

    let changes = json["dirtyChanges"].as_array().unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0]["isAddition"], true);
    assert_eq!(changes[0]["isRemoval"], false);
}

#[test]
fn test_mbo_snapshot_uses_price_string_keys() {
    let (mut ladder, captured) = ladder_with_capture();
    ladder.set_data_mode(DataMode::Mbo);
    captured.lock().unwrap().clear();

    ladder
        .process_order_update(
            OrderUpdate {
                order_id: 7,
                side: Side::Bid,
                price: 99.50,
                quantity: 25,
                priority: 3,
                is_own_order: true,
            },
            OrderUpdateKind::Add,
        )
        .unwrap();
    ladder.flush();

    let snapshots = captured.lock().unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&snapshots[0].to_json().unwrap()).unwrap();

    let bid_orders = json["bidOrders"].as_object().unwrap();
    let at_level = bid_orders["99.50"].as_array().unwrap();
    assert_eq!(at_level[0]["orderId"], 7);
    assert_eq!(at_level[0]["quantity"], 25);
    assert_eq!(at_level[0]["priority"], 3);
    assert_eq!(at_level[0]["isOwnOrder"], true);

    assert!(json["askOrders"].as_object().unwrap().is_empty());
}

#[test]
fn test_snapshot_package_integrity() {
    let (mut ladder, captured) = ladder_with_capture();
    ladder
        .process_price_level_update(PriceLevelUpdate::new(Side::Bid, 100.00, 1_000, 1))
        .unwrap();
    ladder.flush();

    let snapshot = captured.lock().unwrap()[0].clone();
    let package = SnapshotPackage::new(snapshot).unwrap();
    let json = package.to_json().unwrap();

    let restored = SnapshotPackage::from_json(&json).unwrap();
    let snapshot = restored.into_snapshot().unwrap();
    assert_eq!(snapshot.best_bid, Some(100.00));

    // A mutated payload fails validation.
    let mut tampered = SnapshotPackage::from_json(&json).unwrap();
    tampered.snapshot.best_bid = Some(123.45);
    assert!(tampered.validate().is_err());
}

#[test]
fn test_binary_price_level_feed() {
    let (mut ladder, captured) = ladder_with_capture();

    // A replay buffer of encoded frames, one per update.
    let updates = [
        PriceLevelUpdate::new(Side::Bid, 100.00, 1_000, 1),
        PriceLevelUpdate::new(Side::Ask, 100.01, 1_500, 1),
    ];
    let mut buffer = Vec::new();
    for update in &updates {
        buffer.extend_from_slice(&wire::encode_price_level(update));
    }

    for chunk in buffer.chunks(wire::PRICE_LEVEL_FRAME_LEN) {
        let update = wire::decode_price_level(chunk).unwrap();
        ladder.process_price_level_update(update).unwrap();
    }
    ladder.flush();

    let snapshots = captured.lock().unwrap();
    assert_eq!(snapshots[0].best_bid, Some(100.00));
    assert_eq!(snapshots[0].best_ask, Some(100.01));
}

#[test]
fn test_binary_order_feed() {
    let (mut ladder, captured) = ladder_with_capture();
    ladder.set_data_mode(DataMode::Mbo);
    captured.lock().unwrap().clear();

    let update = OrderUpdate {
        order_id: 11,
        side: Side::Ask,
        price: 100.05,
        quantity: 40,
        priority: 9,
        is_own_order: false,
    };
    let frame = wire::encode_order_update(&update, OrderUpdateKind::Add);
    let (decoded, kind) = wire::decode_order_update(&frame).unwrap();
    ladder.process_order_update(decoded, kind).unwrap();
    ladder.flush();

    let snapshots = captured.lock().unwrap();
    let live: Vec<f64> = snapshots[0]
        .asks
        .iter()
        .filter(|l| l.quantity > 0)
        .map(|l| l.price)
        .collect();
    assert_eq!(live, vec![100.05]);
}

#[test]
fn test_truncated_frames_are_discarded() {
    let update = PriceLevelUpdate::new(Side::Bid, 100.00, 1_000, 1);
    let frame = wire::encode_price_level(&update);
    for len in 0..wire::PRICE_LEVEL_FRAME_LEN {
        assert!(wire::decode_price_level(&frame[..len]).is_none());
    }

    let order = OrderUpdate {
        order_id: 1,
        side: Side::Bid,
        price: 100.00,
        quantity: 1,
        priority: 1,
        is_own_order: false,
    };
    let frame = wire::encode_order_update(&order, OrderUpdateKind::Delete);
    for len in 0..wire::ORDER_UPDATE_FRAME_LEN {
        assert!(wire::decode_order_update(&frame[..len]).is_none());
    }
}

#[test]
fn test_config_round_trips_through_serde() {
    let config = LadderConfig {
        tick_size: 0.25,
        max_levels: 64,
        mode: DataMode::Mbo,
        batcher: BatcherConfig {
            batch_interval_us: 250,
            max_batch_size: 500,
            queue_capacity: 1_024,
            visible_levels: 40,
            fill_empty_levels: true,
            center_price: Some(4_200.00),
            ..BatcherConfig::default()
        },
    };

    let json = serde_json::to_string(&config).unwrap();
    let restored: LadderConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, config);
}
