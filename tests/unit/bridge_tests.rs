//! Tests for the std and tokio snapshot channel bridges.

use ladder_rs::bridge;
use ladder_rs::prelude::*;

fn manual_config() -> LadderConfig {
    LadderConfig {
        batcher: BatcherConfig {
            batch_interval_us: 60_000_000,
            max_batch_size: 1_000_000,
            ..BatcherConfig::default()
        },
        ..LadderConfig::default()
    }
}

#[test]
fn test_std_bridge_end_to_end() {
    let (listener, snapshots) = bridge::std_channel();
    let mut ladder = PriceLadder::new(manual_config()).unwrap();
    ladder.subscribe(listener);

    ladder
        .process_price_level_update(PriceLevelUpdate::new(Side::Bid, 100.00, 500, 1))
        .unwrap();
    ladder.flush();
    ladder
        .process_price_level_update(PriceLevelUpdate::new(Side::Bid, 100.00, 0, 0))
        .unwrap();
    ladder.flush();

    let first = snapshots.try_recv().unwrap();
    assert_eq!(first.best_bid, Some(100.00));
    assert!(first.structural_change);

    let second = snapshots.try_recv().unwrap();
    assert_eq!(second.best_bid, None);
    assert!(second.structural_change);

    assert!(snapshots.try_recv().is_err());
}

#[tokio::test]
async fn test_tokio_bridge_end_to_end() {
    let (listener, mut snapshots) = bridge::tokio_channel(16);

    // The engine flushes on a blocking thread; the host task awaits
    // snapshots.
    let handle = tokio::task::spawn_blocking(move || {
        let mut ladder = PriceLadder::new(manual_config()).unwrap();
        ladder.subscribe(listener);
        for i in 0..3 {
            ladder
                .process_price_level_update(PriceLevelUpdate::new(
                    Side::Ask,
                    101.00 + i as f64 * 0.01,
                    100,
                    1,
                ))
                .unwrap();
            ladder.flush();
        }
    });

    let mut received = 0;
    while let Some(snapshot) = snapshots.recv().await {
        received += 1;
        assert_eq!(snapshot.best_ask, Some(101.00));
        if received == 3 {
            break;
        }
    }
    assert_eq!(received, 3);

    handle.await.unwrap();
}
