//! Channel bridges handing snapshots to host event loops.
//!
//! The engine delivers snapshots synchronously on the flushing thread.
//! Hosts that render or replay elsewhere attach one of these bridges as
//! the subscriber and drain the receiving end at their own pace; snapshots
//! are owned values, so crossing threads is free of aliasing concerns.

use std::sync::Arc;
use tracing::warn;

use crate::ladder::batcher::SnapshotListener;
use crate::ladder::snapshot::LadderSnapshot;

/// Bridge snapshots into a standard-library channel.
///
/// The channel is unbounded; a stalled consumer grows it rather than
/// blocking the flush path. Snapshots emitted after the receiver is
/// dropped are discarded with a warning.
///
/// # Examples
/// ```
/// use ladder_rs::bridge;
/// use ladder_rs::{LadderConfig, PriceLadder, PriceLevelUpdate, Side};
///
/// let (listener, snapshots) = bridge::std_channel();
/// let mut ladder = PriceLadder::new(LadderConfig::default()).unwrap();
/// ladder.subscribe(listener);
///
/// ladder
///     .process_price_level_update(PriceLevelUpdate::new(Side::Bid, 100.00, 500, 1))
///     .unwrap();
/// ladder.flush();
///
/// let snapshot = snapshots.try_recv().unwrap();
/// assert_eq!(snapshot.best_bid, Some(100.00));
/// ```
pub fn std_channel() -> (SnapshotListener, std::sync::mpsc::Receiver<LadderSnapshot>) {
    let (sender, receiver) = std::sync::mpsc::channel();

    let listener: SnapshotListener = Arc::new(move |snapshot: LadderSnapshot| {
        if sender.send(snapshot).is_err() {
            warn!("snapshot receiver dropped; discarding snapshot");
        }
    });

    (listener, receiver)
}

/// Bridge snapshots into a bounded tokio channel.
///
/// Uses `try_send` so the flush path never awaits: when the consumer falls
/// `capacity` snapshots behind, the newest snapshot is dropped with a
/// warning. Ladder consumers only care about the latest state, so dropped
/// intermediates are repainted by the next flush.
pub fn tokio_channel(
    capacity: usize,
) -> (SnapshotListener, tokio::sync::mpsc::Receiver<LadderSnapshot>) {
    let (sender, receiver) = tokio::sync::mpsc::channel(capacity);

    let listener: SnapshotListener = Arc::new(move |snapshot: LadderSnapshot| {
        use tokio::sync::mpsc::error::TrySendError;

        match sender.try_send(snapshot) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("snapshot channel full; dropping snapshot");
            }
            Err(TrySendError::Closed(_)) => {
                warn!("snapshot receiver dropped; discarding snapshot");
            }
        }
    });

    (listener, receiver)
}
