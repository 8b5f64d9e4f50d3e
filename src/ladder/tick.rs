//! Fixed-point price grid for tick-aligned books.
//!
//! Prices cross the API boundary as `f64`, but the book keys every level by
//! an integer tick count so that comparisons, windows and neighbor walks are
//! exact. The grid converts in both directions and formats prices to tick
//! precision for string-keyed maps.

use crate::ladder::error::LadderError;

/// Maximum number of decimal places a tick size may carry.
///
/// Enough for any listed instrument (crypto venues quote at most 9-10
/// decimals); bounds the precision used when formatting price keys.
const MAX_DECIMALS: u32 = 12;

/// A validated tick size plus its derived decimal precision.
///
/// Construction fails for non-positive or non-finite sizes. The grid is
/// `Copy` so components that need conversions (book, manager, batcher) each
/// hold their own.
///
/// # Examples
/// ```
/// use ladder_rs::TickGrid;
///
/// let grid = TickGrid::new(0.01).unwrap();
/// assert_eq!(grid.to_ticks(100.00), 10_000);
/// assert_eq!(grid.price_of(10_001), 100.01);
/// assert_eq!(grid.format_price(9_999), "99.99");
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickGrid {
    size: f64,
    decimals: u32,
}

impl TickGrid {
    /// Create a grid for the given tick size.
    ///
    /// # Errors
    /// Returns [`LadderError::InvalidTickSize`] if `size` is not a finite
    /// positive number.
    pub fn new(size: f64) -> Result<Self, LadderError> {
        if !size.is_finite() || size <= 0.0 {
            return Err(LadderError::InvalidTickSize { size });
        }

        Ok(Self {
            size,
            decimals: infer_decimals(size),
        })
    }

    /// The tick size this grid was built with.
    #[inline]
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Number of decimal places implied by the tick size.
    #[inline]
    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Convert a price to its nearest tick count.
    ///
    /// Rounding off-grid input is the ingestion layer's contract; debug
    /// builds assert the price was already tick-aligned.
    #[inline]
    pub fn to_ticks(&self, price: f64) -> i64 {
        let ticks = (price / self.size).round();
        debug_assert!(
            (price - ticks * self.size).abs() < self.size * 1e-6,
            "price {price} is not a multiple of tick size {}",
            self.size
        );
        ticks as i64
    }

    /// Convert a price to the highest tick at or below it.
    ///
    /// Used for deriving the snapshot center from a mid price, which lies
    /// between ticks whenever the spread spans an odd number of them.
    /// Tick-aligned input snaps exactly even when the division lands a hair
    /// under the integer.
    #[inline]
    pub fn floor_to_ticks(&self, price: f64) -> i64 {
        let ratio = price / self.size;
        let nearest = ratio.round();
        if (ratio - nearest).abs() < 1e-6 {
            nearest as i64
        } else {
            ratio.floor() as i64
        }
    }

    /// The price at a tick count, re-rounded to the grid's decimal precision
    /// so repeated tick walks cannot accumulate float drift.
    #[inline]
    pub fn price_of(&self, ticks: i64) -> f64 {
        let raw = ticks as f64 * self.size;
        let scale = 10f64.powi(self.decimals as i32);
        (raw * scale).round() / scale
    }

    /// Format the price at a tick count with exactly the grid's precision.
    ///
    /// Produces deterministic string keys for price-keyed order maps,
    /// avoiding float-key collisions in serialized snapshots.
    pub fn format_price(&self, ticks: i64) -> String {
        format!(
            "{:.prec$}",
            self.price_of(ticks),
            prec = self.decimals as usize
        )
    }
}

/// Smallest decimal precision that round-trips the tick size.
fn infer_decimals(size: f64) -> u32 {
    for decimals in 0..=MAX_DECIMALS {
        let scale = 10f64.powi(decimals as i32);
        let scaled = size * scale;
        if (scaled - scaled.round()).abs() < 1e-9 {
            return decimals;
        }
    }
    MAX_DECIMALS
}
