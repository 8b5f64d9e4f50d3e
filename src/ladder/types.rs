//! Core market-data types shared across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The side of the book an update or level belongs to.
///
/// Serialized as `0` (bid) / `1` (ask) to match the host snapshot schema and
/// the binary frame layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Side {
    /// Buy side; best bid is the highest price.
    Bid,
    /// Sell side; best ask is the lowest price.
    Ask,
}

impl Side {
    /// The opposite side.
    #[inline]
    pub fn opposite(&self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl From<Side> for u8 {
    fn from(side: Side) -> u8 {
        match side {
            Side::Bid => 0,
            Side::Ask => 1,
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Side::Bid),
            1 => Ok(Side::Ask),
            other => Err(format!("invalid side discriminant: {other}")),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "BID"),
            Side::Ask => write!(f, "ASK"),
        }
    }
}

/// An aggregated price-level update from the feed.
///
/// `quantity` is an absolute replacement, not a delta: zero removes the
/// level. Negative input is coerced to removal by the book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceLevelUpdate {
    /// Book side the level belongs to.
    pub side: Side,
    /// Level price; must be tick-aligned by the ingestion layer.
    pub price: f64,
    /// New absolute quantity at the price; `0` removes the level.
    pub quantity: i64,
    /// Number of resting orders behind the aggregate.
    pub num_orders: u32,
}

impl PriceLevelUpdate {
    /// Convenience constructor used heavily by tests and replay tools.
    pub fn new(side: Side, price: f64, quantity: i64, num_orders: u32) -> Self {
        Self {
            side,
            price,
            quantity,
            num_orders,
        }
    }
}

/// A single resting order tracked in MBO mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Feed-assigned unique identifier.
    pub order_id: u64,
    /// Remaining quantity; always positive while the order is resting.
    pub quantity: i64,
    /// Venue-assigned time priority.
    pub priority: i64,
    /// Whether this order belongs to the local trader.
    pub is_own_order: bool,
}

/// A market-by-order update from the feed, paired with an
/// [`OrderUpdateKind`] at the queueing boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    /// Feed-assigned unique identifier.
    pub order_id: u64,
    /// Book side of the order.
    pub side: Side,
    /// Order price; must be tick-aligned by the ingestion layer.
    pub price: f64,
    /// Absolute order quantity.
    pub quantity: i64,
    /// Venue-assigned time priority.
    pub priority: i64,
    /// Whether this order belongs to the local trader.
    pub is_own_order: bool,
}

/// The operation an [`OrderUpdate`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum OrderUpdateKind {
    /// A new resting order.
    Add,
    /// Quantity change on a resting order; priority is preserved.
    Modify,
    /// Removal of a resting order.
    Delete,
}

impl From<OrderUpdateKind> for u8 {
    fn from(kind: OrderUpdateKind) -> u8 {
        match kind {
            OrderUpdateKind::Add => 0,
            OrderUpdateKind::Modify => 1,
            OrderUpdateKind::Delete => 2,
        }
    }
}

impl TryFrom<u8> for OrderUpdateKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OrderUpdateKind::Add),
            1 => Ok(OrderUpdateKind::Modify),
            2 => Ok(OrderUpdateKind::Delete),
            other => Err(format!("invalid order update kind: {other}")),
        }
    }
}

impl fmt::Display for OrderUpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderUpdateKind::Add => write!(f, "ADD"),
            OrderUpdateKind::Modify => write!(f, "MODIFY"),
            OrderUpdateKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// A recorded per-level mutation since the last flush.
///
/// `is_addition` and `is_removal` are mutually exclusive; both `false` means
/// a quantity or order-count change on an existing level. Presentation
/// layers use these to redraw only affected rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirtyLevelChange {
    /// Price of the affected level.
    pub price: f64,
    /// Side of the affected level.
    pub side: Side,
    /// The level was removed from the book in this batch.
    pub is_removal: bool,
    /// The level was inserted into the book in this batch.
    pub is_addition: bool,
}

/// Which downstream consumer the batcher drains into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataMode {
    /// Aggregated price-level updates applied directly to the book.
    #[default]
    PriceLevel,
    /// Individual-order updates routed through the MBO manager.
    Mbo,
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataMode::PriceLevel => write!(f, "price-level"),
            DataMode::Mbo => write!(f, "mbo"),
        }
    }
}
