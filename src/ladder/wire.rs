//! Compact little-endian frames for feeding the engine across a host
//! boundary.
//!
//! Every multi-byte field uses an align-1 little-endian representation, so
//! the frames have no padding and can be decoded from arbitrary offsets in
//! a received buffer. Truncated frames are silently discarded; the engine
//! never partially applies a frame.

use zerocopy::byteorder::little_endian::{F64, I32, I64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::ladder::types::{OrderUpdate, OrderUpdateKind, PriceLevelUpdate, Side};

/// Wire size of a price-level frame.
pub const PRICE_LEVEL_FRAME_LEN: usize = 17;

/// Wire size of an order frame without its trailing kind byte.
pub const ORDER_FRAME_LEN: usize = 34;

/// Wire size of a full order-update frame (order frame + kind byte).
pub const ORDER_UPDATE_FRAME_LEN: usize = ORDER_FRAME_LEN + 1;

/// `[side:u8][price:f64][quantity:i32][numOrders:i32]`, little-endian.
///
/// The compact form narrows quantity to 32 bits; feeds with larger
/// aggregates use the structured API instead.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct PriceLevelFrame {
    side: u8,
    price: F64,
    quantity: I32,
    num_orders: I32,
}

/// `{orderId:i64, side:u8, price:f64, quantity:i64, priority:i64,
/// isOwnOrder:u8}`, packed little-endian.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct OrderFrame {
    order_id: I64,
    side: u8,
    price: F64,
    quantity: I64,
    priority: I64,
    is_own_order: u8,
}

const _: () = assert!(size_of::<PriceLevelFrame>() == PRICE_LEVEL_FRAME_LEN);
const _: () = assert!(size_of::<OrderFrame>() == ORDER_FRAME_LEN);

/// Encode a price-level update into its wire frame.
pub fn encode_price_level(update: &PriceLevelUpdate) -> [u8; PRICE_LEVEL_FRAME_LEN] {
    let frame = PriceLevelFrame {
        side: update.side.into(),
        price: F64::new(update.price),
        quantity: I32::new(update.quantity as i32),
        num_orders: I32::new(update.num_orders as i32),
    };

    let mut bytes = [0u8; PRICE_LEVEL_FRAME_LEN];
    bytes.copy_from_slice(frame.as_bytes());
    bytes
}

/// Decode a price-level update from the front of `bytes`.
///
/// Returns `None` for truncated frames or an unknown side discriminant;
/// trailing bytes are ignored.
pub fn decode_price_level(bytes: &[u8]) -> Option<PriceLevelUpdate> {
    let (frame, _) = PriceLevelFrame::read_from_prefix(bytes).ok()?;
    let side = Side::try_from(frame.side).ok()?;

    Some(PriceLevelUpdate {
        side,
        price: frame.price.get(),
        quantity: i64::from(frame.quantity.get()),
        num_orders: frame.num_orders.get().max(0) as u32,
    })
}

/// Encode an order update and its kind into a wire frame.
pub fn encode_order_update(
    update: &OrderUpdate,
    kind: OrderUpdateKind,
) -> [u8; ORDER_UPDATE_FRAME_LEN] {
    let frame = OrderFrame {
        order_id: I64::new(update.order_id as i64),
        side: update.side.into(),
        price: F64::new(update.price),
        quantity: I64::new(update.quantity),
        priority: I64::new(update.priority),
        is_own_order: u8::from(update.is_own_order),
    };

    let mut bytes = [0u8; ORDER_UPDATE_FRAME_LEN];
    bytes[..ORDER_FRAME_LEN].copy_from_slice(frame.as_bytes());
    bytes[ORDER_FRAME_LEN] = kind.into();
    bytes
}

/// Decode an order update and its kind from the front of `bytes`.
///
/// Returns `None` for truncated frames or unknown side/kind
/// discriminants; trailing bytes are ignored.
pub fn decode_order_update(bytes: &[u8]) -> Option<(OrderUpdate, OrderUpdateKind)> {
    if bytes.len() < ORDER_UPDATE_FRAME_LEN {
        return None;
    }

    let (frame, rest) = OrderFrame::read_from_prefix(bytes).ok()?;
    let side = Side::try_from(frame.side).ok()?;
    let kind = OrderUpdateKind::try_from(rest[0]).ok()?;

    Some((
        OrderUpdate {
            order_id: frame.order_id.get() as u64,
            side,
            price: frame.price.get(),
            quantity: frame.quantity.get(),
            priority: frame.priority.get(),
            is_own_order: frame.is_own_order != 0,
        },
        kind,
    ))
}
