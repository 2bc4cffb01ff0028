//! Stream payload codec.

use crate::{OrdersResult, Order, ValidateExt};

/// Parses a raw stream payload into an [`Order`] and checks required fields.
///
/// Any failure is an [`crate::OrdersError::InvalidMessage`]: the payload can never
/// be applied no matter how often it is redelivered.
pub fn parse_and_validate(raw: &[u8]) -> OrdersResult<Order> {
    let order: Order = serde_json::from_slice(raw)?;
    order.validate_message()?;
    Ok(order)
}
