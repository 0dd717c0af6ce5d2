use serde::{Deserialize, Serialize};

use crate::orders::{OrderId, Price, Quantity};

/// A trade represents a single match between the incoming order and one resting order.
///
/// # Terminology
/// - **Maker**: The order that was already resting in the book (providing liquidity).
/// - **Taker**: The incoming order that triggered the trade (the aggressor).
///
/// # Behavior
/// - The trade always executes at the **maker's price** (book price), so the taker
///   gets any price improvement.
/// - Partial fills may occur: one submission can produce several trades.
///
/// Example:
/// - A buy limited at 50 (taker) meets a resting sell at 49 (maker).
/// - A trade is created at price 49.
///
/// Trades are not stored by the engine; they are handed back to the caller in the
/// order they were generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub quantity: Quantity,
    pub price: Price,
    pub maker_id: OrderId,
    pub taker_id: OrderId,
}
