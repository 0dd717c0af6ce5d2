use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Limit price. Exact decimal so that `99.50` never drifts.
pub type Price = Decimal;

/// Order size in whole units.
pub type Quantity = u64;

/// Represents which side of the market the order is on.
///
/// # Intuition
/// - `Buy` (Bid): The trader wants to purchase the asset. Buy orders are sorted from **highest to lowest price**
///   because a higher price means more willingness to buy, i.e. more aggressive.
/// - `Sell` (Ask): The trader wants to sell the asset. Sell orders are sorted from **lowest to highest price**
///   because a lower price means more willingness to sell.
///
/// This sorting ensures the matching engine always finds the **best price first**:
/// - Buyers match with the **lowest ask**
/// - Sellers match with the **highest bid**
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,  // Bid
    Sell, // Ask
}

impl Side {
    /// The side an incoming order on `self` matches against.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("buy") {
            Ok(Side::Buy)
        } else if s.eq_ignore_ascii_case("sell") {
            Ok(Side::Sell)
        } else {
            Err(format!("unknown side: `{}`", s))
        }
    }
}

/// Engine-assigned order identity. Display only; never used for priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Arrival key. Strictly increasing per engine; the sole tie-breaker at equal price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence(pub u64);

/// What a caller submits: no id, no sequence. Both are assigned on admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub side: Side,
    pub quantity: Quantity,
    pub price: Price,
}

impl NewOrder {
    pub fn new(side: Side, quantity: Quantity, price: Price) -> Self {
        Self {
            side,
            quantity,
            price,
        }
    }

    pub fn buy(quantity: Quantity, price: Price) -> Self {
        Self::new(Side::Buy, quantity, price)
    }

    pub fn sell(quantity: Quantity, price: Price) -> Self {
        Self::new(Side::Sell, quantity, price)
    }
}

/// An admitted order.
///
/// `id`, `side`, `price` and `sequence` are fixed at admission; only
/// `quantity` shrinks as fills happen. A live order always has `quantity > 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub price: Price,
    pub sequence: Sequence,
    pub quantity: Quantity,
}

impl Order {
    pub fn is_filled(&self) -> bool {
        self.quantity == 0
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}@{:.2} (id={})",
            self.side, self.quantity, self.price, self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Sell);
        assert_eq!("Sell".parse::<Side>().unwrap(), Side::Sell);
        assert!("HOLD".parse::<Side>().is_err());
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn order_display_uses_two_decimals() {
        let order = Order {
            id: OrderId(7),
            side: Side::Buy,
            price: dec!(99.5),
            sequence: Sequence(7),
            quantity: 50,
        };
        assert_eq!(order.to_string(), "BUY 50@99.50 (id=7)");
    }
}
