use crate::{
    errors::{EngineError, EngineResult},
    orders::{NewOrder, Order, OrderId, Price, Quantity, Sequence, Side},
    side_book::{Asks, Bids, BookEntry, BookOrdering, SideBook},
    trade::Trade,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::{collections::HashMap, fmt};
use tracing::debug;

/// An [`OrderBook`] is the matching engine for one instrument.
///
/// It owns every live order in a single table keyed by [`OrderId`], and two
/// [`SideBook`]s that hold only priority keys pointing into that table:
/// - `bids` (buy orders), best = highest price, then earliest arrival
/// - `asks` (sell orders), best = lowest price, then earliest arrival
///
/// Ids and sequences are both drawn from one admission counter owned by this
/// instance, so two books never share identity space and a later id always
/// has a later sequence.
pub struct OrderBook {
    bids: SideBook<Bids>,
    asks: SideBook<Asks>,
    orders: HashMap<OrderId, Order>,
    next_id: u64,
}

/// Result of admitting one order: its id, the trades it produced, and the
/// quantity left resting on its own side (0 if fully filled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Execution {
    pub order_id: OrderId,
    pub trades: Vec<Trade>,
    pub resting: Quantity,
}

/// Read-only, fully ordered copy of both sides at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookSnapshot {
    /// Highest price first, then earliest arrival.
    pub bids: Vec<Order>,
    /// Lowest price first, then earliest arrival.
    pub asks: Vec<Order>,
}

/// Matches an **incoming order** against one side of the book, producing a
/// series of [`Trade`]s.
///
/// # Parameters
/// - `incoming`: the aggressor; its `quantity` is decremented in place.
/// - `book_side`: the contra side (`asks` for a buy, `bids` for a sell).
/// - `orders`: the order table both sides point into.
///
/// # Notes
/// - Each step pops the best resting order and fills
///   `min(incoming.quantity, resting.quantity)`, so neither side is overfilled.
/// - The trade executes at the **resting** order's price.
/// - A resting order that survives a partial fill goes back under its original
///   `(price, sequence)` key, i.e. at the front of its level, not the back.
/// - A resting order that reaches zero is dropped from the table for good.
///
/// # Example
/// - A buy for 12 limited at 50 meets asks `5@49` then `10@50`.
/// - The engine fills 5 at 49, then 7 at 50, leaving `3@50` resting.
fn match_incoming_side<O: BookOrdering>(
    incoming: &mut Order,
    book_side: &mut SideBook<O>,
    orders: &mut HashMap<OrderId, Order>,
) -> Vec<Trade> {
    let mut trades = Vec::new();

    while incoming.quantity > 0 && book_side.best_crosses(incoming.price) {
        let Some(best) = book_side.pop_best() else {
            break;
        };
        // every key in a side book points at a live row in `orders`
        let resting = orders
            .get_mut(&best.id)
            .unwrap_or_else(|| unreachable!("book entry {} has no order", best.id));

        let trade_qty = incoming.quantity.min(resting.quantity);
        incoming.quantity -= trade_qty;
        resting.quantity -= trade_qty;

        trades.push(Trade {
            quantity: trade_qty,
            price: best.price,
            maker_id: best.id,
            taker_id: incoming.id,
        });

        if resting.is_filled() {
            debug!(maker = %best.id, "resting order filled");
            orders.remove(&best.id);
        } else {
            book_side.insert(best.price, best.sequence, best.id);
        }
    }

    trades
}

fn validate(request: &NewOrder) -> EngineResult<()> {
    if request.quantity == 0 {
        return Err(EngineError::invalid("quantity must be > 0"));
    }
    if request.price <= Decimal::ZERO {
        return Err(EngineError::invalid("price must be > 0"));
    }
    Ok(())
}

impl OrderBook {
    /// Creates a new, empty [`OrderBook`], with no active bids or asks.
    pub fn new() -> Self {
        Self {
            bids: SideBook::new(),
            asks: SideBook::new(),
            orders: HashMap::new(),
            next_id: 0,
        }
    }

    /// Submits a limit order and returns the trades it generated, in order.
    ///
    /// Any unfilled remainder rests on the order's own side. Orders with a
    /// zero quantity or a non-positive price are rejected before any state
    /// changes.
    pub fn submit(&mut self, request: NewOrder) -> EngineResult<Vec<Trade>> {
        self.execute(request).map(|execution| execution.trades)
    }

    /// Same as [`OrderBook::submit`], but also reports the assigned id and
    /// the quantity left resting.
    pub fn execute(&mut self, request: NewOrder) -> EngineResult<Execution> {
        validate(&request)?;
        let mut incoming = self.admit(request);
        debug!(
            id = %incoming.id,
            side = %incoming.side,
            quantity = incoming.quantity,
            price = %incoming.price,
            "matching incoming order"
        );

        let trades = match incoming.side {
            // Buy => match asks (lowest first)
            Side::Buy => match_incoming_side(&mut incoming, &mut self.asks, &mut self.orders),
            // Sell => match bids (highest first)
            Side::Sell => match_incoming_side(&mut incoming, &mut self.bids, &mut self.orders),
        };

        let order_id = incoming.id;
        let resting = incoming.quantity;
        if resting > 0 {
            debug!(id = %order_id, resting, "adding remainder to book");
            self.rest(incoming);
        }
        debug!(id = %order_id, trades = trades.len(), resting, "order processed");

        Ok(Execution {
            order_id,
            trades,
            resting,
        })
    }

    /// Ordered view of both sides. Does not mutate anything.
    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            bids: self.resolve(self.bids.iter()),
            asks: self.resolve(self.asks.iter()),
        }
    }

    /// Highest resting bid.
    pub fn best_bid(&self) -> Option<&Order> {
        self.bids
            .peek_best()
            .and_then(|entry| self.orders.get(&entry.id))
    }

    /// Lowest resting ask.
    pub fn best_ask(&self) -> Option<&Order> {
        self.asks
            .peek_best()
            .and_then(|entry| self.orders.get(&entry.id))
    }

    /// `best ask - best bid`, when both sides are populated.
    pub fn spread(&self) -> Option<Price> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }

    /// Looks up a resting order by id.
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Number of resting orders across both sides.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn admit(&mut self, request: NewOrder) -> Order {
        let order = Order {
            id: OrderId(self.next_id),
            side: request.side,
            price: request.price,
            sequence: Sequence(self.next_id),
            quantity: request.quantity,
        };
        self.next_id += 1;
        order
    }

    fn rest(&mut self, order: Order) {
        match order.side {
            Side::Buy => self.bids.insert(order.price, order.sequence, order.id),
            Side::Sell => self.asks.insert(order.price, order.sequence, order.id),
        }
        self.orders.insert(order.id, order);
    }

    fn resolve(&self, entries: impl Iterator<Item = BookEntry>) -> Vec<Order> {
        entries
            .filter_map(|entry| self.orders.get(&entry.id).cloned())
            .collect()
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderBook")
            .field("bids", &self.bids.len())
            .field("asks", &self.asks.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

fn write_side(f: &mut fmt::Formatter<'_>, orders: &[Order]) -> fmt::Result {
    f.write_str("[")?;
    for (i, order) in orders.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", order)?;
    }
    f.write_str("]")
}

impl fmt::Display for BookSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BUYS: ")?;
        write_side(f, &self.bids)?;
        f.write_str("\nSELLS: ")?;
        write_side(f, &self.asks)
    }
}

//tests
#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn buy(quantity: Quantity, price: Price) -> NewOrder {
        NewOrder::buy(quantity, price)
    }

    fn sell(quantity: Quantity, price: Price) -> NewOrder {
        NewOrder::sell(quantity, price)
    }

    fn levels(orders: &[Order]) -> Vec<(Quantity, Price)> {
        orders.iter().map(|o| (o.quantity, o.price)).collect()
    }

    fn fills(trades: &[Trade]) -> Vec<(Quantity, Price)> {
        trades.iter().map(|t| (t.quantity, t.price)).collect()
    }

    /// Resting asks 5@49 then 10@50; a buy 12@50 sweeps both levels.
    #[test]
    fn test_buy_sweeps_two_ask_levels() {
        let mut ob = OrderBook::new();
        ob.submit(sell(5, dec!(49))).unwrap();
        ob.submit(sell(10, dec!(50))).unwrap();

        let trades = ob.submit(buy(12, dec!(50))).unwrap();

        assert_eq!(fills(&trades), vec![(5, dec!(49)), (7, dec!(50))]);
        let snap = ob.snapshot();
        assert!(snap.bids.is_empty());
        assert_eq!(levels(&snap.asks), vec![(3, dec!(50))]);
        // the survivor is the original 10@50, still holding its first key
        assert_eq!(snap.asks[0].id, OrderId(1));
        assert_eq!(snap.asks[0].sequence, Sequence(1));
    }

    /// An empty book rests the order without trades.
    #[test]
    fn test_no_match_rests_order() {
        let mut ob = OrderBook::new();

        let trades = ob.submit(buy(10, dec!(20))).unwrap();

        assert!(trades.is_empty());
        let snap = ob.snapshot();
        assert_eq!(levels(&snap.bids), vec![(10, dec!(20))]);
        assert!(snap.asks.is_empty());
    }

    /// Equal-price bids fill in arrival order, and the partially filled one keeps its place.
    #[test]
    fn test_fifo_within_price_level() {
        let mut ob = OrderBook::new();
        ob.submit(buy(10, dec!(30))).unwrap();
        ob.submit(buy(10, dec!(30))).unwrap();

        let trades = ob.submit(sell(15, dec!(30))).unwrap();

        assert_eq!(fills(&trades), vec![(10, dec!(30)), (5, dec!(30))]);
        assert_eq!(trades[0].maker_id, OrderId(0));
        assert_eq!(trades[1].maker_id, OrderId(1));
        assert!(trades.iter().all(|t| t.taker_id == OrderId(2)));

        let snap = ob.snapshot();
        assert_eq!(levels(&snap.bids), vec![(5, dec!(30))]);
        assert_eq!(snap.bids[0].id, OrderId(1));
        assert!(snap.asks.is_empty());

        // a later bid at the same price queues behind the survivor
        ob.submit(buy(7, dec!(30))).unwrap();
        let trades = ob.submit(sell(6, dec!(30))).unwrap();
        assert_eq!(trades[0].maker_id, OrderId(1));
        assert_eq!(trades[0].quantity, 5);
        assert_eq!(trades[1].maker_id, OrderId(3));
        assert_eq!(trades[1].quantity, 1);
    }

    #[test]
    fn test_invalid_orders_leave_book_unchanged() {
        let mut ob = OrderBook::new();
        ob.submit(buy(10, dec!(30))).unwrap();
        ob.submit(sell(4, dec!(31))).unwrap();
        let before = ob.snapshot();

        let err = ob.submit(buy(0, dec!(31))).unwrap_err();
        assert_eq!(err, EngineError::invalid("quantity must be > 0"));
        let err = ob.submit(sell(5, dec!(0))).unwrap_err();
        assert_eq!(err, EngineError::invalid("price must be > 0"));
        let err = ob.submit(sell(5, dec!(-1.5))).unwrap_err();
        assert_eq!(err.to_string(), "price must be > 0");

        assert_eq!(ob.snapshot(), before);
        // rejected orders never consumed an id
        let execution = ob.execute(buy(1, dec!(1))).unwrap();
        assert_eq!(execution.order_id, OrderId(2));
    }

    /// Execution price is the resting price even when the aggressor would pay more.
    #[test]
    fn test_crossing_buy_gets_resting_price() {
        let mut ob = OrderBook::new();
        ob.submit(sell(5, dec!(105))).unwrap();

        let trades = ob.submit(buy(3, dec!(110))).unwrap();

        assert_eq!(fills(&trades), vec![(3, dec!(105))]);
        assert_eq!(levels(&ob.snapshot().asks), vec![(2, dec!(105))]);
        assert!(ob.snapshot().bids.is_empty());
    }

    #[test]
    fn test_crossing_sell_gets_resting_price() {
        let mut ob = OrderBook::new();
        ob.submit(buy(5, dec!(100))).unwrap();

        let trades = ob.submit(sell(4, dec!(90))).unwrap();

        assert_eq!(fills(&trades), vec![(4, dec!(100))]);
        assert_eq!(levels(&ob.snapshot().bids), vec![(1, dec!(100))]);
        assert!(ob.snapshot().asks.is_empty());
    }

    #[test]
    fn test_sell_walks_bids_highest_first_and_rests_remainder() {
        let mut ob = OrderBook::new();
        ob.submit(buy(4, dec!(100))).unwrap();
        ob.submit(buy(3, dec!(102))).unwrap();
        ob.submit(buy(8, dec!(95))).unwrap();

        let execution = ob.execute(sell(10, dec!(99))).unwrap();

        assert_eq!(
            fills(&execution.trades),
            vec![(3, dec!(102)), (4, dec!(100))]
        );
        assert_eq!(execution.resting, 3);
        let snap = ob.snapshot();
        assert_eq!(levels(&snap.bids), vec![(8, dec!(95))]);
        assert_eq!(levels(&snap.asks), vec![(3, dec!(99))]);
    }

    #[test]
    fn test_exact_match_empties_both_sides() {
        let mut ob = OrderBook::new();
        ob.submit(sell(5, dec!(100))).unwrap();

        let execution = ob.execute(buy(5, dec!(100))).unwrap();

        assert_eq!(fills(&execution.trades), vec![(5, dec!(100))]);
        assert_eq!(execution.resting, 0);
        assert!(ob.is_empty());
        assert_eq!(ob.snapshot(), BookSnapshot::default());
    }

    #[test]
    fn test_non_crossing_limit_rests_on_own_side() {
        let mut ob = OrderBook::new();
        ob.submit(sell(5, dec!(101))).unwrap();

        let trades = ob.submit(buy(5, dec!(100.99))).unwrap();

        assert!(trades.is_empty());
        assert_eq!(ob.best_bid().unwrap().price, dec!(100.99));
        assert_eq!(ob.best_ask().unwrap().price, dec!(101));
        assert_eq!(ob.spread(), Some(dec!(0.01)));
        assert_eq!(ob.len(), 2);
    }

    #[test]
    fn test_snapshot_orders_both_sides() {
        let mut ob = OrderBook::new();
        ob.submit(buy(1, dec!(10))).unwrap();
        ob.submit(buy(2, dec!(12))).unwrap();
        ob.submit(buy(3, dec!(10))).unwrap();
        ob.submit(sell(4, dec!(20))).unwrap();
        ob.submit(sell(5, dec!(15))).unwrap();
        ob.submit(sell(6, dec!(20))).unwrap();

        let snap = ob.snapshot();

        assert_eq!(
            levels(&snap.bids),
            vec![(2, dec!(12)), (1, dec!(10)), (3, dec!(10))]
        );
        assert_eq!(
            levels(&snap.asks),
            vec![(5, dec!(15)), (4, dec!(20)), (6, dec!(20))]
        );
        assert_eq!(
            snap.to_string(),
            "BUYS: [BUY 2@12.00 (id=1), BUY 1@10.00 (id=0), BUY 3@10.00 (id=2)]\n\
             SELLS: [SELL 5@15.00 (id=4), SELL 4@20.00 (id=3), SELL 6@20.00 (id=5)]"
        );
    }

    #[test]
    fn test_filled_orders_leave_the_table() {
        let mut ob = OrderBook::new();
        ob.submit(sell(2, dec!(10))).unwrap();
        ob.submit(sell(2, dec!(11))).unwrap();

        ob.submit(buy(3, dec!(11))).unwrap();

        assert!(ob.order(OrderId(0)).is_none());
        assert_eq!(ob.order(OrderId(1)).unwrap().quantity, 1);
        // the aggressor was fully filled and never rested
        assert!(ob.order(OrderId(2)).is_none());
        assert_eq!(ob.len(), 1);
    }

    #[test]
    fn test_separate_books_have_separate_ids() {
        let mut a = OrderBook::new();
        let mut b = OrderBook::new();
        a.submit(buy(1, dec!(1))).unwrap();
        a.submit(buy(1, dec!(1))).unwrap();

        let execution = b.execute(buy(1, dec!(1))).unwrap();

        assert_eq!(execution.order_id, OrderId(0));
    }

    #[test]
    fn test_sequence_follows_admission_order() {
        let mut ob = OrderBook::new();
        ob.submit(buy(1, dec!(10))).unwrap();
        ob.submit(buy(0, dec!(10))).unwrap_err();
        ob.submit(sell(1, dec!(20))).unwrap();
        ob.submit(buy(1, dec!(10))).unwrap();

        let snap = ob.snapshot();
        let admitted: Vec<_> = snap.bids.iter().chain(&snap.asks).collect();
        assert_eq!(admitted.len(), 3);
        for order in admitted {
            assert_eq!(order.sequence.0, order.id.0);
        }
        assert_eq!(snap.bids[1].sequence, Sequence(2));
    }

    #[test]
    #[should_panic(expected = "book entry 9 has no order")]
    fn test_book_entry_without_order_is_a_broken_invariant() {
        let mut asks = SideBook::<Asks>::new();
        asks.insert(dec!(10), Sequence(9), OrderId(9));
        let mut incoming = Order {
            id: OrderId(10),
            side: Side::Buy,
            price: dec!(10),
            sequence: Sequence(10),
            quantity: 1,
        };

        match_incoming_side(&mut incoming, &mut asks, &mut HashMap::new());
    }
}
