use std::{cmp::Reverse, collections::BTreeMap, fmt, marker::PhantomData};

use crate::orders::{OrderId, Price, Sequence, Side};

/// How one side of the book ranks its prices.
///
/// The map key is `(O::Key, Sequence)`, so ties on price always fall back to
/// the earlier arrival. Implementors only decide the price direction.
pub trait BookOrdering {
    type Key: Ord + Copy + fmt::Debug;
    const SIDE: Side;

    fn key(price: Price) -> Self::Key;
    fn price(key: Self::Key) -> Price;

    /// Whether a resting order at `resting` can trade with an aggressor
    /// limited at `limit`.
    fn crosses(resting: Price, limit: Price) -> bool;
}

/// Buy side: highest price first.
#[derive(Debug, Clone, Copy)]
pub enum Bids {}

/// Sell side: lowest price first.
#[derive(Debug, Clone, Copy)]
pub enum Asks {}

impl BookOrdering for Bids {
    type Key = Reverse<Price>;
    const SIDE: Side = Side::Buy;

    fn key(price: Price) -> Self::Key {
        Reverse(price)
    }

    fn price(key: Self::Key) -> Price {
        key.0
    }

    // a sell aggressor trades with any bid at or above its limit
    fn crosses(resting: Price, limit: Price) -> bool {
        resting >= limit
    }
}

impl BookOrdering for Asks {
    type Key = Price;
    const SIDE: Side = Side::Sell;

    fn key(price: Price) -> Self::Key {
        price
    }

    fn price(key: Self::Key) -> Price {
        key
    }

    // a buy aggressor trades with any ask at or below its limit
    fn crosses(resting: Price, limit: Price) -> bool {
        resting <= limit
    }
}

/// A slot in a [`SideBook`]: the priority key plus a handle into the
/// engine's order table. Quantities live in the table, never here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookEntry {
    pub price: Price,
    pub sequence: Sequence,
    pub id: OrderId,
}

/// Resting orders for one side, in strict `(price, sequence)` priority.
///
/// Backed by a [`BTreeMap`] so best-order lookup, removal and insertion are
/// all logarithmic, and a full ordered walk is available for snapshots.
/// Keys never change once inserted: re-inserting a partially filled order
/// with its original `(price, sequence)` puts it back exactly where it was.
pub struct SideBook<O: BookOrdering> {
    entries: BTreeMap<(O::Key, Sequence), OrderId>,
    _ordering: PhantomData<O>,
}

impl<O: BookOrdering> SideBook<O> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            _ordering: PhantomData,
        }
    }

    pub fn side(&self) -> Side {
        O::SIDE
    }

    /// The head of the book, without removing it.
    pub fn peek_best(&self) -> Option<BookEntry> {
        self.entries
            .first_key_value()
            .map(|(&(key, sequence), &id)| BookEntry {
                price: O::price(key),
                sequence,
                id,
            })
    }

    /// Removes and returns the head of the book.
    pub fn pop_best(&mut self) -> Option<BookEntry> {
        self.entries
            .pop_first()
            .map(|((key, sequence), id)| BookEntry {
                price: O::price(key),
                sequence,
                id,
            })
    }

    /// Adds an order under its priority key. The caller guarantees the order
    /// is live (`quantity > 0`) and that `sequence` is unique in this book.
    pub fn insert(&mut self, price: Price, sequence: Sequence, id: OrderId) {
        let previous = self.entries.insert((O::key(price), sequence), id);
        debug_assert!(
            previous.is_none(),
            "duplicate priority key {:?} on {} side",
            (price, sequence),
            O::SIDE
        );
    }

    /// Whether the best resting price trades against an aggressor limited at `limit`.
    pub fn best_crosses(&self, limit: Price) -> bool {
        self.peek_best()
            .is_some_and(|best| O::crosses(best.price, limit))
    }

    /// Walks the book in priority order, best first.
    pub fn iter(&self) -> impl Iterator<Item = BookEntry> + '_ {
        self.entries.iter().map(|(&(key, sequence), &id)| BookEntry {
            price: O::price(key),
            sequence,
            id,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<O: BookOrdering> Default for SideBook<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: BookOrdering> fmt::Debug for SideBook<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideBook")
            .field("side", &O::SIDE)
            .field("len", &self.entries.len())
            .finish()
    }
}
