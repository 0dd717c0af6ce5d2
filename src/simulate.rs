//! Synthetic load and file replay for the matching engine.
//!
//! ## Components
//!
//! - `OrderGenerator`: an endless stream of random limit orders.
//!   - side: Buy or Sell with equal probability
//!   - quantity: uniform in `1..=1000`
//!   - price: uniform in `[10.00, 100.00)`, two decimal places
//! - `run_benchmark(n, seed)`: pushes `n` generated orders through a fresh
//!   [`OrderBook`] and reports throughput.
//! - `replay(input, book, out)`: feeds an order file (`SIDE QTY@PRICE` per
//!   line) through a book, writing `TRADE` lines as they happen and the final
//!   book at the end. Bad lines are reported and skipped.
//!
//! Pass a seed to make a run reproducible; without one the generator is
//! seeded from the OS.

use std::{
    fmt,
    io::{BufRead, Write},
    time::{Duration, Instant},
};

use rand::{Rng, SeedableRng, rngs::StdRng};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{
    orderbook::OrderBook,
    orders::{NewOrder, Quantity, Side},
    protocol,
};

pub const MIN_QTY: Quantity = 1;
pub const MAX_QTY: Quantity = 1000;
/// Price bounds in cents.
pub const MIN_PRICE_CENTS: i64 = 1_000;
pub const MAX_PRICE_CENTS: i64 = 10_000;

pub struct OrderGenerator<R = StdRng> {
    rng: R,
}

impl OrderGenerator<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_os_rng() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }
}

impl<R: Rng> OrderGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn next_order(&mut self) -> NewOrder {
        let side = if self.rng.random_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        };
        let quantity = self.rng.random_range(MIN_QTY..=MAX_QTY);
        let cents = self.rng.random_range(MIN_PRICE_CENTS..MAX_PRICE_CENTS);
        NewOrder::new(side, quantity, Decimal::new(cents, 2))
    }
}

impl<R: Rng> Iterator for OrderGenerator<R> {
    type Item = NewOrder;

    fn next(&mut self) -> Option<NewOrder> {
        Some(self.next_order())
    }
}

#[derive(Debug, Clone)]
pub struct BenchReport {
    pub orders: usize,
    pub trades: usize,
    pub resting: usize,
    pub elapsed: Duration,
}

impl BenchReport {
    pub fn orders_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.orders as f64 / secs
        } else {
            f64::INFINITY
        }
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} orders in {:.4} seconds ({:.0} orders/sec), {} trades, {} resting",
            self.orders,
            self.elapsed.as_secs_f64(),
            self.orders_per_sec(),
            self.trades,
            self.resting
        )
    }
}

/// Runs `orders` random orders through a fresh book.
pub fn run_benchmark(orders: usize, seed: Option<u64>) -> anyhow::Result<BenchReport> {
    let generator = match seed {
        Some(seed) => OrderGenerator::seeded(seed),
        None => OrderGenerator::from_os_rng(),
    };
    let mut book = OrderBook::new();
    let mut trades = 0;

    info!(orders, ?seed, "starting benchmark");
    let start = Instant::now();
    for request in generator.take(orders) {
        trades += book.submit(request)?.len();
    }
    let elapsed = start.elapsed();

    Ok(BenchReport {
        orders,
        trades,
        resting: book.len(),
        elapsed,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub accepted: usize,
    pub rejected: usize,
    pub trades: usize,
}

/// Replays an order file through `book`, writing trades and the final book to `out`.
pub fn replay<R: BufRead, W: Write>(
    input: R,
    book: &mut OrderBook,
    out: &mut W,
) -> anyhow::Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let outcome = protocol::parse_order_line(&line)
            .and_then(|request| match request {
                Some(request) => Ok(Some(book.submit(request)?)),
                None => Ok(None),
            });

        match outcome {
            Ok(None) => {}
            Ok(Some(trades)) => {
                summary.accepted += 1;
                summary.trades += trades.len();
                for trade in &trades {
                    writeln!(out, "{}", protocol::format_trade(trade))?;
                }
            }
            Err(err) => {
                summary.rejected += 1;
                warn!(line = index + 1, error = %err, "skipping order");
                writeln!(out, "{}", protocol::format_error(&err))?;
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "Final Order Book:")?;
    writeln!(out, "{}", book.snapshot())?;
    Ok(summary)
}
