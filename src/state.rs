use crate::{
    errors::{RequestError, ServiceError},
    orderbook::{BookSnapshot, Execution, OrderBook},
    orders::NewOrder,
    trade::Trade,
};
use std::sync::{Arc, Mutex, MutexGuard};

/// The one order book every transport shares.
///
/// All access goes through a single mutex held for the whole call, so a
/// submission (with all of its fills) and a snapshot never interleave.
#[derive(Clone)]
pub struct AppState {
    pub order_book: Arc<Mutex<OrderBook>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_book(OrderBook::new())
    }

    pub fn with_book(book: OrderBook) -> Self {
        Self {
            order_book: Arc::new(Mutex::new(book)),
        }
    }

    pub fn execute(&self, request: NewOrder) -> Result<Execution, RequestError> {
        let mut book = self.lock()?;
        Ok(book.execute(request)?)
    }

    pub fn submit(&self, request: NewOrder) -> Result<Vec<Trade>, RequestError> {
        self.execute(request).map(|execution| execution.trades)
    }

    pub fn snapshot(&self) -> Result<BookSnapshot, ServiceError> {
        Ok(self.lock()?.snapshot())
    }

    fn lock(&self) -> Result<MutexGuard<'_, OrderBook>, ServiceError> {
        self.order_book.lock().map_err(|_| ServiceError::Poisoned)
    }
}

impl Default for AppState {
    fn default() -> Self {
        AppState::new()
    }
}
