pub mod api;
pub mod cli;
pub mod errors;
pub mod orderbook;
pub mod orders;
pub mod protocol;
pub mod server;
pub mod side_book;
pub mod simulate;
pub mod state;
pub mod trade;
pub mod utils;

pub use errors::{EngineError, RequestError};
pub use orderbook::{BookSnapshot, Execution, OrderBook};
pub use orders::{NewOrder, Order, OrderId, Price, Quantity, Sequence, Side};
pub use trade::Trade;
