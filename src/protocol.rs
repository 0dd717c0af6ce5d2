//! The text protocol spoken by the line server and the replay tool.
//!
//! Requests are one order per line, `SIDE QTY@PRICE`, e.g. `BUY 50@99.50`.
//! Replies are one `TRADE <qty> @ <price>` line per fill followed by `OK`,
//! or a single `ERROR: <message>` line.

use std::str::FromStr;

use crate::{
    errors::{EngineError, ParseError, RequestError},
    orders::{NewOrder, Price, Quantity, Side},
    state::AppState,
    trade::Trade,
};

pub const OK: &str = "OK";

/// Parses one request line. A blank line is not an error, it just means
/// there is nothing to submit.
pub fn parse_order_line(line: &str) -> Result<Option<NewOrder>, RequestError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut tokens = line.split_whitespace();
    let (Some(side), Some(rest), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(ParseError::Shape(line.to_string()).into());
    };
    let Some((quantity, price)) = rest.split_once('@') else {
        return Err(ParseError::Shape(line.to_string()).into());
    };

    let side = Side::from_str(side).map_err(|_| ParseError::Side(side.to_string()))?;
    let quantity = parse_quantity(quantity)?;
    let price = Price::from_str(price).map_err(|_| ParseError::Price(price.to_string()))?;

    Ok(Some(NewOrder::new(side, quantity, price)))
}

// "-5" is a well-formed number but not a valid order size
fn parse_quantity(text: &str) -> Result<Quantity, RequestError> {
    let value: i128 = text
        .parse()
        .map_err(|_| ParseError::Quantity(text.to_string()))?;
    if value < 0 {
        return Err(EngineError::invalid("quantity must be > 0").into());
    }
    Quantity::try_from(value).map_err(|_| ParseError::Quantity(text.to_string()).into())
}

pub fn format_trade(trade: &Trade) -> String {
    format!("TRADE {} @ {:.2}", trade.quantity, trade.price.round_dp(2))
}

pub fn format_error(err: &RequestError) -> String {
    format!("ERROR: {}", err)
}

/// Handles one request line against the shared book and returns the reply lines.
pub fn respond(state: &AppState, line: &str) -> Vec<String> {
    let outcome = parse_order_line(line).and_then(|request| match request {
        Some(request) => state.submit(request),
        None => Ok(Vec::new()),
    });

    match outcome {
        Ok(trades) => trades
            .iter()
            .map(format_trade)
            .chain(std::iter::once(OK.to_string()))
            .collect(),
        Err(err) => vec![format_error(&err)],
    }
}
