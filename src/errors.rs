use thiserror::Error;

/// Rejections raised by the matching core. The book is untouched when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("{reason}")]
    InvalidOrder { reason: String },
}

impl EngineError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        EngineError::InvalidOrder {
            reason: reason.into(),
        }
    }
}

/// Malformed `SIDE QTY@PRICE` text. Never reaches the core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected `SIDE QTY@PRICE`, got `{0}`")]
    Shape(String),
    #[error("unknown side `{0}`, expected BUY or SELL")]
    Side(String),
    #[error("invalid quantity `{0}`")]
    Quantity(String),
    #[error("invalid price `{0}`")]
    Price(String),
}

/// Anything that can go wrong handling one request line or body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Failures of the shared state around the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("order book unavailable: a previous request panicked while holding it")]
    Poisoned,
}

pub type EngineResult<T> = Result<T, EngineError>;
