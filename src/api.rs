use axum::{
    Json, Router, debug_handler,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    errors::{EngineError, RequestError, ServiceError},
    orderbook::{BookSnapshot, Execution},
    orders::{NewOrder, Price, Quantity, Side},
    state::AppState,
};

/// Error body for every non-2xx answer: `{"error": "<message>"}`.
pub struct ApiError(RequestError);

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError(err)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RequestError::Parse(_) | RequestError::Engine(_) => StatusCode::BAD_REQUEST,
            RequestError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Body of `POST /orders`.
///
/// The quantity is signed so that `-5` reaches validation and comes back as
/// the same 400 the line protocol gives, instead of failing to deserialize.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OrderRequest {
    pub side: Side,
    pub quantity: i64,
    pub price: Price,
}

impl TryFrom<OrderRequest> for NewOrder {
    type Error = RequestError;

    fn try_from(request: OrderRequest) -> Result<Self, Self::Error> {
        let quantity = Quantity::try_from(request.quantity)
            .map_err(|_| EngineError::invalid("quantity must be > 0"))?;
        Ok(NewOrder::new(request.side, quantity, request.price))
    }
}

#[debug_handler]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<OrderRequest>,
) -> Result<Json<Execution>, ApiError> {
    let execution = state.execute(NewOrder::try_from(payload)?)?;
    Ok(Json(execution))
}

#[debug_handler]
pub async fn get_book(State(state): State<AppState>) -> Result<Json<BookSnapshot>, ApiError> {
    Ok(Json(state.snapshot()?))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/book", get(get_book))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the JSON API until `shutdown` fires.
pub async fn serve_http(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "http api listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    info!("http api shut down");
    Ok(())
}
