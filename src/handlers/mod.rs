mod checkout;
mod token;
mod webhook;

pub use checkout::{initiate_checkout, CheckoutRequest, CheckoutResponse};
pub use token::{issue_token, TokenResponse};
pub use webhook::{stripe_webhook, WebhookAck};

use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Router,
};
use serde::Serialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::middleware::checkout_gate;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct PingResponse {
    ok: bool,
    account: String,
}

/// Gateway connectivity check for operators.
async fn ping(State(state): State<AppState>) -> Result<Json<PingResponse>> {
    let account = state.stripe.ping().await?;
    Ok(Json(PingResponse {
        ok: true,
        account: account.id,
    }))
}

pub fn router(state: AppState) -> Router<AppState> {
    // The gate layer wraps the checkout route so origin/CSRF/rate checks
    // run before body extraction ever happens. route_layer keeps a GET to
    // the route answering 405 instead of tripping the origin gate.
    Router::new()
        .route("/health", get(health))
        .route("/ping", get(ping))
        .route("/token", get(issue_token))
        .route(
            "/checkout",
            post(initiate_checkout)
                .route_layer(middleware::from_fn_with_state(state, checkout_gate)),
        )
        .route("/webhook", post(stripe_webhook))
}
