use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::extractors::Json;
use crate::id::EntityType;

/// Request body for POST /checkout. Intentionally empty today - reserved
/// for future product-selection fields. Unknown keys are rejected, not
/// ignored, to prevent silent contract drift.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckoutRequest {}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
}

/// POST /checkout - initiate a one-time payment.
///
/// The origin/CSRF/rate gates run in `middleware::checkout_gate` before the
/// body extractor, so by the time this handler sees the request it is from
/// an allowed origin, token-verified, and inside quota. The pending row
/// commits before the gateway round trip, so a slow or failed gateway call
/// never blocks other requests' dedup checks.
pub async fn initiate_checkout(
    State(state): State<AppState>,
    Json(_body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    // Two distinct identifiers for two distinct layers: the correlation id
    // dedups submissions in our store, the idempotency key dedups the
    // gateway call against transport retries.
    let correlation_id = EntityType::Request.gen_id();
    let idempotency_key = EntityType::IdempotencyKey.gen_id();

    {
        let conn = state.db.get()?;
        queries::insert_payment_request(&conn, &correlation_id)?;
    }

    // Server-controlled redirect targets; ?rid= lets the static pages show
    // a support reference without trusting client input.
    let success_url = format!("{}/success?rid={}", state.app_url, correlation_id);
    let cancel_url = format!("{}/cancel?rid={}", state.app_url, correlation_id);

    let session = state
        .stripe
        .create_checkout_session(&idempotency_key, &correlation_id, &success_url, &cancel_url)
        .await
        .inspect_err(|e| {
            // The pending row stays in place: an abandoned attempt is
            // reconciled later or left stale, and a client retry mints a
            // fresh correlation id.
            tracing::error!(
                correlation_id = %correlation_id,
                idempotency_key = %idempotency_key,
                "Checkout session creation failed: {}",
                e
            );
        })?;

    tracing::info!(
        correlation_id = %correlation_id,
        session_id = %session.id,
        "Checkout session created"
    );

    Ok(Json(CheckoutResponse {
        url: session.url,
        correlation_id,
    }))
}
