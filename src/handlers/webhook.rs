use axum::{body::Bytes, extract::State, http::HeaderMap};
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::reconcile::{self, StripeEvent};

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay: Option<bool>,
}

/// POST /webhook - gateway notification endpoint.
///
/// Consumes the raw body: signature verification runs over the exact bytes
/// received, so nothing may parse or re-encode the payload first. There is
/// no CSRF/origin gating here - the caller is the gateway's infrastructure,
/// not a browser, and the signature is the sole authenticity control.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let Some(signature) = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    else {
        return Err(AppError::MissingSignature);
    };

    // Errors with server_misconfigured when no webhook secret is set
    if !state.stripe.verify_webhook_signature(&body, signature)? {
        return Err(AppError::InvalidSignature);
    }

    // Only now is the payload trusted enough to parse
    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Unparseable event payload: {}", e)))?;

    let mut conn = state.db.get()?;

    // Ledger insert and reconciliation commit together: a mid-reconcile
    // failure rolls the ledger row back, so the 500 makes the gateway
    // retry and the retry is processed as a first delivery, not a replay.
    let tx = conn.transaction()?;

    // The ledger insert is the replay check. A duplicate id means the
    // gateway is retrying delivery: acknowledge with 200 and do nothing,
    // or it will keep retrying. A real storage error surfaces as 500 so it
    // *does* retry later.
    if !queries::insert_processed_event(&tx, &event.id, &event.event_type)? {
        tracing::info!(event_id = %event.id, "Replayed event acknowledged");
        return Ok(Json(WebhookAck {
            ok: true,
            replay: Some(true),
        }));
    }

    reconcile::apply(&tx, &event).map_err(|e| match e {
        // A verified event of a known type that fails to parse as a
        // checkout session is our problem, not the sender's
        AppError::Json(err) => AppError::Internal(format!("Malformed event object: {}", err)),
        other => other,
    })?;

    tx.commit()?;

    Ok(Json(WebhookAck {
        ok: true,
        replay: None,
    }))
}
