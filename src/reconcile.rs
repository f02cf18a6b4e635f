//! Maps verified, non-replayed gateway events onto payment state.
//!
//! A `checkout.session.completed` event settles the session as paid with
//! the event's authoritative amount and currency; `async_payment_failed`
//! and `expired` settle it as failed. Every other event type is
//! acknowledged without a state change so the gateway never retries
//! forward-compatible deliveries.

use std::collections::HashMap;

use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;

use crate::db::queries;
use crate::error::Result;
use crate::models::{PaymentStatus, RequestStatus};

/// Metadata key carrying the originating correlation id, set when the
/// checkout session is created.
const CORRELATION_ID_KEY: &str = "correlation_id";

/// Minimal shape of a gateway event. `data.object` stays an untyped value
/// until the event type is known, so unrecognized types never fail parsing.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Settled(PaymentStatus),
    Ignored,
}

/// Apply one event to the payment record it belongs to.
///
/// Safe to call twice with the same event (the ledger normally prevents
/// that): the upserts are idempotent and never leave a terminal state.
pub fn apply(conn: &Connection, event: &StripeEvent) -> Result<Outcome> {
    let status = match event.event_type.as_str() {
        "checkout.session.completed" => PaymentStatus::Paid,
        "checkout.session.async_payment_failed" | "checkout.session.expired" => {
            PaymentStatus::Failed
        }
        other => {
            tracing::debug!("Ignoring event type: {}", other);
            return Ok(Outcome::Ignored);
        }
    };

    let session: CheckoutSessionObject = serde_json::from_value(event.data.object.clone())?;

    queries::upsert_payment(
        conn,
        &session.id,
        status,
        session.amount_total.unwrap_or(0),
        session.currency.as_deref().unwrap_or("usd"),
    )?;

    // Settle the originating request row when the session carries our
    // correlation id. Sessions created out-of-band simply have none.
    if let Some(correlation_id) = session.metadata.get(CORRELATION_ID_KEY) {
        let request_status = match status {
            PaymentStatus::Paid => RequestStatus::Paid,
            PaymentStatus::Failed => RequestStatus::Failed,
        };
        let settled = queries::settle_payment_request(conn, correlation_id, request_status)?;
        if settled {
            tracing::info!(
                correlation_id = %correlation_id,
                status = status.as_str(),
                "payment request settled"
            );
        }
    }

    Ok(Outcome::Settled(status))
}
