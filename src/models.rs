//! Typed rows for the three durable tables.
//!
//! Each table's PRIMARY KEY is the load-bearing correctness mechanism:
//! `payment_requests` dedups initiation attempts, `payments` makes webhook
//! upserts idempotent, and `processed_events` detects redelivered events.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Lifecycle of an initiation attempt. Created `pending` before the gateway
/// call; moves to a terminal state only via the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Paid,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl ToSql for RequestStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RequestStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| Self::parse(s).ok_or(FromSqlError::InvalidType))
    }
}

/// Final outcome of a checkout session. Both variants are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl ToSql for PaymentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PaymentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| Self::parse(s).ok_or(FromSqlError::InvalidType))
    }
}

/// One initiation attempt, keyed by the server-generated correlation id.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    pub correlation_id: String,
    pub status: RequestStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Gateway-facing payment record, keyed by the checkout session id. Amount
/// and currency come from the authoritative event payload, never from the
/// client.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub stripe_session_id: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub currency: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Append-only ledger entry for a processed webhook event.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedEvent {
    pub event_id: String,
    pub event_type: String,
    pub received_at: i64,
}
