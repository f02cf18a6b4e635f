use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{AppError, Result};
use crate::models::{Payment, PaymentRequest, PaymentStatus, ProcessedEvent, RequestStatus};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============ payment_requests ============

/// Reserve a correlation id by inserting the pending row.
///
/// This runs and commits *before* the gateway call, so it is the atomic
/// decision point for duplicate submissions: a uniqueness hit means a
/// duplicate and no external call may be made.
pub fn insert_payment_request(conn: &Connection, correlation_id: &str) -> Result<PaymentRequest> {
    let ts = now();
    let result = conn.execute(
        "INSERT INTO payment_requests (correlation_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)",
        params![correlation_id, RequestStatus::Pending, ts],
    );

    match result {
        Ok(_) => Ok(PaymentRequest {
            correlation_id: correlation_id.to_string(),
            status: RequestStatus::Pending,
            created_at: ts,
            updated_at: ts,
        }),
        Err(e) if is_unique_violation(&e) => Err(AppError::Duplicate(correlation_id.to_string())),
        Err(e) => Err(e.into()),
    }
}

pub fn get_payment_request(
    conn: &Connection,
    correlation_id: &str,
) -> Result<Option<PaymentRequest>> {
    let row = conn
        .query_row(
            "SELECT correlation_id, status, created_at, updated_at
             FROM payment_requests WHERE correlation_id = ?1",
            params![correlation_id],
            |row| {
                Ok(PaymentRequest {
                    correlation_id: row.get(0)?,
                    status: row.get(1)?,
                    created_at: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Move a request out of `pending` into a terminal state.
///
/// The `status = 'pending'` guard keeps terminal states terminal: replaying
/// a settlement is a no-op, never a flip. Returns whether a row changed.
pub fn settle_payment_request(
    conn: &Connection,
    correlation_id: &str,
    status: RequestStatus,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE payment_requests SET status = ?2, updated_at = ?3
         WHERE correlation_id = ?1 AND status = 'pending'",
        params![correlation_id, status, now()],
    )?;
    Ok(changed > 0)
}

pub fn count_payment_requests(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM payment_requests", [], |row| row.get(0))?;
    Ok(count)
}

// ============ payments ============

/// Idempotent upsert of a payment outcome, keyed by session id.
///
/// The conflict guard `payments.status = excluded.status` makes redelivery
/// of the same outcome idempotent while refusing paid<->failed flips;
/// terminal states are terminal.
pub fn upsert_payment(
    conn: &Connection,
    session_id: &str,
    status: PaymentStatus,
    amount: i64,
    currency: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO payments (stripe_session_id, status, amount, currency, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(stripe_session_id) DO UPDATE SET
             amount = excluded.amount,
             currency = excluded.currency,
             updated_at = excluded.updated_at
         WHERE payments.status = excluded.status",
        params![session_id, status, amount, currency, now()],
    )?;
    Ok(())
}

pub fn get_payment(conn: &Connection, session_id: &str) -> Result<Option<Payment>> {
    let row = conn
        .query_row(
            "SELECT stripe_session_id, status, amount, currency, created_at, updated_at
             FROM payments WHERE stripe_session_id = ?1",
            params![session_id],
            |row| {
                Ok(Payment {
                    stripe_session_id: row.get(0)?,
                    status: row.get(1)?,
                    amount: row.get(2)?,
                    currency: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn count_payments(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM payments", [], |row| row.get(0))?;
    Ok(count)
}

// ============ processed_events ============

/// Record an event id in the ledger. Returns `false` when the id was
/// already recorded (a redelivery), `true` when this is the first delivery.
/// Any other failure is a genuine storage error.
pub fn insert_processed_event(
    conn: &Connection,
    event_id: &str,
    event_type: &str,
) -> Result<bool> {
    let result = conn.execute(
        "INSERT INTO processed_events (event_id, type, received_at) VALUES (?1, ?2, ?3)",
        params![event_id, event_type, now()],
    );

    match result {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub fn get_processed_event(conn: &Connection, event_id: &str) -> Result<Option<ProcessedEvent>> {
    let row = conn
        .query_row(
            "SELECT event_id, type, received_at FROM processed_events WHERE event_id = ?1",
            params![event_id],
            |row| {
                Ok(ProcessedEvent {
                    event_id: row.get(0)?,
                    event_type: row.get(1)?,
                    received_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn count_processed_events(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM processed_events", [], |row| row.get(0))?;
    Ok(count)
}
