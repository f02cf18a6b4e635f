use rusqlite::Connection;

/// Initialize the database schema.
///
/// The three PRIMARY KEYs below are the load-bearing correctness mechanism
/// of the whole pipeline, not merely indexes: each one converts a logical
/// check-then-act race into a single storage-level atomic decision.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Initiation attempts, keyed by server-generated correlation id.
        -- A second insert with the same id is a duplicate submission.
        -- Rows are never deleted; a pending row with no matching event is a
        -- legitimate abandoned attempt.
        CREATE TABLE IF NOT EXISTS payment_requests (
            correlation_id TEXT PRIMARY KEY,
            status TEXT NOT NULL CHECK (status IN ('pending', 'paid', 'failed')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Gateway-facing payment records, one per checkout session.
        -- Written only by the reconciler, from authoritative event payloads.
        CREATE TABLE IF NOT EXISTS payments (
            stripe_session_id TEXT PRIMARY KEY,
            status TEXT NOT NULL CHECK (status IN ('paid', 'failed')),
            amount INTEGER NOT NULL,
            currency TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Append-only ledger of processed webhook event ids. The insert
        -- conflict IS the replay detector; there is no lookup-then-insert
        -- window.
        CREATE TABLE IF NOT EXISTS processed_events (
            event_id TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            received_at INTEGER NOT NULL
        );
        "#,
    )
}
