//! Table bootstrap for the libSQL backend.
//!
//! Tables are created with `IF NOT EXISTS`, so opening an existing database
//! is a no-op. There is no version tracking.

use libsql::Connection;

use crate::error::StoreError;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS trips (
        id TEXT PRIMARY KEY,
        reference TEXT NOT NULL,
        start_at TEXT NOT NULL,
        end_at TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_trips_reference ON trips(reference);

    CREATE TABLE IF NOT EXISTS trip_steps (
        id TEXT PRIMARY KEY,
        trip_id TEXT NOT NULL REFERENCES trips(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        kind TEXT NOT NULL,
        at TEXT NOT NULL,
        location TEXT NOT NULL,
        description TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_trip_steps_trip ON trip_steps(trip_id, position);
"#;

/// Create the trip tables if they do not exist yet.
pub(crate) async fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to create trip tables: {e}")))?;
    tracing::debug!("Trip tables ready");
    Ok(())
}
