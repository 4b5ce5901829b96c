//! libSQL backend — async `TripStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Trip, TripStep, TripStepKind};
use crate::store::schema;
use crate::store::traits::TripStore;

/// libSQL trip store.
///
/// Stores a single connection that is reused for all operations. Writes are
/// serialized so a trip and its steps land in one transaction.
pub struct LibSqlTripStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlTripStore {
    /// Open (or create) a local database file and create the trip tables.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Trip store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to create in-memory database: {e}")))?;

        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Pool(format!("Failed to create connection: {e}")))?;

        schema::init_schema(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn load_steps(&self, trip_id: &str) -> Result<Vec<TripStep>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {STEP_COLUMNS} FROM trip_steps WHERE trip_id = ?1 ORDER BY position"
                ),
                params![trip_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("load_steps: {e}")))?;

        let mut steps = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("load_steps: {e}")))?
        {
            steps.push(row_to_step(&row)?);
        }
        Ok(steps)
    }

    async fn load_trip(&self, row: &libsql::Row) -> Result<Trip, StoreError> {
        let id_str: String = row.get(0).map_err(query_err)?;
        let reference: String = row.get(1).map_err(query_err)?;
        let start_str: String = row.get(2).map_err(query_err)?;
        let end_str: String = row.get(3).map_err(query_err)?;

        let steps = self.load_steps(&id_str).await?;

        Ok(Trip {
            id: parse_uuid(&id_str)?,
            reference,
            start: parse_datetime(&start_str)?,
            end: parse_datetime(&end_str)?,
            steps,
        })
    }
}

// ── Helper functions ────────────────────────────────────────────────

const TRIP_COLUMNS: &str = "id, reference, start_at, end_at";

const STEP_COLUMNS: &str = "id, trip_id, kind, at, location, description";

fn query_err(e: libsql::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Serialization(format!("Invalid id {s:?}: {e}")))
}

/// Parse an RFC 3339 timestamp (our canonical write format).
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("Invalid timestamp {s:?}: {e}")))
}

/// Map a libsql Row to a TripStep.
///
/// Column order matches STEP_COLUMNS:
/// 0:id, 1:trip_id, 2:kind, 3:at, 4:location, 5:description
fn row_to_step(row: &libsql::Row) -> Result<TripStep, StoreError> {
    let id_str: String = row.get(0).map_err(query_err)?;
    let trip_id_str: String = row.get(1).map_err(query_err)?;
    let kind_str: String = row.get(2).map_err(query_err)?;
    let at_str: String = row.get(3).map_err(query_err)?;

    let kind: TripStepKind = kind_str.parse().map_err(StoreError::Serialization)?;

    Ok(TripStep {
        id: parse_uuid(&id_str)?,
        trip_id: parse_uuid(&trip_id_str)?,
        kind,
        at: parse_datetime(&at_str)?,
        location: row.get(4).map_err(query_err)?,
        description: row.get(5).map_err(query_err)?,
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl TripStore for LibSqlTripStore {
    async fn create(&self, trip: &Trip) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| StoreError::Query(format!("create: begin: {e}")))?;

        tx.execute(
            "INSERT INTO trips (id, reference, start_at, end_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                trip.id.to_string(),
                trip.reference.clone(),
                trip.start.to_rfc3339(),
                trip.end.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| StoreError::Query(format!("create: insert trip: {e}")))?;

        for (position, step) in trip.steps.iter().enumerate() {
            tx.execute(
                "INSERT INTO trip_steps (id, trip_id, position, kind, at, location, description) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    step.id.to_string(),
                    trip.id.to_string(),
                    position as i64,
                    step.kind.as_str(),
                    step.at.to_rfc3339(),
                    step.location.clone(),
                    step.description.clone(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("create: insert step: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Query(format!("create: commit: {e}")))?;

        debug!(trip_id = %trip.id, reference = %trip.reference, steps = trip.steps.len(), "Trip inserted into DB");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Trip>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TRIP_COLUMNS} FROM trips ORDER BY rowid"),
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("list: {e}")))?;

        let mut trips = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("list: {e}")))?
        {
            trips.push(self.load_trip(&row).await?);
        }
        Ok(trips)
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Trip>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {TRIP_COLUMNS} FROM trips WHERE reference = ?1 ORDER BY rowid LIMIT 1"
                ),
                params![reference],
            )
            .await
            .map_err(|e| StoreError::Query(format!("find_by_reference: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(self.load_trip(&row).await?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("find_by_reference: {e}"))),
        }
    }
}
