//! `TripStore` trait — the single persistence interface of the pipeline.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::Trip;

/// Backend-agnostic trip storage.
///
/// `create` is not idempotent: storing the same logical trip twice yields two
/// rows, told apart by their internal ids.
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Persist a completed trip and its steps.
    async fn create(&self, trip: &Trip) -> Result<(), StoreError>;

    /// All stored trips, steps in stored order.
    async fn list(&self) -> Result<Vec<Trip>, StoreError>;

    /// The first trip stored under `reference`, if any.
    async fn find_by_reference(&self, reference: &str) -> Result<Option<Trip>, StoreError>;
}
