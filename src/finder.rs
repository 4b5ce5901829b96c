//! Read-side use-case over the trip store.

use std::sync::Arc;

use tracing::debug;

use crate::error::StoreError;
use crate::model::Trip;
use crate::store::TripStore;

/// Looks up stored trips.
#[derive(Clone)]
pub struct TripFinder {
    store: Arc<dyn TripStore>,
}

impl TripFinder {
    pub fn new(store: Arc<dyn TripStore>) -> Self {
        Self { store }
    }

    /// Every stored trip.
    pub async fn all(&self) -> Result<Vec<Trip>, StoreError> {
        self.store.list().await
    }

    /// The trip stored under `reference`.
    ///
    /// Returns [`StoreError::NotFound`] when no trip carries that reference.
    pub async fn by_reference(&self, reference: &str) -> Result<Trip, StoreError> {
        match self.store.find_by_reference(reference).await? {
            Some(trip) => Ok(trip),
            None => {
                debug!(reference = %reference, "Trip not found");
                Err(StoreError::NotFound {
                    reference: reference.to_string(),
                })
            }
        }
    }
}
