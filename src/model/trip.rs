//! Trips and their steps — the pipeline's final artifact.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TripError;

/// Kind of a trip step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TripStepKind {
    FlightStart,
    FlightEnd,
    Hotel,
}

impl TripStepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FlightStart => "flight-start",
            Self::FlightEnd => "flight-end",
            Self::Hotel => "hotel",
        }
    }
}

impl fmt::Display for TripStepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flight-start" => Ok(Self::FlightStart),
            "flight-end" => Ok(Self::FlightEnd),
            "hotel" => Ok(Self::Hotel),
            other => Err(format!("unknown trip step kind: {other}")),
        }
    }
}

/// One step of a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripStep {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub kind: TripStepKind,
    pub at: DateTime<Utc>,
    pub location: String,
    pub description: String,
}

/// A travel itinerary extracted from an email.
///
/// Created once and written once. Two trips built from the same email get
/// different ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    /// Reference code assigned by the job service. Never empty.
    pub reference: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Steps in product order. Empty when no products were found.
    pub steps: Vec<TripStep>,
}

impl Trip {
    /// Create a trip with a fresh id and no steps.
    pub fn new(
        reference: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, TripError> {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(TripError::MissingReference);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            reference,
            start,
            end,
            steps: Vec::new(),
        })
    }

    /// Append a step, stamping it with a fresh id and this trip's id.
    pub fn push_step(
        &mut self,
        kind: TripStepKind,
        at: DateTime<Utc>,
        location: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.steps.push(TripStep {
            id: Uuid::new_v4(),
            trip_id: self.id,
            kind,
            at,
            location: location.into(),
            description: description.into(),
        });
    }
}
