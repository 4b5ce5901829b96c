//! Parsed itinerary → trip conversion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TripError;
use crate::model::{Trip, TripStepKind};

/// Postal address as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub text: Option<String>,
    pub lines: Vec<String>,
    pub city_name: Option<String>,
    pub country_name: Option<String>,
}

impl Address {
    /// Render the most specific representation available.
    ///
    /// Free text wins, then address lines, then city and country.
    pub fn render(&self) -> String {
        if let Some(text) = non_empty(&self.text) {
            return text.to_string();
        }
        if !self.lines.is_empty() {
            return self.lines.join(", ");
        }
        [non_empty(&self.city_name), non_empty(&self.country_name)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// A flight segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirProduct {
    /// Carrier name.
    pub carrier: String,
    pub departure_at: DateTime<Utc>,
    pub departure_address: Address,
    pub arrival_at: DateTime<Utc>,
    pub arrival_address: Address,
}

/// A hotel stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelProduct {
    pub name: String,
    pub check_in_at: DateTime<Utc>,
    pub address: Address,
}

/// A travel product found in the parsed email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Product {
    Air(AirProduct),
    Hotel(HotelProduct),
    /// A product kind the pipeline does not turn into steps.
    #[serde(other)]
    Unknown,
}

/// Result of a completed parsing job, before it becomes a [`Trip`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedItinerary {
    pub reference: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl ParsedItinerary {
    /// Build the trip, one or two steps per product, in product order.
    pub fn into_trip(self) -> Result<Trip, TripError> {
        let mut trip = Trip::new(self.reference, self.start, self.end)?;
        for product in self.products {
            match product {
                Product::Air(air) => push_air_steps(&mut trip, air),
                Product::Hotel(hotel) => push_hotel_step(&mut trip, hotel),
                Product::Unknown => {}
            }
        }
        Ok(trip)
    }
}

fn push_air_steps(trip: &mut Trip, air: AirProduct) {
    trip.push_step(
        TripStepKind::FlightStart,
        air.departure_at,
        air.departure_address.render(),
        format!("Flight start with {}", air.carrier),
    );
    trip.push_step(
        TripStepKind::FlightEnd,
        air.arrival_at,
        air.arrival_address.render(),
        format!("Flight end with {}", air.carrier),
    );
}

fn push_hotel_step(trip: &mut Trip, hotel: HotelProduct) {
    trip.push_step(
        TripStepKind::Hotel,
        hotel.check_in_at,
        hotel.address.render(),
        format!("Hotel at {}", hotel.name),
    );
}
