//! Helpers for job service adapters.
//!
//! A job service implementation talks to some third-party parsing provider.
//! These types let it translate the provider's view into the pipeline's:
//! - [`ProviderStatus`] — the provider's status vocabulary, mapped once onto
//!   [`JobStatus`](crate::model::JobStatus)
//! - [`ParsedItinerary`] — a parsed result made of travel products, converted
//!   into a [`Trip`](crate::model::Trip)

pub mod itinerary;
pub mod status;

pub use itinerary::{Address, AirProduct, HotelProduct, ParsedItinerary, Product};
pub use status::ProviderStatus;
