//! Trip Pipeline — turns travel confirmation emails into stored trips.

pub mod backend;
pub mod config;
pub mod error;
pub mod finder;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod store;

pub use config::{PipelineConfig, StatusCheckFailurePolicy};
pub use error::{Error, Result};
pub use pipeline::{PipelineHandle, TripPipeline};
