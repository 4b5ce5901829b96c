//! Domain model — emails, parsing jobs, trips.

pub mod email;
pub mod job;
pub mod trip;

pub use email::Email;
pub use job::{JobId, JobStatus, ParsingJob};
pub use trip::{Trip, TripStep, TripStepKind};
