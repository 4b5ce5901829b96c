//! Outbound collaborators of the pipeline — where emails come from and who
//! parses them.

pub mod traits;

pub use traits::{EmailSource, JobService};
