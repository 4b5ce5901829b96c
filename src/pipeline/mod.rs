//! Trip extraction pipeline.
//!
//! Four long-lived stages joined by bounded FIFO queues:
//! 1. `FetchStage` — pulls a batch from the [`EmailSource`](crate::backend::EmailSource)
//!    on a fixed cadence and pushes emails one at a time
//! 2. `SubmitStage` — creates one parsing job per email
//! 3. `PollStage` — checks job status; Pending jobs wait on the
//!    [`RecheckQueue`], Done jobs move on, Error jobs are dropped
//! 4. `CollectStage` — fetches the trip of a Done job and stores it
//!
//! A single cancellation token stops every stage at its next checkpoint.

mod collect;
mod fetch;
mod orchestrator;
mod poll;
mod queues;
pub mod recheck;
mod submit;

pub use orchestrator::{PipelineHandle, TripPipeline};
pub use recheck::{Recheck, RecheckQueue};
