//! Scan execution.
//!
//! [`ScanJob`] owns the plan and the job-wide dedupe cache. For each target it
//! builds a [`RuntimeContext`] around a fresh [`DependencyStore`] and
//! [`TargetArtifacts`], then walks the batches: gate each check, create one
//! [`Task`] per admitted check and advance the tasks round by round until all
//! are done. Outputs published during a batch become readable once the batch
//! ends. Cancellation is polled before every target, batch and round.

mod artifacts;
mod context;
mod dedupe;
mod events;
mod job;
mod store;
mod task;

pub use artifacts::{RESPONSE_JSON, TargetArtifacts};
pub use context::{RequestSender, RuntimeContext};
pub use dedupe::DedupeCache;
pub use events::{ScanEvent, SkipReason};
pub use job::{JobState, ScanHandle, ScanJob};
pub use store::DependencyStore;
pub use task::{Advance, Task};
