//! Lifecycle sequencing: named step pipelines, phases and the job queue.

pub mod phase;
pub mod scheduler;
pub mod table;

pub use phase::Phase;
pub use scheduler::{FollowUp, Scheduler, SequenceJob, SequenceOutcome, SequenceStatus};
pub use table::{SequenceName, SequenceTable, Step};
