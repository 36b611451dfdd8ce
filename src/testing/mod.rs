//! Headless testing helpers: Pilot, Recorder, snapshot helpers.
//!
//! Use the [`Pilot`] to mount markup into a scope and drive it the way a
//! browser would (events, timers). Use [`Recorder`] to log hook calls from
//! inside definitions, and [`tree_to_string`] to capture the element tree
//! for snapshot-style assertions.

pub mod pilot;
pub mod recorder;
pub mod snapshot;

pub use pilot::Pilot;
pub use recorder::Recorder;
pub use snapshot::tree_to_string;
