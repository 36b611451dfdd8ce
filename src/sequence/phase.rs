//! Per-instance lifecycle phase.

use super::table::SequenceName;

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Created, mount not yet run.
    #[default]
    Idle,
    Mounting,
    Mounted,
    /// Running a change or descendant pipeline.
    Changing(SequenceName),
    Resuming,
    Destroying,
    Destroyed,
}

impl Phase {
    /// Phase while `name` is running.
    pub fn during(name: SequenceName) -> Self {
        match name {
            SequenceName::Mount => Self::Mounting,
            SequenceName::Resume => Self::Resuming,
            SequenceName::Destroy => Self::Destroying,
            other => Self::Changing(other),
        }
    }

    /// Phase once `name` has settled.
    pub fn after(name: SequenceName) -> Self {
        match name {
            SequenceName::Destroy => Self::Destroyed,
            _ => Self::Mounted,
        }
    }

    pub fn is_mounted(self) -> bool {
        matches!(self, Self::Mounted | Self::Changing(_) | Self::Resuming)
    }
}
