//! Sequence names and the step table that defines each lifecycle pipeline.

use std::collections::BTreeMap;
use std::fmt;

use crate::definition::{Hook, Layer};

/// The named lifecycle pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SequenceName {
    Mount,
    Resume,
    LocalChange,
    ReferenceChange,
    GlobalChange,
    ExternalChange,
    DescendantChange,
    Destroy,
}

impl SequenceName {
    pub const ALL: [SequenceName; 8] = [
        Self::Mount,
        Self::Resume,
        Self::LocalChange,
        Self::ReferenceChange,
        Self::GlobalChange,
        Self::ExternalChange,
        Self::DescendantChange,
        Self::Destroy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mount => "mount",
            Self::Resume => "resume",
            Self::LocalChange => "localChange",
            Self::ReferenceChange => "referenceChange",
            Self::GlobalChange => "globalChange",
            Self::ExternalChange => "externalChange",
            Self::DescendantChange => "descendantChange",
            Self::Destroy => "destroy",
        }
    }

    /// Whether this pipeline reacts to a change set.
    pub fn is_change(self) -> bool {
        matches!(
            self,
            Self::LocalChange | Self::ReferenceChange | Self::GlobalChange | Self::ExternalChange
        )
    }
}

impl fmt::Display for SequenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run a lifecycle hook of the given layer, if the definition has one.
    Hook(Layer, Hook),
    /// Run the state `change` hook. With `veto`, a `false` result ends the
    /// sequence before rendering; without it the result is ignored.
    Change { veto: bool },
    /// Run the view's render function and apply the result.
    Render,
}

/// Sequence name → ordered steps.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceTable {
    steps: BTreeMap<SequenceName, Vec<Step>>,
}

impl SequenceTable {
    /// A table with no steps at all.
    pub fn empty() -> Self {
        Self {
            steps: BTreeMap::new(),
        }
    }

    /// Steps for `name`; empty when the table has none.
    pub fn steps(&self, name: SequenceName) -> &[Step] {
        self.steps.get(&name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the steps for `name` (builder).
    pub fn with(mut self, name: SequenceName, steps: Vec<Step>) -> Self {
        self.steps.insert(name, steps);
        self
    }
}

impl Default for SequenceTable {
    fn default() -> Self {
        use Hook::*;
        use Layer::*;

        let render = [Step::Hook(View, PreRender), Step::Render, Step::Hook(View, PostRender)];
        let change = |veto: bool| {
            let mut steps = vec![Step::Change { veto }];
            steps.extend_from_slice(&render);
            steps
        };

        let mut mount = vec![Step::Hook(State, PreMount), Step::Hook(State, Mount)];
        mount.extend_from_slice(&render);
        mount.push(Step::Hook(State, PostMount));

        Self::empty()
            .with(SequenceName::Mount, mount)
            .with(
                SequenceName::Resume,
                vec![Step::Hook(State, Resume), Step::Hook(View, Resume)],
            )
            .with(SequenceName::LocalChange, change(false))
            .with(SequenceName::ExternalChange, change(false))
            .with(SequenceName::ReferenceChange, change(true))
            .with(SequenceName::GlobalChange, change(true))
            .with(
                SequenceName::DescendantChange,
                vec![
                    Step::Hook(State, DescendantChange),
                    Step::Hook(View, DescendantChange),
                ],
            )
            .with(
                SequenceName::Destroy,
                vec![
                    Step::Hook(State, PreDestroy),
                    Step::Hook(State, Destroy),
                    Step::Hook(View, Destroy),
                ],
            )
    }
}
