//! FIFO sequence queue and debounce timers.
//!
//! The scheduler never runs anything itself: the scope pops jobs and
//! executes them one at a time, and polls due timers on each tick.

use std::collections::{BTreeMap, VecDeque};

use tokio::sync::oneshot;
use tokio::time::Instant;

use super::table::SequenceName;
use crate::change::ChangeSet;
use crate::registry::InstanceId;

/// Work scheduled to run after a sequence settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    None,
    /// Re-apply the current HTML if the element no longer shows it.
    RepairHtml,
    /// Drop the instance from the registry unless it was resumed meanwhile.
    Purge,
}

/// How a sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    /// Every step ran. `rendered` is whether a render step applied new HTML.
    Completed { rendered: bool },
    /// The change hook returned `false`.
    Vetoed,
    /// The instance was inactive when the job came up.
    Skipped,
}

/// Completion signal payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceOutcome {
    pub name: SequenceName,
    pub status: SequenceStatus,
}

/// One queued sequence run.
#[derive(Debug)]
pub struct SequenceJob {
    pub instance: InstanceId,
    pub name: SequenceName,
    pub changes: ChangeSet,
    /// Identifier of the descendant that re-rendered, for `descendantChange`.
    pub origin: Option<String>,
    pub follow_up: FollowUp,
    pub(crate) done: Option<oneshot::Sender<SequenceOutcome>>,
}

impl SequenceJob {
    pub fn new(instance: InstanceId, name: SequenceName) -> Self {
        Self {
            instance,
            name,
            changes: ChangeSet::new(),
            origin: None,
            follow_up: FollowUp::None,
            done: None,
        }
    }

    pub fn with_changes(mut self, changes: ChangeSet) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_follow_up(mut self, follow_up: FollowUp) -> Self {
        self.follow_up = follow_up;
        self
    }

    /// Signal completion. A dropped receiver is fine.
    pub(crate) fn complete(&mut self, status: SequenceStatus) {
        if let Some(done) = self.done.take() {
            let _ = done.send(SequenceOutcome {
                name: self.name,
                status,
            });
        }
    }
}

#[derive(Debug)]
struct PendingGlobal {
    deadline: Instant,
    seq: u64,
    changes: ChangeSet,
}

/// The job queue plus per-instance trailing-edge debounce timers.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<SequenceJob>,
    timers: BTreeMap<InstanceId, PendingGlobal>,
    seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a job and hand back its completion signal.
    pub fn enqueue(&mut self, mut job: SequenceJob) -> oneshot::Receiver<SequenceOutcome> {
        let (tx, rx) = oneshot::channel();
        job.done = Some(tx);
        self.queue.push_back(job);
        rx
    }

    pub fn pop(&mut self) -> Option<SequenceJob> {
        self.queue.pop_front()
    }

    /// Drop every queued job. Their receivers observe a closed channel.
    pub fn clear_queue(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    /// Union `changes` into the instance's pending set and push its deadline
    /// out to `deadline`.
    pub fn collect(&mut self, instance: InstanceId, changes: ChangeSet, deadline: Instant) {
        self.seq += 1;
        let seq = self.seq;
        match self.timers.get_mut(&instance) {
            Some(pending) => {
                pending.changes.union(changes);
                pending.deadline = deadline;
                pending.seq = seq;
            }
            None => {
                self.timers.insert(
                    instance,
                    PendingGlobal {
                        deadline,
                        seq,
                        changes,
                    },
                );
            }
        }
    }

    /// Cancel the instance's timer and drop its collected changes.
    pub fn cancel(&mut self, instance: InstanceId) -> bool {
        self.timers.remove(&instance).is_some()
    }

    pub fn has_timer(&self, instance: InstanceId) -> bool {
        self.timers.contains_key(&instance)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|p| p.deadline).min()
    }

    /// Remove and return every timer due at `now`, earliest deadline first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(InstanceId, ChangeSet)> {
        let mut due: Vec<(InstanceId, Instant, u64)> = self
            .timers
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(&id, p)| (id, p.deadline, p.seq))
            .collect();
        due.sort_by_key(|&(_, deadline, seq)| (deadline, seq));
        due.into_iter()
            .filter_map(|(id, _, _)| self.timers.remove(&id).map(|p| (id, p.changes)))
            .collect()
    }

    /// No queued jobs and no pending timers.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.timers.is_empty()
    }
}
