use std::fmt;

use crate::iteration_types::{IterationId, IterationRecord, Lifecycle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Idle,
    WaitForApproval(IterationId),
    RunIteration(IterationId),
}

impl Action {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::WaitForApproval(_) => "wait",
            Self::RunIteration(_) => "run",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("action=idle"),
            Self::WaitForApproval(id) | Self::RunIteration(id) => {
                write!(f, "action={} iteration={}", self.label(), id)
            }
        }
    }
}

/// Picks the next action for records already in iteration order.
///
/// A record awaiting approval blocks everything else; otherwise the first
/// pending record runs.
pub(crate) fn select_action(records: &[IterationRecord]) -> Action {
    if let Some(record) = records
        .iter()
        .find(|record| record.lifecycle == Lifecycle::AwaitingApproval)
    {
        return Action::WaitForApproval(record.iteration);
    }
    if let Some(record) = records
        .iter()
        .find(|record| record.lifecycle == Lifecycle::Pending)
    {
        return Action::RunIteration(record.iteration);
    }
    Action::Idle
}
