//! Presentation adapters.
//!
//! Views never touch the stores. They render a [`WorkflowSnapshot`] and send
//! [`Intent`]s back to the [`Workflow`](crate::workflow::Workflow).
//!
//! This module provides:
//! - `snapshot`: WorkflowSnapshot and per-image ImageCard affordances
//! - `intent`: Intent enum and its dispatch onto the workflow
//! - step indicator helpers

mod intent;
mod snapshot;

pub use intent::Intent;
pub use snapshot::{ImageCard, WorkflowSnapshot};

use crate::session::WorkflowPhase;

/// Labels of the step indicator, in phase order.
pub const STEPS: [&str; 8] = [
    "Upload",
    "Analysis",
    "Context",
    "Script",
    "Approval",
    "Generation",
    "Review",
    "Finish",
];

/// 1-based step shown for a phase, or `None` outside the guided steps.
pub fn current_step(phase: WorkflowPhase) -> Option<usize> {
    (phase > WorkflowPhase::Idle && phase < WorkflowPhase::Completed).then(|| phase.ordinal() + 1)
}

/// Label of the current step.
pub fn step_label(phase: WorkflowPhase) -> Option<&'static str> {
    current_step(phase).map(|step| STEPS[step - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_indicator() {
        assert_eq!(current_step(WorkflowPhase::Idle), None);
        assert_eq!(current_step(WorkflowPhase::Analyzing), Some(2));
        assert_eq!(step_label(WorkflowPhase::ScriptApproval), Some("Approval"));
        assert_eq!(step_label(WorkflowPhase::UserApproval), Some("Finish"));
        assert_eq!(current_step(WorkflowPhase::Completed), None);
        assert_eq!(current_step(WorkflowPhase::Error), None);
    }
}
