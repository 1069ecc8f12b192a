//! Back navigation table.

use crate::session::{FlowMode, WorkflowPhase};

/// What data the session currently holds, as far as back navigation cares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataPresence {
    pub images: bool,
    pub script: bool,
    pub analysis: bool,
}

/// Target phase of a back step and the stores it discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackStep {
    pub phase: WorkflowPhase,
    /// Original image and analysis.
    pub clear_upload: bool,
    pub clear_script: bool,
    /// Generated images and their videos.
    pub clear_outputs: bool,
}

impl BackStep {
    fn to(phase: WorkflowPhase) -> Self {
        Self {
            phase,
            clear_upload: false,
            clear_script: false,
            clear_outputs: false,
        }
    }

    fn clearing_upload(mut self) -> Self {
        self.clear_upload = true;
        self
    }

    fn clearing_script(mut self) -> Self {
        self.clear_script = true;
        self
    }

    fn clearing_outputs(mut self) -> Self {
        self.clear_outputs = true;
        self
    }
}

/// Resolves one back step. `None` when the phase has no back affordance.
///
/// From `Error` the session resumes at the deepest phase its data still supports.
pub fn back_step(phase: WorkflowPhase, mode: Option<FlowMode>, data: DataPresence) -> Option<BackStep> {
    use WorkflowPhase::*;

    let video_flow = mode != Some(FlowMode::Photos);
    let step = match phase {
        Idle | Completed => return None,
        Error => {
            if data.images {
                BackStep::to(UserApproval)
            } else if data.script && video_flow {
                BackStep::to(ScriptApproval)
            } else if data.analysis {
                BackStep::to(DefiningContext)
            } else {
                BackStep::to(Idle).clearing_upload()
            }
        }
        Analyzing | DefiningContext => BackStep::to(Idle).clearing_upload(),
        GeneratingScript | ScriptApproval => BackStep::to(DefiningContext).clearing_script(),
        GeneratingImages | ReviewingImages | UserApproval => {
            if video_flow {
                BackStep::to(ScriptApproval).clearing_outputs()
            } else {
                BackStep::to(DefiningContext)
                    .clearing_outputs()
                    .clearing_script()
            }
        }
    };
    Some(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: DataPresence = DataPresence {
        images: true,
        script: true,
        analysis: true,
    };

    #[test]
    fn test_no_back_from_ends() {
        assert!(back_step(WorkflowPhase::Idle, Some(FlowMode::Video), ALL).is_none());
        assert!(back_step(WorkflowPhase::Completed, Some(FlowMode::Video), ALL).is_none());
    }

    #[test]
    fn test_back_from_context_clears_upload() {
        let step = back_step(WorkflowPhase::DefiningContext, Some(FlowMode::Video), ALL).unwrap();
        assert_eq!(step.phase, WorkflowPhase::Idle);
        assert!(step.clear_upload);
        assert!(!step.clear_outputs);
    }

    #[test]
    fn test_back_from_script_approval() {
        let step = back_step(WorkflowPhase::ScriptApproval, Some(FlowMode::Video), ALL).unwrap();
        assert_eq!(step.phase, WorkflowPhase::DefiningContext);
        assert!(step.clear_script);
        assert!(!step.clear_upload);
    }

    #[test]
    fn test_back_from_approval_depends_on_mode() {
        let video = back_step(WorkflowPhase::UserApproval, Some(FlowMode::Video), ALL).unwrap();
        assert_eq!(video.phase, WorkflowPhase::ScriptApproval);
        assert!(video.clear_outputs);
        assert!(!video.clear_script);

        let photos = back_step(WorkflowPhase::ReviewingImages, Some(FlowMode::Photos), ALL).unwrap();
        assert_eq!(photos.phase, WorkflowPhase::DefiningContext);
        assert!(photos.clear_outputs);
        assert!(photos.clear_script);
    }

    #[test]
    fn test_error_resumes_deepest_supported_phase() {
        let mode = Some(FlowMode::Video);
        assert_eq!(
            back_step(WorkflowPhase::Error, mode, ALL).unwrap().phase,
            WorkflowPhase::UserApproval
        );

        let script_only = DataPresence {
            images: false,
            ..ALL
        };
        assert_eq!(
            back_step(WorkflowPhase::Error, mode, script_only).unwrap().phase,
            WorkflowPhase::ScriptApproval
        );
        assert_eq!(
            back_step(WorkflowPhase::Error, Some(FlowMode::Photos), script_only)
                .unwrap()
                .phase,
            WorkflowPhase::DefiningContext
        );

        let nothing = back_step(WorkflowPhase::Error, mode, DataPresence::default()).unwrap();
        assert_eq!(nothing.phase, WorkflowPhase::Idle);
        assert!(nothing.clear_upload);
    }
}
