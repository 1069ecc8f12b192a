//! User intents emitted by views.

use crate::error::StudioResult;
use crate::media::UploadedFile;
use crate::session::{AspectRatio, ContextItemEdit, ContextType, FlowMode, UserContextItem};
use crate::workflow::Workflow;

/// Every action a view can ask the workflow to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    SelectMode(FlowMode),
    UploadImage(UploadedFile),
    AddContextItem(ContextType),
    EditContextItem {
        id: String,
        edit: ContextItemEdit,
    },
    SetContextItemImage {
        id: String,
        file: UploadedFile,
    },
    RemoveContextItem(String),
    ConfirmSetup {
        context_items: Vec<UserContextItem>,
        scene_count: u32,
        aspect_ratio: AspectRatio,
    },
    EditScene {
        id: String,
        description: Option<String>,
        prompt: Option<String>,
    },
    ConfirmScript,
    Approve(String),
    Reject(String),
    SubmitFeedback {
        id: String,
        feedback: String,
    },
    Retry(String),
    AddScene,
    RequestVideo(String),
    Finish,
    DismissError,
    GoBack,
    Reset,
}

impl Intent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectMode(_) => "select_mode",
            Self::UploadImage(_) => "upload_image",
            Self::AddContextItem(_) => "add_context_item",
            Self::EditContextItem { .. } => "edit_context_item",
            Self::SetContextItemImage { .. } => "set_context_item_image",
            Self::RemoveContextItem(_) => "remove_context_item",
            Self::ConfirmSetup { .. } => "confirm_setup",
            Self::EditScene { .. } => "edit_scene",
            Self::ConfirmScript => "confirm_script",
            Self::Approve(_) => "approve",
            Self::Reject(_) => "reject",
            Self::SubmitFeedback { .. } => "submit_feedback",
            Self::Retry(_) => "retry",
            Self::AddScene => "add_scene",
            Self::RequestVideo(_) => "request_video",
            Self::Finish => "finish",
            Self::DismissError => "dismiss_error",
            Self::GoBack => "go_back",
            Self::Reset => "reset",
        }
    }

    /// Applies the intent to the workflow.
    pub async fn dispatch(self, workflow: &Workflow) -> StudioResult<()> {
        tracing::debug!(intent = self.name(), "dispatching intent");
        match self {
            Self::SelectMode(mode) => workflow.select_mode(mode),
            Self::UploadImage(file) => workflow.upload_image(file).await,
            Self::AddContextItem(context_type) => workflow.add_context_item(context_type).map(|_| ()),
            Self::EditContextItem { id, edit } => workflow.edit_context_item(&id, edit),
            Self::SetContextItemImage { id, file } => workflow.set_context_item_image(&id, file),
            Self::RemoveContextItem(id) => workflow.remove_context_item(&id),
            Self::ConfirmSetup {
                context_items,
                scene_count,
                aspect_ratio,
            } => {
                workflow
                    .confirm_setup(context_items, scene_count, aspect_ratio)
                    .await
            }
            Self::EditScene {
                id,
                description,
                prompt,
            } => workflow.edit_scene(&id, description, prompt),
            Self::ConfirmScript => workflow.confirm_script().await,
            Self::Approve(id) => workflow.approve(&id),
            Self::Reject(id) => workflow.reject(&id),
            Self::SubmitFeedback { id, feedback } => workflow.submit_feedback(&id, &feedback).await,
            Self::Retry(id) => workflow.retry(&id).await,
            Self::AddScene => workflow.add_scene().await,
            Self::RequestVideo(id) => workflow.request_video(&id).await,
            Self::Finish => workflow.finish(),
            Self::DismissError => {
                workflow.dismiss_error();
                Ok(())
            }
            Self::GoBack => workflow.go_back(),
            Self::Reset => {
                workflow.reset();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gateway::mock::MockGateway;
    use crate::session::WorkflowPhase;

    #[tokio::test]
    async fn test_dispatch_drives_workflow() {
        let workflow = Workflow::new(Arc::new(MockGateway::new()));
        let intents = vec![
            Intent::SelectMode(FlowMode::Video),
            Intent::UploadImage(UploadedFile::new(vec![1, 2, 3], "image/jpeg")),
            Intent::ConfirmSetup {
                context_items: vec![],
                scene_count: 2,
                aspect_ratio: AspectRatio::Portrait,
            },
            Intent::ConfirmScript,
        ];
        for intent in intents {
            intent.dispatch(&workflow).await.unwrap();
        }
        assert_eq!(workflow.phase(), WorkflowPhase::UserApproval);

        let image_id = workflow.snapshot().images[0].id.clone();
        Intent::Approve(image_id).dispatch(&workflow).await.unwrap();
        Intent::Finish.dispatch(&workflow).await.unwrap();
        assert_eq!(workflow.phase(), WorkflowPhase::Completed);

        Intent::Reset.dispatch(&workflow).await.unwrap();
        assert!(workflow.snapshot().mode.is_none());
    }

    #[tokio::test]
    async fn test_rejected_intent_surfaces_error() {
        let workflow = Workflow::new(Arc::new(MockGateway::new()));
        let err = Intent::ConfirmScript.dispatch(&workflow).await.unwrap_err();
        assert!(err.to_string().contains("ScriptApproval"));
        assert_eq!(Intent::GoBack.name(), "go_back");
    }
}
