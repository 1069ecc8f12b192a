//! Data models for a content production session.
//!
//! Wire-facing structs serialize in camelCase to match the backend's JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StudioError;
use crate::media::ImageData;

/// Minimum fidelity score for an automated approval.
pub const APPROVAL_THRESHOLD: u8 = 3;

// =============================================================================
// WORKFLOW PHASE
// =============================================================================

/// Ordered workflow phase. Ordering controls which view is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorkflowPhase {
    #[default]
    Idle,
    Analyzing,
    DefiningContext,
    GeneratingScript,
    ScriptApproval,
    GeneratingImages,
    ReviewingImages,
    UserApproval,
    Completed,
    Error,
}

impl WorkflowPhase {
    /// Zero-based position in the phase ordering.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Whether a back affordance applies in this phase.
    pub fn allows_back(self) -> bool {
        (self > Self::Idle && self < Self::Completed) || self == Self::Error
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// FLOW MODE & ASPECT RATIO
// =============================================================================

/// Which product the user chose on the landing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowMode {
    /// Script approval gate, then images, then optional videos.
    Video,
    /// Photo prompts go straight to image fan-out.
    Photos,
}

impl FromStr for FlowMode {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" | "full" => Ok(Self::Video),
            "photos" | "photo" => Ok(Self::Photos),
            other => Err(StudioError::missing_precondition(format!(
                "unknown flow mode '{other}'"
            ))),
        }
    }
}

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait => "9:16",
            Self::Landscape => "16:9",
        }
    }

    /// Video generation does not accept square output; it is remapped to portrait.
    pub fn for_video(self) -> Self {
        match self {
            Self::Square => Self::Portrait,
            other => other,
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1:1" => Ok(Self::Square),
            "9:16" => Ok(Self::Portrait),
            "16:9" => Ok(Self::Landscape),
            other => Err(StudioError::missing_precondition(format!(
                "unsupported aspect ratio '{other}'"
            ))),
        }
    }
}

// =============================================================================
// ANALYSIS
// =============================================================================

/// One distinct part of a multi-part product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductComponent {
    pub name: String,
    pub description: String,
    /// Real-world size relative to use, e.g. "fits in a hand".
    pub scale: String,
}

/// Result of analyzing the uploaded product photo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub product_name: String,
    pub description: String,
    pub features: Vec<String>,
    pub target_audience: String,
    pub pain_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ProductComponent>>,
}

impl ImageAnalysis {
    /// Components, or an empty slice when the product is a single piece.
    pub fn components(&self) -> &[ProductComponent] {
        self.components.as_deref().unwrap_or_default()
    }
}

// =============================================================================
// CONTEXT ITEMS
// =============================================================================

/// Role of a user-supplied reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    Component,
    UsageReference,
    ScaleReference,
    DetailReference,
}

impl ContextType {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Component => "Component",
            Self::UsageReference => "Usage reference",
            Self::ScaleReference => "Scale reference",
            Self::DetailReference => "Detail reference",
        }
    }
}

/// A user-supplied reference used to ground generation in real product details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContextItem {
    pub id: String,
    pub image_data: Option<ImageData>,
    #[serde(rename = "type")]
    pub context_type: ContextType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserContextItem {
    /// Creates an empty item of the given type with a fresh ID.
    pub fn new(context_type: ContextType) -> Self {
        Self {
            id: format!("item-{}", uuid::Uuid::new_v4()),
            image_data: None,
            context_type,
            description: String::new(),
            name: None,
        }
    }

    /// Pre-populates an item from a detected component; the image is left empty.
    pub fn from_component(component: &ProductComponent) -> Self {
        Self {
            id: format!("comp-{}", uuid::Uuid::new_v4()),
            image_data: None,
            context_type: ContextType::Component,
            description: component.description.clone(),
            name: Some(component.name.clone()),
        }
    }

    /// Builder: Set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: Set name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: Set reference image.
    pub fn with_image(mut self, image: ImageData) -> Self {
        self.image_data = Some(image);
        self
    }
}

/// Field-level edit of a context item. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextItemEdit {
    pub context_type: Option<ContextType>,
    pub description: Option<String>,
    pub name: Option<String>,
}

impl ContextItemEdit {
    /// Applies the edit in place.
    pub fn apply(self, item: &mut UserContextItem) {
        if let Some(context_type) = self.context_type {
            item.context_type = context_type;
        }
        if let Some(description) = self.description {
            item.description = description;
        }
        if let Some(name) = self.name {
            item.name = Some(name);
        }
    }
}

// =============================================================================
// SCRIPT
// =============================================================================

/// One planned unit of visual content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptScene {
    pub id: String,
    pub scene_number: u32,
    /// User-facing goal of the scene.
    pub description: String,
    /// Image-generation prompt.
    pub prompt: String,
}

impl ScriptScene {
    /// Creates a new scene with the given ID and number.
    pub fn new(id: impl Into<String>, scene_number: u32) -> Self {
        Self {
            id: id.into(),
            scene_number,
            ..Default::default()
        }
    }

    /// Builder: Set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: Set prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }
}

// =============================================================================
// GENERATED IMAGES
// =============================================================================

/// Automated fidelity review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    /// 1 (poor) to 5 (faithful replica).
    pub score: u8,
    pub reason: String,
}

impl ReviewResult {
    /// Creates a review result.
    pub fn new(score: u8, reason: impl Into<String>) -> Self {
        Self {
            score,
            reason: reason.into(),
        }
    }

    /// `score >= 3` approves.
    pub fn is_approved(&self) -> bool {
        self.score >= APPROVAL_THRESHOLD
    }

    /// Status the image moves to once this review is applied.
    pub fn verdict(&self) -> ImageStatus {
        if self.is_approved() {
            ImageStatus::AiApproved
        } else {
            ImageStatus::AiRejected
        }
    }
}

/// Per-image status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageStatus {
    #[default]
    Pending,
    Generating,
    Reviewing,
    AiApproved,
    AiRejected,
    UserApproved,
    UserRejected,
    Failed,
}

impl ImageStatus {
    /// A backend call for this image is outstanding or queued.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Pending | Self::Generating | Self::Reviewing)
    }

    /// Statuses in which `image_data` must be present.
    pub fn requires_image(self) -> bool {
        matches!(
            self,
            Self::Reviewing | Self::AiApproved | Self::AiRejected | Self::UserApproved
        )
    }

    /// Statuses that accept a user approve/reject decision.
    pub fn accepts_user_decision(self) -> bool {
        matches!(
            self,
            Self::AiApproved | Self::AiRejected | Self::UserApproved | Self::UserRejected
        )
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Generating => "GENERATING",
            Self::Reviewing => "REVIEWING",
            Self::AiApproved => "AI_APPROVED",
            Self::AiRejected => "AI_REJECTED",
            Self::UserApproved => "USER_APPROVED",
            Self::UserRejected => "USER_REJECTED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate image for one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub id: String,
    pub scene_id: String,
    pub prompt: String,
    /// Snapshot of the scene description at creation time.
    pub pain_point: String,
    pub status: ImageStatus,
    pub image_data: Option<ImageData>,
    pub review: Option<ReviewResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_image_data: Option<ImageData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default)]
    pub regeneration_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Bumped whenever a generation starts; completions from older attempts are dropped.
    #[serde(default)]
    pub attempt: u32,
}

impl GeneratedImage {
    /// Creates a pending image for a scene.
    pub fn for_scene(scene: &ScriptScene) -> Self {
        Self {
            id: format!("img-{}", uuid::Uuid::new_v4()),
            scene_id: scene.id.clone(),
            prompt: scene.prompt.clone(),
            pain_point: scene.description.clone(),
            status: ImageStatus::Pending,
            image_data: None,
            review: None,
            previous_image_data: None,
            feedback: None,
            regeneration_count: 0,
            error_message: None,
            attempt: 0,
        }
    }

    /// Builder: Set status.
    pub fn with_status(mut self, status: ImageStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder: Set image data.
    pub fn with_image(mut self, image: ImageData) -> Self {
        self.image_data = Some(image);
        self
    }

    /// Whether the status/image invariant holds.
    pub fn is_consistent(&self) -> bool {
        !self.status.requires_image() || self.image_data.is_some()
    }
}

// =============================================================================
// VIDEOS
// =============================================================================

/// Per-video status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    #[default]
    Pending,
    Generating,
    Completed,
    Failed,
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Reference to a generated video file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFile {
    #[serde(default)]
    pub uri: Option<String>,
}

/// One entry of a completed video job's output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOutput {
    #[serde(default)]
    pub video: Option<VideoFile>,
}

/// Result payload of a finished video job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResult {
    #[serde(default)]
    pub generated_videos: Vec<VideoOutput>,
}

impl VideoResult {
    /// URI of the first generated video, if any.
    pub fn download_uri(&self) -> Option<&str> {
        self.generated_videos
            .first()
            .and_then(|output| output.video.as_ref())
            .and_then(|file| file.uri.as_deref())
            .filter(|uri| !uri.is_empty())
    }
}

/// Failure reported by a finished video job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub message: String,
}

/// Handle to a long-running backend video job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub done: bool,
    /// Present only when `done`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<VideoResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl VideoOperation {
    /// Creates an unfinished handle with the given job name.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Builder: Mark done with a result URI.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.done = true;
        self.response = Some(VideoResult {
            generated_videos: vec![VideoOutput {
                video: Some(VideoFile {
                    uri: Some(uri.into()),
                }),
            }],
        });
        self
    }

    /// Builder: Mark done with an error.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.done = true;
        self.error = Some(OperationError {
            message: message.into(),
        });
        self
    }

    /// Whether two handles refer to the same backend job.
    pub fn same_job(&self, other: &VideoOperation) -> bool {
        match (&self.name, &other.name) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

/// Animated clip for one approved image. At most one per image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedVideo {
    pub id: String,
    pub image_id: String,
    pub status: VideoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<VideoOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Bumped on every (re)start; results from older jobs are dropped.
    #[serde(default)]
    pub attempt: u32,
}

impl GeneratedVideo {
    /// Creates a generating entry for an image.
    pub fn for_image(image_id: impl Into<String>) -> Self {
        let image_id = image_id.into();
        Self {
            id: format!("vid-{image_id}"),
            image_id,
            status: VideoStatus::Generating,
            operation: None,
            download_url: None,
            blob_url: None,
            error_message: None,
            attempt: 1,
        }
    }

    /// Generating with an unfinished job handle.
    pub fn is_pollable(&self) -> bool {
        self.status == VideoStatus::Generating
            && self.operation.as_ref().is_some_and(|op| !op.done)
    }
}

// =============================================================================
// TESTS
// =============================================================================
