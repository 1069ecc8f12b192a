//! Backend gateway: typed request/response boundary to the AI and storage service.
//!
//! This module provides:
//! - `Gateway`: one async operation per backend capability
//! - `client`: HttpGateway speaking the action-dispatched JSON RPC
//! - `mock`: scripted MockGateway for orchestration tests

pub mod client;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;

use crate::error::StudioResult;
use crate::media::ImageData;
use crate::session::{
    AspectRatio, ImageAnalysis, ProductComponent, ReviewResult, ScriptScene, UserContextItem,
    VideoOperation,
};

pub use client::HttpGateway;

/// Backend capabilities used by the workflow.
///
/// Every call is a single request that yields either a value or a classified
/// [`StudioError`](crate::error::StudioError). Implementations never retry;
/// retries are a workflow decision.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Analyzes the uploaded product photo.
    async fn analyze_image(&self, image: &ImageData) -> StudioResult<ImageAnalysis>;

    /// Plans scenes. The requested count is advisory.
    async fn generate_scene_plan(
        &self,
        analysis: &ImageAnalysis,
        scene_count: u32,
        context_items: &[UserContextItem],
    ) -> StudioResult<Vec<ScriptScene>>;

    /// Places the product into a new scene described by `prompt`.
    async fn create_image(
        &self,
        original: &ImageData,
        prompt: &str,
        context_images: &[ImageData],
    ) -> StudioResult<ImageData>;

    /// Scores how faithfully `candidate` preserves the original product.
    async fn review_image(
        &self,
        original: &ImageData,
        candidate: &ImageData,
        components: &[ProductComponent],
        context_images: &[ImageData],
    ) -> StudioResult<ReviewResult>;

    /// Regenerates an image from user feedback on the previous attempt.
    async fn regenerate_image(
        &self,
        original: &ImageData,
        previous: &ImageData,
        prompt: &str,
        feedback: &str,
        context_images: &[ImageData],
    ) -> StudioResult<ImageData>;

    /// Plans one more scene that differs from `existing`.
    async fn generate_single_scene(
        &self,
        analysis: &ImageAnalysis,
        existing: &[ScriptScene],
        context_items: &[UserContextItem],
    ) -> StudioResult<ScriptScene>;

    /// Starts a video job. The returned handle is usually not done yet.
    async fn generate_video(
        &self,
        prompt: &str,
        image: Option<&ImageData>,
        aspect_ratio: AspectRatio,
    ) -> StudioResult<VideoOperation>;

    /// Refreshes a job handle. Idempotent.
    async fn poll_video_operation(&self, operation: &VideoOperation) -> StudioResult<VideoOperation>;

    /// Resolves a remote video URI to bytes and media type.
    async fn download_video_payload(&self, uri: &str) -> StudioResult<ImageData>;
}
