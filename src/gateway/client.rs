//! HTTP client for the action-dispatched backend endpoint.
//!
//! Every call is `POST {endpoint}` with body `{ "action": ..., "payload": ... }`.
//! The backend answers with the result JSON, or `{ "error": ... }` and a non-2xx status.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::GatewayConfig;
use crate::error::{StudioError, StudioResult};
use crate::gateway::Gateway;
use crate::media::ImageData;
use crate::session::{
    AspectRatio, ImageAnalysis, ProductComponent, ReviewResult, ScriptScene, UserContextItem,
    VideoOperation,
};

/// Error body returned by the backend.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Gateway backed by the remote service.
pub struct HttpGateway {
    client: Client,
    endpoint: String,
}

impl HttpGateway {
    /// Create a client from configuration.
    pub fn new(config: &GatewayConfig) -> StudioResult<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = &config.api_key {
            let bearer = header::HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| StudioError::config(format!("invalid API key: {e}")))?;
            let raw = header::HeaderValue::from_str(key)
                .map_err(|e| StudioError::config(format!("invalid API key: {e}")))?;
            headers.insert(header::AUTHORIZATION, bearer);
            headers.insert("apikey", raw);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Endpoint URL this client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST one action and decode its result.
    async fn call<T: DeserializeOwned>(&self, action: &str, payload: Value) -> StudioResult<T> {
        tracing::debug!(action, "calling backend");
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "action": action, "payload": payload }))
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        decode_response(status, &body)
    }
}

/// Classifies a raw backend response.
///
/// A non-2xx status is a backend failure; the `error` field supplies the message when present.
/// A 2xx body that carries an `error` field is also a logical failure.
fn decode_response<T: DeserializeOwned>(status: u16, body: &str) -> StudioResult<T> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("backend returned status {status}"));
        return Err(StudioError::backend(message));
    }

    let value: Value = serde_json::from_str(body)?;
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(StudioError::backend(message));
    }
    Ok(serde_json::from_value(value)?)
}

/// Image-producing actions answer `null` when the model returned no image part.
fn require_image(image: Option<ImageData>, action: &str) -> StudioResult<ImageData> {
    image.ok_or_else(|| StudioError::generation_failed(format!("{action} returned no image")))
}

/// The planner reads type, name, description and image from every item,
/// including items without an image.
fn scene_plan_payload(
    analysis: &ImageAnalysis,
    scene_count: u32,
    context_items: &[UserContextItem],
) -> Value {
    json!({
        "analysis": analysis,
        "numberOfScenes": scene_count,
        "contextImages": context_items,
    })
}

fn validate_review(review: ReviewResult) -> StudioResult<ReviewResult> {
    if (1..=5).contains(&review.score) {
        Ok(review)
    } else {
        Err(StudioError::invalid_response(format!(
            "review score {} outside 1..=5",
            review.score
        )))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn analyze_image(&self, image: &ImageData) -> StudioResult<ImageAnalysis> {
        self.call("analyzeImage", json!({ "imageData": image })).await
    }

    async fn generate_scene_plan(
        &self,
        analysis: &ImageAnalysis,
        scene_count: u32,
        context_items: &[UserContextItem],
    ) -> StudioResult<Vec<ScriptScene>> {
        self.call(
            "generatePrompts",
            scene_plan_payload(analysis, scene_count, context_items),
        )
        .await
    }

    async fn create_image(
        &self,
        original: &ImageData,
        prompt: &str,
        context_images: &[ImageData],
    ) -> StudioResult<ImageData> {
        let image: Option<ImageData> = self
            .call(
                "createImage",
                json!({
                    "originalImage": original,
                    "prompt": prompt,
                    "contextImages": context_images,
                }),
            )
            .await?;
        require_image(image, "createImage")
    }

    async fn review_image(
        &self,
        original: &ImageData,
        candidate: &ImageData,
        components: &[ProductComponent],
        context_images: &[ImageData],
    ) -> StudioResult<ReviewResult> {
        let review: ReviewResult = self
            .call(
                "reviewImage",
                json!({
                    "originalImage": original,
                    "generatedImage": candidate,
                    "components": components,
                    "contextImages": context_images,
                }),
            )
            .await?;
        validate_review(review)
    }

    async fn regenerate_image(
        &self,
        original: &ImageData,
        previous: &ImageData,
        prompt: &str,
        feedback: &str,
        context_images: &[ImageData],
    ) -> StudioResult<ImageData> {
        let image: Option<ImageData> = self
            .call(
                "regenerateImage",
                json!({
                    "originalImage": original,
                    "previousImage": previous,
                    "prompt": prompt,
                    "feedback": feedback,
                    "contextImages": context_images,
                }),
            )
            .await?;
        require_image(image, "regenerateImage")
    }

    async fn generate_single_scene(
        &self,
        analysis: &ImageAnalysis,
        existing: &[ScriptScene],
        context_items: &[UserContextItem],
    ) -> StudioResult<ScriptScene> {
        self.call(
            "generateSingleScene",
            json!({
                "analysis": analysis,
                "script": existing,
                "userContextItems": context_items,
            }),
        )
        .await
    }

    async fn generate_video(
        &self,
        prompt: &str,
        image: Option<&ImageData>,
        aspect_ratio: AspectRatio,
    ) -> StudioResult<VideoOperation> {
        self.call(
            "generateVideo",
            json!({
                "prompt": prompt,
                "imageData": image,
                "aspectRatio": aspect_ratio,
            }),
        )
        .await
    }

    async fn poll_video_operation(&self, operation: &VideoOperation) -> StudioResult<VideoOperation> {
        self.call("getVideosOperation", json!({ "operation": operation }))
            .await
    }

    async fn download_video_payload(&self, uri: &str) -> StudioResult<ImageData> {
        let payload: ImageData = self.call("downloadVideo", json!({ "url": uri })).await?;
        if payload.encoded_bytes.is_empty() {
            return Err(StudioError::generation_failed("downloaded video is empty"));
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_success() {
        let review: ReviewResult =
            decode_response(200, r#"{"score":4,"reason":"colors match"}"#).unwrap();
        assert_eq!(review, ReviewResult::new(4, "colors match"));
    }

    #[test]
    fn test_decode_error_status_uses_message() {
        let err = decode_response::<ReviewResult>(500, r#"{"error":"quota exceeded"}"#).unwrap_err();
        assert_eq!(err, StudioError::backend("quota exceeded"));
    }

    #[test]
    fn test_decode_error_status_without_body() {
        let err = decode_response::<ReviewResult>(502, "Bad Gateway").unwrap_err();
        assert_eq!(err, StudioError::backend("backend returned status 502"));
    }

    #[test]
    fn test_decode_error_field_on_success_status() {
        let err = decode_response::<ImageAnalysis>(200, r#"{"error":"model overloaded"}"#)
            .unwrap_err();
        assert!(matches!(err, StudioError::Backend(msg) if msg == "model overloaded"));
    }

    #[test]
    fn test_decode_malformed_payload() {
        let err = decode_response::<Vec<ScriptScene>>(200, r#"{"scenes":"nope"}"#).unwrap_err();
        assert!(matches!(err, StudioError::InvalidResponseFormat(_)));

        let err = decode_response::<ImageAnalysis>(200, "not json").unwrap_err();
        assert!(matches!(err, StudioError::InvalidResponseFormat(_)));
    }

    #[test]
    fn test_null_image_is_generation_failure() {
        let image: Option<ImageData> = decode_response(200, "null").unwrap();
        let err = require_image(image, "createImage").unwrap_err();
        assert!(matches!(err, StudioError::GenerationFailed(_)));
    }

    #[test]
    fn test_review_score_range() {
        assert!(validate_review(ReviewResult::new(1, "")).is_ok());
        assert!(validate_review(ReviewResult::new(5, "")).is_ok());
        assert!(matches!(
            validate_review(ReviewResult::new(0, "")),
            Err(StudioError::InvalidResponseFormat(_))
        ));
        assert!(validate_review(ReviewResult::new(6, "")).is_err());
    }

    #[test]
    fn test_scene_plan_payload_keeps_every_context_item() {
        use crate::session::ContextType;

        let items = vec![
            UserContextItem::new(ContextType::ScaleReference)
                .with_name("mug")
                .with_description("next to a coffee mug"),
            UserContextItem::new(ContextType::UsageReference)
                .with_description("on a podcast desk")
                .with_image(ImageData::new("QUJD", "image/png")),
        ];
        let payload = scene_plan_payload(&ImageAnalysis::default(), 3, &items);

        assert_eq!(payload["numberOfScenes"], 3);
        let sent = payload["contextImages"].as_array().unwrap();
        assert_eq!(sent.len(), 2);

        assert_eq!(sent[0]["type"], "scale_reference");
        assert_eq!(sent[0]["name"], "mug");
        assert_eq!(sent[0]["description"], "next to a coffee mug");
        assert!(sent[0]["imageData"].is_null());

        assert_eq!(sent[1]["type"], "usage_reference");
        assert_eq!(sent[1]["imageData"]["base64"], "QUJD");
        assert_eq!(sent[1]["imageData"]["mimeType"], "image/png");
    }

    #[test]
    fn test_video_operation_decodes_pending_handle() {
        let op: VideoOperation =
            decode_response(200, r#"{"name":"models/veo/operations/123","done":false}"#).unwrap();
        assert_eq!(op.name.as_deref(), Some("models/veo/operations/123"));
        assert!(!op.done);
        assert!(op.response.is_none());
    }

    #[test]
    fn test_client_builds_with_api_key() {
        let config = GatewayConfig::new("http://localhost:54321/functions/v1/gemini-service/")
            .with_api_key("anon");
        let gateway = HttpGateway::new(&config).unwrap();
        assert_eq!(
            gateway.endpoint(),
            "http://localhost:54321/functions/v1/gemini-service"
        );
    }
}
