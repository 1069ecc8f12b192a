//! Workflow orchestrator.
//!
//! [`Workflow`] owns the session stores and is the only writer. Views read
//! [`WorkflowSnapshot`]s and call the intent methods below.
//!
//! Intents return `Err` only when they are rejected outright (wrong phase,
//! unknown ID, item not in a status that allows the action). Rejected intents
//! leave state untouched. Backend failures are never returned: they land in
//! state, either on the affected item or as the global error.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::config::WorkflowConfig;
use crate::error::{StudioError, StudioResult};
use crate::gateway::Gateway;
use crate::media::{Blob, BlobRegistry, UploadedFile};
use crate::session::*;
use crate::view::WorkflowSnapshot;
use crate::workflow::navigation::{back_step, DataPresence};
use crate::workflow::pipeline::{begin_attempt, GenerationContext, Job};

/// Smallest scene count accepted by `confirm_setup`.
pub const MIN_SCENE_COUNT: u32 = 1;
/// Largest scene count accepted by `confirm_setup`.
pub const MAX_SCENE_COUNT: u32 = 6;
pub const DEFAULT_SCENE_COUNT: u32 = 3;

pub(crate) struct Inner {
    pub(crate) gateway: Arc<dyn Gateway>,
    pub(crate) store: Mutex<SessionStore>,
    pub(crate) blobs: BlobRegistry,
    pub(crate) config: WorkflowConfig,
    pub(crate) poller: Mutex<Option<JoinHandle<()>>>,
}

/// One production session.
///
/// Cheap to clone; clones share the same session. Store locks are never held
/// across a backend call, so concurrent completions interleave per item.
#[derive(Clone)]
pub struct Workflow {
    pub(crate) inner: Arc<Inner>,
}

fn expect_phase(store: &SessionStore, expected: WorkflowPhase) -> StudioResult<()> {
    if store.phase == expected {
        Ok(())
    } else {
        Err(StudioError::invalid_phase(
            expected.to_string(),
            store.phase.to_string(),
        ))
    }
}

fn image_not_found(id: &str) -> StudioError {
    StudioError::not_found(format!("image {id}"))
}

impl Workflow {
    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Creates a session on the landing selection with default configuration.
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_config(gateway, WorkflowConfig::default())
    }

    /// Creates a session with explicit configuration.
    pub fn with_config(gateway: Arc<dyn Gateway>, config: WorkflowConfig) -> Self {
        let store = SessionStore::new(config.default_aspect_ratio);
        Self {
            inner: Arc::new(Inner {
                gateway,
                store: Mutex::new(store),
                blobs: BlobRegistry::new(),
                config,
                poller: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.inner.config
    }

    // =========================================================================
    // STATE ACCESS
    // =========================================================================

    pub(crate) fn read<R>(&self, f: impl FnOnce(&SessionStore) -> R) -> R {
        f(&self.inner.store.lock())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut SessionStore) -> R) -> R {
        f(&mut self.inner.store.lock())
    }

    /// Read-only copy of everything a view renders.
    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.read(WorkflowSnapshot::from_store)
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.read(|s| s.phase)
    }

    /// Looks up a downloaded video by its local URL.
    pub fn blob(&self, url: &str) -> Option<Blob> {
        self.inner.blobs.get(url)
    }

    pub(crate) fn generation_context(&self) -> StudioResult<GenerationContext> {
        self.read(|s| {
            let original = s
                .original_image
                .clone()
                .ok_or_else(|| StudioError::missing_precondition("no product image uploaded"))?;
            Ok(GenerationContext {
                original,
                context_images: s.context_images(),
                components: s
                    .analysis
                    .as_ref()
                    .map(|a| a.components().to_vec())
                    .unwrap_or_default(),
            })
        })
    }

    /// Drops generated images and videos, releasing video blobs.
    pub(crate) fn discard_outputs(&self, store: &mut SessionStore) {
        for url in store.video_blob_urls() {
            self.inner.blobs.revoke(&url);
        }
        store.clear_images();
        store.clear_videos();
        store.is_adding_scene = false;
    }

    pub(crate) fn set_phase_if_current(&self, epoch: u64, phase: WorkflowPhase) -> bool {
        self.write(|s| {
            if s.epoch != epoch {
                tracing::debug!(%phase, "skipping phase change from superseded run");
                return false;
            }
            s.phase = phase;
            true
        })
    }

    pub(crate) fn fail_session(&self, epoch: u64, err: &StudioError) {
        self.write(|s| {
            if s.epoch == epoch {
                tracing::error!(phase = %s.phase, error = %err, "workflow step failed");
                s.fail(err.user_message());
            }
        });
    }

    // =========================================================================
    // UPLOAD & ANALYSIS
    // =========================================================================

    /// Picks the flow on the landing selection.
    pub fn select_mode(&self, mode: FlowMode) -> StudioResult<()> {
        self.write(|s| {
            expect_phase(s, WorkflowPhase::Idle)?;
            s.mode = Some(mode);
            Ok::<_, StudioError>(())
        })?;
        tracing::info!(?mode, "flow mode selected");
        Ok(())
    }

    /// Encodes the upload and analyzes it. Non-image content is ignored.
    pub async fn upload_image(&self, file: UploadedFile) -> StudioResult<()> {
        if !file.is_image() {
            tracing::debug!(media_type = %file.media_type, "ignoring non-image upload");
            return Ok(());
        }
        let image = file.to_image_data();

        let epoch = self.write(|s| {
            if s.mode.is_none() {
                return Err(StudioError::missing_precondition(
                    "select a flow mode before uploading",
                ));
            }
            expect_phase(s, WorkflowPhase::Idle)?;
            s.original_image = Some(image.clone());
            s.analysis = None;
            s.error = None;
            s.phase = WorkflowPhase::Analyzing;
            Ok(s.epoch)
        })?;
        tracing::info!(media_type = %image.media_type, bytes = image.approx_len(), "analyzing upload");

        let result = self.inner.gateway.analyze_image(&image).await;
        match result {
            Ok(analysis) => {
                self.write(|s| {
                    if s.epoch != epoch {
                        return;
                    }
                    let items = analysis
                        .components()
                        .iter()
                        .map(UserContextItem::from_component)
                        .collect();
                    s.replace_context_items(items);
                    tracing::info!(
                        product = %analysis.product_name,
                        components = analysis.components().len(),
                        "analysis complete"
                    );
                    s.analysis = Some(analysis);
                    s.phase = WorkflowPhase::DefiningContext;
                });
            }
            Err(e) => self.fail_session(epoch, &e),
        }
        Ok(())
    }

    // =========================================================================
    // CONTEXT
    // =========================================================================

    /// Adds an empty context item and returns its ID.
    pub fn add_context_item(&self, context_type: ContextType) -> StudioResult<String> {
        self.write(|s| {
            expect_phase(s, WorkflowPhase::DefiningContext)?;
            let item = UserContextItem::new(context_type);
            let id = item.id.clone();
            s.insert_context_item(item);
            Ok(id)
        })
    }

    pub fn edit_context_item(&self, id: &str, edit: ContextItemEdit) -> StudioResult<()> {
        self.write(|s| {
            expect_phase(s, WorkflowPhase::DefiningContext)?;
            if s.update_context_item(id, |item| edit.apply(item)) {
                Ok(())
            } else {
                Err(StudioError::not_found(format!("context item {id}")))
            }
        })
    }

    /// Attaches a reference image. Non-image content is ignored.
    pub fn set_context_item_image(&self, id: &str, file: UploadedFile) -> StudioResult<()> {
        if !file.is_image() {
            tracing::debug!(media_type = %file.media_type, "ignoring non-image context upload");
            return Ok(());
        }
        let image = file.to_image_data();
        self.write(|s| {
            expect_phase(s, WorkflowPhase::DefiningContext)?;
            if s.update_context_item(id, |item| item.image_data = Some(image)) {
                Ok(())
            } else {
                Err(StudioError::not_found(format!("context item {id}")))
            }
        })
    }

    pub fn remove_context_item(&self, id: &str) -> StudioResult<()> {
        self.write(|s| {
            expect_phase(s, WorkflowPhase::DefiningContext)?;
            s.remove_context_item(id)
                .map(|_| ())
                .ok_or_else(|| StudioError::not_found(format!("context item {id}")))
        })
    }

    // =========================================================================
    // PLANNING
    // =========================================================================

    /// Stores the confirmed setup and plans scenes.
    ///
    /// The video flow stops at script approval; the photo flow goes straight
    /// to image generation.
    pub async fn confirm_setup(
        &self,
        context_items: Vec<UserContextItem>,
        scene_count: u32,
        aspect_ratio: AspectRatio,
    ) -> StudioResult<()> {
        if !(MIN_SCENE_COUNT..=MAX_SCENE_COUNT).contains(&scene_count) {
            return Err(StudioError::missing_precondition(format!(
                "scene count must be between {MIN_SCENE_COUNT} and {MAX_SCENE_COUNT}, got {scene_count}"
            )));
        }

        let (epoch, analysis, items, mode) = self.write(|s| {
            expect_phase(s, WorkflowPhase::DefiningContext)?;
            let analysis = s
                .analysis
                .clone()
                .ok_or_else(|| StudioError::missing_precondition("product has not been analyzed"))?;
            if s.original_image.is_none() {
                return Err(StudioError::missing_precondition("no product image uploaded"));
            }
            s.replace_context_items(context_items);
            s.aspect_ratio = aspect_ratio;
            s.error = None;
            s.phase = WorkflowPhase::GeneratingScript;
            Ok((
                s.epoch,
                analysis,
                s.context_items(),
                s.mode.unwrap_or(FlowMode::Video),
            ))
        })?;
        tracing::info!(scene_count, %aspect_ratio, context_items = items.len(), "planning scenes");

        let result = self
            .inner
            .gateway
            .generate_scene_plan(&analysis, scene_count, &items)
            .await
            .and_then(|scenes| {
                if scenes.is_empty() {
                    Err(StudioError::generation_failed("The plan contains no scenes"))
                } else {
                    Ok(scenes)
                }
            });

        let scenes = match result {
            Ok(scenes) => scenes,
            Err(e) => {
                self.fail_session(epoch, &e);
                return Ok(());
            }
        };

        let photo_batch = self.write(|s| {
            if s.epoch != epoch {
                return None;
            }
            s.replace_script(scenes);
            match mode {
                FlowMode::Video => {
                    s.phase = WorkflowPhase::ScriptApproval;
                    None
                }
                FlowMode::Photos => Some(s.script()),
            }
        });

        if let Some(scenes) = photo_batch {
            self.generate_batch(scenes, epoch).await;
        }
        Ok(())
    }

    /// Edits a planned scene before images are generated.
    pub fn edit_scene(
        &self,
        id: &str,
        description: Option<String>,
        prompt: Option<String>,
    ) -> StudioResult<()> {
        self.write(|s| {
            expect_phase(s, WorkflowPhase::ScriptApproval)?;
            let updated = s.update_scene(id, |scene| {
                if let Some(description) = description {
                    scene.description = description;
                }
                if let Some(prompt) = prompt {
                    scene.prompt = prompt;
                }
            });
            if updated {
                Ok(())
            } else {
                Err(StudioError::not_found(format!("scene {id}")))
            }
        })
    }

    /// Approves the script and runs the image fan-out.
    pub async fn confirm_script(&self) -> StudioResult<()> {
        let (epoch, scenes) = self.write(|s| {
            expect_phase(s, WorkflowPhase::ScriptApproval)?;
            let scenes = s.script();
            if scenes.is_empty() {
                return Err(StudioError::missing_precondition("script has no scenes"));
            }
            s.error = None;
            Ok((s.epoch, scenes))
        })?;
        self.generate_batch(scenes, epoch).await;
        Ok(())
    }

    // =========================================================================
    // USER DECISIONS
    // =========================================================================

    pub fn approve(&self, image_id: &str) -> StudioResult<()> {
        self.decide(image_id, ImageStatus::UserApproved)
    }

    pub fn reject(&self, image_id: &str) -> StudioResult<()> {
        self.decide(image_id, ImageStatus::UserRejected)
    }

    fn decide(&self, image_id: &str, status: ImageStatus) -> StudioResult<()> {
        self.write(|s| {
            expect_phase(s, WorkflowPhase::UserApproval)?;
            let current = s
                .get_image(image_id)
                .map(|img| img.status)
                .ok_or_else(|| image_not_found(image_id))?;
            if !current.accepts_user_decision() {
                return Err(StudioError::invalid_transition(image_id, current.as_str()));
            }
            s.update_image(image_id, |img| img.status = status);
            Ok(())
        })?;
        tracing::debug!(image_id, %status, "user decision");
        Ok(())
    }

    /// Regenerates an image from feedback, then reviews the new candidate.
    ///
    /// The current image is kept as `previous_image_data`; any failure puts it back.
    pub async fn submit_feedback(&self, image_id: &str, feedback: &str) -> StudioResult<()> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(StudioError::missing_precondition("feedback is empty"));
        }
        let ctx = self.generation_context()?;

        let (job, previous, prompt) = self.write(|s| {
            expect_phase(s, WorkflowPhase::UserApproval)?;
            let image = s.get_image(image_id).ok_or_else(|| image_not_found(image_id))?;
            if image.status.is_in_flight() {
                return Err(StudioError::invalid_transition(image_id, image.status.as_str()));
            }
            let previous = image.image_data.clone().ok_or_else(|| {
                StudioError::missing_precondition("the previous image is required for regeneration")
            })?;
            let prompt = image.prompt.clone();

            let mut attempt = 0;
            s.update_image(image_id, |img| {
                img.previous_image_data = Some(previous.clone());
                img.image_data = None;
                img.review = None;
                img.feedback = Some(feedback.to_string());
                img.error_message = None;
                img.status = ImageStatus::Generating;
                img.regeneration_count += 1;
                img.attempt += 1;
                attempt = img.attempt;
            });
            Ok((Job::regenerate(image_id, attempt), previous, prompt))
        })?;
        tracing::info!(image_id, attempt = job.attempt, "regenerating image");

        let result = self
            .inner
            .gateway
            .regenerate_image(&ctx.original, &previous, &prompt, feedback, &ctx.context_images)
            .await;
        if self.apply_candidate(&job, result) {
            self.review_candidate(&ctx, &job).await;
        }
        Ok(())
    }

    /// Re-runs plain generation and review for a failed image.
    pub async fn retry(&self, image_id: &str) -> StudioResult<()> {
        let ctx = self.generation_context()?;
        let (job, prompt) = self.write(|s| {
            expect_phase(s, WorkflowPhase::UserApproval)?;
            let image = s.get_image(image_id).ok_or_else(|| image_not_found(image_id))?;
            if image.status != ImageStatus::Failed {
                return Err(StudioError::invalid_transition(image_id, image.status.as_str()));
            }
            let prompt = image.prompt.clone();
            let attempt = begin_attempt(s, image_id).ok_or_else(|| image_not_found(image_id))?;
            Ok((Job::generate(image_id, attempt), prompt))
        })?;
        tracing::info!(image_id, attempt = job.attempt, "retrying image");

        self.run_pipeline(&ctx, &job, &prompt).await;
        Ok(())
    }

    /// Plans one more scene and runs the pipeline for its image.
    pub async fn add_scene(&self) -> StudioResult<()> {
        let ctx = self.generation_context()?;
        let (epoch, analysis, existing, items) = self.write(|s| {
            expect_phase(s, WorkflowPhase::UserApproval)?;
            if s.is_adding_scene {
                return Err(StudioError::busy("a scene is already being added"));
            }
            let analysis = s
                .analysis
                .clone()
                .ok_or_else(|| StudioError::missing_precondition("product has not been analyzed"))?;
            s.is_adding_scene = true;
            s.error = None;
            Ok((s.epoch, analysis, s.script(), s.context_items()))
        })?;
        tracing::info!(existing = existing.len(), "adding scene");

        let planned = self
            .inner
            .gateway
            .generate_single_scene(&analysis, &existing, &items)
            .await;

        let started = self.write(|s| {
            if s.epoch != epoch {
                return None;
            }
            match planned {
                Ok(scene) => {
                    let scene = s.append_scene(scene);
                    let image = GeneratedImage::for_scene(&scene);
                    let image_id = image.id.clone();
                    s.insert_image(image);
                    let attempt = begin_attempt(s, &image_id)?;
                    Some((Job::generate(image_id, attempt), scene.prompt))
                }
                Err(e) => {
                    tracing::error!(error = %e, "scene planning failed");
                    s.error = Some(e.user_message());
                    s.is_adding_scene = false;
                    None
                }
            }
        });

        if let Some((job, prompt)) = started {
            self.run_pipeline(&ctx, &job, &prompt).await;
            self.write(|s| {
                if s.epoch == epoch {
                    s.is_adding_scene = false;
                }
            });
        }
        Ok(())
    }

    /// Moves to `Completed` once nothing is still generating.
    pub fn finish(&self) -> StudioResult<()> {
        self.write(|s| {
            expect_phase(s, WorkflowPhase::UserApproval)?;
            if s.is_adding_scene || s.has_images_in_flight() {
                return Err(StudioError::busy("images are still being generated"));
            }
            s.phase = WorkflowPhase::Completed;
            Ok(())
        })?;
        tracing::info!("session completed");
        Ok(())
    }

    // =========================================================================
    // VIDEO
    // =========================================================================

    /// Starts (or restarts) the video for an image.
    ///
    /// Without image data the existing video entry, if any, is marked failed.
    pub async fn request_video(&self, image_id: &str) -> StudioResult<()> {
        let (video_id, attempt, prompt, image, aspect_ratio) = self.write(|s| {
            if !matches!(s.phase, WorkflowPhase::UserApproval | WorkflowPhase::Completed) {
                return Err(StudioError::invalid_phase(
                    WorkflowPhase::UserApproval.to_string(),
                    s.phase.to_string(),
                ));
            }
            let source = s.get_image(image_id).ok_or_else(|| image_not_found(image_id))?;
            let prompt = source.prompt.clone();
            let Some(image) = source.image_data.clone() else {
                if let Some(video_id) = s.video_for_image(image_id).map(|v| v.id.clone()) {
                    s.update_video(&video_id, |v| {
                        v.status = VideoStatus::Failed;
                        v.error_message = Some("Image data is missing".to_string());
                    });
                }
                return Err(StudioError::missing_precondition(
                    "cannot animate an image without image data",
                ));
            };
            let (video_id, attempt) = s.upsert_generating_video(image_id);
            Ok((video_id, attempt, prompt, image, s.aspect_ratio.for_video()))
        })?;
        tracing::info!(image_id, attempt, %aspect_ratio, "starting video");

        match self
            .inner
            .gateway
            .generate_video(&prompt, Some(&image), aspect_ratio)
            .await
        {
            Ok(operation) => {
                let stored = self.write(|s| {
                    s.update_video_if(
                        &video_id,
                        |v| {
                            v.status == VideoStatus::Generating
                                && v.attempt == attempt
                                && v.operation.is_none()
                        },
                        |v| v.operation = Some(operation.clone()),
                    )
                });
                if !stored {
                    tracing::warn!(video_id, attempt, "dropping superseded video job");
                } else if operation.done {
                    self.resolve_video(&video_id, attempt, &operation, operation.clone())
                        .await;
                } else {
                    self.ensure_poller();
                }
            }
            Err(e) => self.fail_video(&video_id, attempt, None, &e),
        }
        Ok(())
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    /// Steps back one stage, discarding the data the target stage does not show.
    pub fn go_back(&self) -> StudioResult<()> {
        let target = self.write(|s| {
            let data = DataPresence {
                images: s.image_count() > 0,
                script: s.scene_count() > 0,
                analysis: s.analysis.is_some(),
            };
            let step = back_step(s.phase, s.mode, data).ok_or_else(|| {
                StudioError::invalid_phase("a phase with a back step", s.phase.to_string())
            })?;

            s.bump_epoch();
            s.error = None;
            if step.clear_upload {
                s.clear_upload();
            }
            if step.clear_script {
                s.clear_script();
            }
            if step.clear_outputs {
                self.discard_outputs(s);
            }
            s.phase = step.phase;
            Ok::<_, StudioError>(step.phase)
        })?;
        tracing::info!(phase = %target, "navigated back");
        Ok(())
    }

    /// Clears the global error message.
    pub fn dismiss_error(&self) {
        self.write(|s| s.error = None);
    }

    /// Clears every store and returns to the landing selection.
    pub fn reset(&self) {
        self.stop_poller();
        self.write(|s| s.reset(self.inner.config.default_aspect_ratio));
        self.inner.blobs.clear();
        tracing::info!("session reset");
    }
}
