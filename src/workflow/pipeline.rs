//! Per-image generate and review pipeline, and the scene fan-out built on it.
//!
//! Every store write here is a guarded replace-by-ID: a completion only lands if
//! the image is still in the status it was dispatched from and carries the same
//! attempt number. Anything else is a stale result and is dropped.

use futures::future::join_all;

use crate::error::{StudioError, StudioResult};
use crate::media::ImageData;
use crate::session::{
    GeneratedImage, ImageStatus, ProductComponent, ScriptScene, SessionStore, WorkflowPhase,
};
use crate::workflow::Workflow;

/// Inputs shared by every backend call of one pipeline run.
#[derive(Debug, Clone)]
pub(crate) struct GenerationContext {
    pub original: ImageData,
    pub context_images: Vec<ImageData>,
    pub components: Vec<ProductComponent>,
}

/// One dispatched attempt at producing an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Job {
    pub image_id: String,
    pub attempt: u32,
    /// On failure, put the pre-regeneration image back.
    pub restore_previous: bool,
}

impl Job {
    pub fn generate(image_id: impl Into<String>, attempt: u32) -> Self {
        Self {
            image_id: image_id.into(),
            attempt,
            restore_previous: false,
        }
    }

    pub fn regenerate(image_id: impl Into<String>, attempt: u32) -> Self {
        Self {
            image_id: image_id.into(),
            attempt,
            restore_previous: true,
        }
    }

    fn is_current(&self, image: &GeneratedImage, expected: ImageStatus) -> bool {
        image.status == expected && image.attempt == self.attempt
    }
}

/// Moves an image to `Generating` under a new attempt number.
pub(crate) fn begin_attempt(store: &mut SessionStore, image_id: &str) -> Option<u32> {
    let mut attempt = None;
    store.update_image(image_id, |img| {
        img.status = ImageStatus::Generating;
        img.attempt += 1;
        img.review = None;
        img.error_message = None;
        attempt = Some(img.attempt);
    });
    attempt
}

impl Workflow {
    // =========================================================================
    // FAN-OUT
    // =========================================================================

    /// Generates and reviews one image per scene, then waits for user approval.
    ///
    /// Both stages are joins over every member; one scene failing never stops
    /// its siblings. Phase changes are skipped once `epoch` is stale.
    pub(crate) async fn generate_batch(&self, scenes: Vec<ScriptScene>, epoch: u64) {
        let ctx = match self.generation_context() {
            Ok(ctx) => ctx,
            Err(e) => {
                self.fail_session(epoch, &e);
                return;
            }
        };

        let queued = self.write(|s| {
            if s.epoch != epoch {
                return None;
            }
            self.discard_outputs(s);
            let queued: Vec<(String, String)> = scenes
                .iter()
                .map(|scene| {
                    let image = GeneratedImage::for_scene(scene);
                    let entry = (image.id.clone(), image.prompt.clone());
                    s.insert_image(image);
                    entry
                })
                .collect();
            s.phase = WorkflowPhase::GeneratingImages;
            Some(queued)
        });
        let Some(queued) = queued else {
            return;
        };
        tracing::info!(scenes = queued.len(), "generating images");

        let generated = join_all(
            queued
                .into_iter()
                .map(|(image_id, prompt)| self.generate_queued(&ctx, image_id, prompt)),
        )
        .await;
        let reviewable: Vec<Job> = generated.into_iter().flatten().collect();

        if !reviewable.is_empty() {
            if !self.set_phase_if_current(epoch, WorkflowPhase::ReviewingImages) {
                return;
            }
            tracing::info!(images = reviewable.len(), "reviewing images");
            join_all(reviewable.iter().map(|job| self.review_candidate(&ctx, job))).await;
        }

        if self.set_phase_if_current(epoch, WorkflowPhase::UserApproval) {
            tracing::info!("images ready for approval");
        }
    }

    /// Starts a queued image. Returns its job if it reached review.
    async fn generate_queued(
        &self,
        ctx: &GenerationContext,
        image_id: String,
        prompt: String,
    ) -> Option<Job> {
        let attempt = self.write(|s| {
            let queued = s
                .get_image(&image_id)
                .is_some_and(|img| img.status == ImageStatus::Pending);
            if queued {
                begin_attempt(s, &image_id)
            } else {
                None
            }
        })?;
        let job = Job::generate(image_id, attempt);
        self.generate_candidate(ctx, &job, &prompt)
            .await
            .then_some(job)
    }

    // =========================================================================
    // SINGLE IMAGE
    // =========================================================================

    /// Plain create, then review once the candidate landed.
    pub(crate) async fn run_pipeline(&self, ctx: &GenerationContext, job: &Job, prompt: &str) {
        if self.generate_candidate(ctx, job, prompt).await {
            self.review_candidate(ctx, job).await;
        }
    }

    async fn generate_candidate(&self, ctx: &GenerationContext, job: &Job, prompt: &str) -> bool {
        tracing::debug!(image_id = %job.image_id, attempt = job.attempt, "creating image");
        let result = self
            .inner
            .gateway
            .create_image(&ctx.original, prompt, &ctx.context_images)
            .await;
        self.apply_candidate(job, result)
    }

    /// Stores a generated candidate and moves it to `Reviewing`.
    pub(crate) fn apply_candidate(&self, job: &Job, result: StudioResult<ImageData>) -> bool {
        match result {
            Ok(image) => {
                let applied = self.write(|s| {
                    s.update_image_if(
                        &job.image_id,
                        |img| job.is_current(img, ImageStatus::Generating),
                        |img| {
                            img.image_data = Some(image);
                            img.status = ImageStatus::Reviewing;
                        },
                    )
                });
                if !applied {
                    tracing::warn!(image_id = %job.image_id, attempt = job.attempt, "dropping stale image result");
                }
                applied
            }
            Err(e) => {
                self.fail_image(job, &e);
                false
            }
        }
    }

    /// Reviews the stored candidate and applies the approval threshold.
    pub(crate) async fn review_candidate(&self, ctx: &GenerationContext, job: &Job) {
        let candidate = self.read(|s| {
            s.get_image(&job.image_id)
                .filter(|img| job.is_current(img, ImageStatus::Reviewing))
                .and_then(|img| img.image_data.clone())
        });
        let Some(candidate) = candidate else {
            return;
        };

        let result = self
            .inner
            .gateway
            .review_image(&ctx.original, &candidate, &ctx.components, &ctx.context_images)
            .await;

        match result {
            Ok(review) => {
                let verdict = review.verdict();
                let score = review.score;
                let applied = self.write(|s| {
                    s.update_image_if(
                        &job.image_id,
                        |img| job.is_current(img, ImageStatus::Reviewing),
                        |img| {
                            img.status = verdict;
                            img.review = Some(review);
                        },
                    )
                });
                if applied {
                    tracing::debug!(image_id = %job.image_id, score, status = %verdict, "review applied");
                } else {
                    tracing::warn!(image_id = %job.image_id, "dropping stale review");
                }
            }
            Err(e) => self.fail_image(job, &e),
        }
    }

    fn fail_image(&self, job: &Job, err: &StudioError) {
        tracing::warn!(image_id = %job.image_id, attempt = job.attempt, error = %err, "image pipeline failed");
        let message = err.user_message();
        self.write(|s| {
            s.update_image_if(
                &job.image_id,
                |img| img.attempt == job.attempt && img.status.is_in_flight(),
                |img| {
                    img.status = ImageStatus::Failed;
                    img.error_message = Some(message);
                    if job.restore_previous {
                        img.image_data = img.previous_image_data.clone();
                    }
                },
            )
        });
    }
}
