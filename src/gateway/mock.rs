//! Scripted in-memory gateway for orchestration tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{StudioError, StudioResult};
use crate::gateway::Gateway;
use crate::media::ImageData;
use crate::session::{
    AspectRatio, ImageAnalysis, ProductComponent, ReviewResult, ScriptScene, UserContextItem,
    VideoOperation,
};

#[derive(Default)]
struct Script {
    analysis: Option<StudioResult<ImageAnalysis>>,
    plan: Option<StudioResult<Vec<ScriptScene>>>,
    single_scenes: VecDeque<StudioResult<ScriptScene>>,
    failing_prompts: HashSet<String>,
    failing_reviews: HashSet<String>,
    review_scores: HashMap<String, u8>,
    regenerations: VecDeque<StudioResult<ImageData>>,
    video_starts: VecDeque<StudioResult<VideoOperation>>,
    polls: HashMap<String, VecDeque<StudioResult<VideoOperation>>>,
    download: Option<StudioResult<ImageData>>,
    holds: HashMap<String, Arc<Notify>>,
    /// One-shot holds on the next call of an action.
    next_holds: HashMap<&'static str, Arc<Notify>>,
    /// Candidate image payload -> prompt it was generated from.
    generated: HashMap<String, String>,
    calls: HashMap<&'static str, usize>,
    video_aspects: Vec<AspectRatio>,
    counter: usize,
}

/// Gateway whose answers are scripted per test.
///
/// Defaults: analysis with no components, a plan of the requested size,
/// review score 4, unfinished video jobs, and an mp4 download.
#[derive(Default)]
pub struct MockGateway {
    script: Mutex<Script>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analysis(self, analysis: ImageAnalysis) -> Self {
        self.script.lock().analysis = Some(Ok(analysis));
        self
    }

    pub fn fail_analysis(self, err: StudioError) -> Self {
        self.script.lock().analysis = Some(Err(err));
        self
    }

    pub fn with_plan(self, scenes: Vec<ScriptScene>) -> Self {
        self.script.lock().plan = Some(Ok(scenes));
        self
    }

    pub fn fail_plan(self, err: StudioError) -> Self {
        self.script.lock().plan = Some(Err(err));
        self
    }

    pub fn push_single_scene(&self, result: StudioResult<ScriptScene>) {
        self.script.lock().single_scenes.push_back(result);
    }

    pub fn fail_prompt(&self, prompt: &str) {
        self.script.lock().failing_prompts.insert(prompt.to_string());
    }

    pub fn succeed_prompt(&self, prompt: &str) {
        self.script.lock().failing_prompts.remove(prompt);
    }

    pub fn fail_review_for(&self, prompt: &str) {
        self.script.lock().failing_reviews.insert(prompt.to_string());
    }

    pub fn set_score(&self, prompt: &str, score: u8) {
        self.script.lock().review_scores.insert(prompt.to_string(), score);
    }

    pub fn push_regeneration(&self, result: StudioResult<ImageData>) {
        self.script.lock().regenerations.push_back(result);
    }

    pub fn push_video_start(&self, result: StudioResult<VideoOperation>) {
        self.script.lock().video_starts.push_back(result);
    }

    /// Queues poll answers for the job with the given name.
    pub fn push_poll(&self, name: &str, result: StudioResult<VideoOperation>) {
        self.script
            .lock()
            .polls
            .entry(name.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn set_download(&self, result: StudioResult<ImageData>) {
        self.script.lock().download = Some(result);
    }

    /// Blocks `create_image` for `prompt` until the returned notify is signalled.
    pub fn hold_prompt(&self, prompt: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.script
            .lock()
            .holds
            .insert(prompt.to_string(), notify.clone());
        notify
    }

    /// Blocks the next call of `action` until the returned notify is signalled.
    pub fn hold_next(&self, action: &'static str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.script.lock().next_holds.insert(action, notify.clone());
        notify
    }

    async fn wait_if_held(&self, action: &'static str) {
        let hold = self.script.lock().next_holds.remove(action);
        if let Some(notify) = hold {
            notify.notified().await;
        }
    }

    pub fn calls(&self, action: &str) -> usize {
        self.script.lock().calls.get(action).copied().unwrap_or(0)
    }

    pub fn video_aspects(&self) -> Vec<AspectRatio> {
        self.script.lock().video_aspects.clone()
    }

    fn record(&self, action: &'static str) {
        *self.script.lock().calls.entry(action).or_insert(0) += 1;
    }

    fn candidate_for(&self, prompt: &str) -> ImageData {
        let mut script = self.script.lock();
        script.counter += 1;
        let image = ImageData::from_bytes(
            format!("{prompt}#{}", script.counter).as_bytes(),
            "image/png",
        );
        script
            .generated
            .insert(image.encoded_bytes.clone(), prompt.to_string());
        image
    }
}

/// Plan of `count` scenes numbered from 1.
pub fn plan(count: u32) -> Vec<ScriptScene> {
    (1..=count)
        .map(|n| {
            ScriptScene::new(format!("cena-{n}"), n)
                .with_description(format!("goal {n}"))
                .with_prompt(format!("prompt {n}"))
        })
        .collect()
}

#[async_trait]
impl Gateway for MockGateway {
    async fn analyze_image(&self, _image: &ImageData) -> StudioResult<ImageAnalysis> {
        self.record("analyzeImage");
        let scripted = self.script.lock().analysis.clone();
        scripted.unwrap_or_else(|| {
            Ok(ImageAnalysis {
                product_name: "Product".into(),
                ..Default::default()
            })
        })
    }

    async fn generate_scene_plan(
        &self,
        _analysis: &ImageAnalysis,
        scene_count: u32,
        _context_items: &[UserContextItem],
    ) -> StudioResult<Vec<ScriptScene>> {
        self.record("generatePrompts");
        let scripted = self.script.lock().plan.clone();
        scripted.unwrap_or_else(|| Ok(plan(scene_count)))
    }

    async fn create_image(
        &self,
        _original: &ImageData,
        prompt: &str,
        _context_images: &[ImageData],
    ) -> StudioResult<ImageData> {
        self.record("createImage");
        let hold = self.script.lock().holds.get(prompt).cloned();
        if let Some(notify) = hold {
            notify.notified().await;
        }
        if self.script.lock().failing_prompts.contains(prompt) {
            return Err(StudioError::backend(format!("generation failed for {prompt}")));
        }
        Ok(self.candidate_for(prompt))
    }

    async fn review_image(
        &self,
        _original: &ImageData,
        candidate: &ImageData,
        _components: &[ProductComponent],
        _context_images: &[ImageData],
    ) -> StudioResult<ReviewResult> {
        self.record("reviewImage");
        self.wait_if_held("reviewImage").await;
        let script = self.script.lock();
        let prompt = script
            .generated
            .get(&candidate.encoded_bytes)
            .cloned()
            .unwrap_or_default();
        if script.failing_reviews.contains(&prompt) {
            return Err(StudioError::invalid_response("review payload malformed"));
        }
        let score = script.review_scores.get(&prompt).copied().unwrap_or(4);
        Ok(ReviewResult::new(score, format!("scored {score}")))
    }

    async fn regenerate_image(
        &self,
        _original: &ImageData,
        _previous: &ImageData,
        prompt: &str,
        _feedback: &str,
        _context_images: &[ImageData],
    ) -> StudioResult<ImageData> {
        self.record("regenerateImage");
        self.wait_if_held("regenerateImage").await;
        let scripted = self.script.lock().regenerations.pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(self.candidate_for(prompt)),
        }
    }

    async fn generate_single_scene(
        &self,
        _analysis: &ImageAnalysis,
        existing: &[ScriptScene],
        _context_items: &[UserContextItem],
    ) -> StudioResult<ScriptScene> {
        self.record("generateSingleScene");
        let scripted = self.script.lock().single_scenes.pop_front();
        scripted.unwrap_or_else(|| {
            let n = existing.len() as u32 + 1;
            Ok(ScriptScene::new(format!("cena-extra-{n}"), n)
                .with_description("extra goal")
                .with_prompt(format!("extra prompt {n}")))
        })
    }

    async fn generate_video(
        &self,
        _prompt: &str,
        _image: Option<&ImageData>,
        aspect_ratio: AspectRatio,
    ) -> StudioResult<VideoOperation> {
        self.record("generateVideo");
        let (result, hold) = {
            let mut script = self.script.lock();
            script.video_aspects.push(aspect_ratio);
            script.counter += 1;
            let counter = script.counter;
            let result = script
                .video_starts
                .pop_front()
                .unwrap_or_else(|| Ok(VideoOperation::pending(format!("operations/{counter}"))));
            (result, script.next_holds.remove("generateVideo"))
        };
        if let Some(notify) = hold {
            notify.notified().await;
        }
        result
    }

    async fn poll_video_operation(&self, operation: &VideoOperation) -> StudioResult<VideoOperation> {
        self.record("getVideosOperation");
        let name = operation.name.clone().unwrap_or_default();
        let next = self
            .script
            .lock()
            .polls
            .get_mut(&name)
            .and_then(|queue| queue.pop_front());
        next.unwrap_or_else(|| Ok(operation.clone()))
    }

    async fn download_video_payload(&self, _uri: &str) -> StudioResult<ImageData> {
        self.record("downloadVideo");
        let scripted = self.script.lock().download.clone();
        scripted.unwrap_or_else(|| Ok(ImageData::from_bytes(b"\x00\x00\x00\x18ftypmp42", "video/mp4")))
    }
}
