//! Read-only session snapshot and per-image card affordances.

use serde::Serialize;

use crate::media::ImageData;
use crate::session::*;

/// Everything a view renders, copied out of the stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub mode: Option<FlowMode>,
    pub phase: WorkflowPhase,
    pub error: Option<String>,
    pub original_image: Option<ImageData>,
    pub analysis: Option<ImageAnalysis>,
    pub context_items: Vec<UserContextItem>,
    /// Ordered by scene number.
    pub script: Vec<ScriptScene>,
    pub images: Vec<GeneratedImage>,
    pub videos: Vec<GeneratedVideo>,
    pub aspect_ratio: AspectRatio,
    pub is_adding_scene: bool,
}

impl WorkflowSnapshot {
    pub fn from_store(store: &SessionStore) -> Self {
        Self {
            mode: store.mode,
            phase: store.phase,
            error: store.error.clone(),
            original_image: store.original_image.clone(),
            analysis: store.analysis.clone(),
            context_items: store.context_items(),
            script: store.script(),
            images: store.images(),
            videos: store.videos(),
            aspect_ratio: store.aspect_ratio,
            is_adding_scene: store.is_adding_scene,
        }
    }

    pub fn image(&self, id: &str) -> Option<&GeneratedImage> {
        self.images.iter().find(|img| img.id == id)
    }

    pub fn video_for(&self, image_id: &str) -> Option<&GeneratedVideo> {
        self.videos.iter().find(|v| v.image_id == image_id)
    }

    pub fn current_step(&self) -> Option<usize> {
        super::current_step(self.phase)
    }

    /// Back button visibility.
    pub fn show_back(&self) -> bool {
        self.phase.allows_back()
    }

    pub fn can_add_scene(&self) -> bool {
        self.phase == WorkflowPhase::UserApproval && !self.is_adding_scene
    }

    pub fn can_finish(&self) -> bool {
        self.phase == WorkflowPhase::UserApproval
            && !self.is_adding_scene
            && !self.images.iter().any(|img| img.status.is_in_flight())
    }

    /// Images the user has approved.
    pub fn approved_images(&self) -> Vec<&GeneratedImage> {
        self.images
            .iter()
            .filter(|img| img.status == ImageStatus::UserApproved)
            .collect()
    }

    /// One card per image, in scene order.
    pub fn cards(&self) -> Vec<ImageCard> {
        let mut cards: Vec<ImageCard> = self
            .images
            .iter()
            .map(|img| ImageCard::new(img, self))
            .collect();
        cards.sort_by_key(|card| card.scene_number.unwrap_or(u32::MAX));
        cards
    }
}

/// What the approval grid shows for one image and which actions it offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCard {
    pub image_id: String,
    pub scene_number: Option<u32>,
    pub pain_point: String,
    pub status: ImageStatus,
    pub score: Option<u8>,
    pub reason: Option<String>,
    pub error_message: Option<String>,
    pub regeneration_count: u32,
    pub video_status: Option<VideoStatus>,
    pub video_url: Option<String>,
    pub can_approve: bool,
    pub can_reject: bool,
    pub can_regenerate: bool,
    pub can_retry: bool,
    pub can_animate: bool,
}

impl ImageCard {
    fn new(image: &GeneratedImage, snapshot: &WorkflowSnapshot) -> Self {
        let deciding = snapshot.phase == WorkflowPhase::UserApproval;
        let video = snapshot.video_for(&image.id);
        let video_running = video.is_some_and(|v| v.status == VideoStatus::Generating);

        Self {
            image_id: image.id.clone(),
            scene_number: snapshot
                .script
                .iter()
                .find(|scene| scene.id == image.scene_id)
                .map(|scene| scene.scene_number),
            pain_point: image.pain_point.clone(),
            status: image.status,
            score: image.review.as_ref().map(|r| r.score),
            reason: image.review.as_ref().map(|r| r.reason.clone()),
            error_message: image.error_message.clone(),
            regeneration_count: image.regeneration_count,
            video_status: video.map(|v| v.status),
            video_url: video.and_then(|v| v.blob_url.clone()),
            can_approve: deciding
                && matches!(
                    image.status,
                    ImageStatus::AiApproved | ImageStatus::AiRejected | ImageStatus::UserRejected
                ),
            can_reject: deciding
                && matches!(
                    image.status,
                    ImageStatus::AiApproved | ImageStatus::AiRejected | ImageStatus::UserApproved
                ),
            can_regenerate: deciding
                && !image.status.is_in_flight()
                && image.image_data.is_some(),
            can_retry: deciding && image.status == ImageStatus::Failed,
            can_animate: matches!(
                snapshot.phase,
                WorkflowPhase::UserApproval | WorkflowPhase::Completed
            ) && image.image_data.is_some()
                && !video_running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(images: Vec<GeneratedImage>, script: Vec<ScriptScene>) -> WorkflowSnapshot {
        let mut store = SessionStore::default();
        store.mode = Some(FlowMode::Video);
        store.phase = WorkflowPhase::UserApproval;
        store.replace_script(script);
        for image in images {
            store.insert_image(image);
        }
        WorkflowSnapshot::from_store(&store)
    }

    #[test]
    fn test_card_affordances_follow_status() {
        let scene = ScriptScene::new("cena-1", 1).with_prompt("p");
        let data = ImageData::new("AAAA", "image/png");
        let approved = GeneratedImage::for_scene(&scene)
            .with_status(ImageStatus::AiApproved)
            .with_image(data);
        let failed = GeneratedImage::for_scene(&scene).with_status(ImageStatus::Failed);

        let snapshot = snapshot_with(vec![approved, failed], vec![scene]);
        let cards = snapshot.cards();

        let ok = &cards[0];
        assert!(ok.can_approve && ok.can_reject && ok.can_regenerate && ok.can_animate);
        assert!(!ok.can_retry);
        assert_eq!(ok.scene_number, Some(1));

        let bad = &cards[1];
        assert!(bad.can_retry);
        assert!(!bad.can_approve && !bad.can_regenerate && !bad.can_animate);
        assert!(snapshot.can_finish());
    }

    #[test]
    fn test_cards_sorted_by_scene() {
        let first = ScriptScene::new("a", 1);
        let second = ScriptScene::new("b", 2);
        let snapshot = snapshot_with(
            vec![
                GeneratedImage::for_scene(&second).with_status(ImageStatus::Failed),
                GeneratedImage::for_scene(&first).with_status(ImageStatus::Failed),
            ],
            vec![first, second],
        );
        let numbers: Vec<_> = snapshot.cards().iter().map(|c| c.scene_number).collect();
        assert_eq!(numbers, vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_in_flight_blocks_finish() {
        let scene = ScriptScene::new("a", 1);
        let snapshot = snapshot_with(
            vec![GeneratedImage::for_scene(&scene).with_status(ImageStatus::Generating)],
            vec![scene],
        );
        assert!(!snapshot.can_finish());
        assert!(snapshot.can_add_scene());
        assert!(snapshot.show_back());
        assert_eq!(snapshot.current_step(), Some(8));
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = snapshot_with(vec![], vec![]);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["phase"], "UserApproval");
        assert_eq!(json["aspectRatio"], "9:16");
        assert_eq!(json["isAddingScene"], false);
    }
}
