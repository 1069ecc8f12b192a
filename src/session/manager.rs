//! SessionStore implementation.
//!
//! Holds every entity of one production session in memory. Collections are
//! keyed by ID with a separate order list, and every mutation is a
//! replace-by-ID on a single entity so that concurrent completions inside a
//! fan-out never clobber each other's updates.

use std::collections::HashMap;

use paste::paste;

use crate::media::ImageData;
use crate::session::model::*;

// =============================================================================
// ENTITY CRUD MACRO
// =============================================================================

/// Generates keyed CRUD methods for an entity collection.
/// All mutations go through the map entry for one ID; the order list only tracks insertion.
macro_rules! entity_crud {
    ($entity:ident, $name:ident, $collection:ident, $order:ident) => {
        paste! {
            /// Inserts an entity, appending its ID to the order list if new.
            pub fn [<insert_ $name>](&mut self, entity: $entity) {
                let id = entity.id.clone();
                if self.$collection.insert(id.clone(), entity).is_none() {
                    self.$order.push(id);
                }
            }

            /// Gets an entity by ID.
            pub fn [<get_ $name>](&self, id: &str) -> Option<&$entity> {
                self.$collection.get(id)
            }

            /// Removes an entity by ID.
            pub fn [<remove_ $name>](&mut self, id: &str) -> Option<$entity> {
                let removed = self.$collection.remove(id);
                if removed.is_some() {
                    self.$order.retain(|s| s != id);
                }
                removed
            }

            /// Applies a read-modify-write to one entity. Returns false if the ID is gone.
            pub fn [<update_ $name>]<F>(&mut self, id: &str, f: F) -> bool
            where
                F: FnOnce(&mut $entity),
            {
                match self.$collection.get_mut(id) {
                    Some(entity) => {
                        f(entity);
                        true
                    }
                    None => false,
                }
            }

            /// Applies `f` only if `guard` accepts the entity's current state.
            pub fn [<update_ $name _if>]<G, F>(&mut self, id: &str, guard: G, f: F) -> bool
            where
                G: FnOnce(&$entity) -> bool,
                F: FnOnce(&mut $entity),
            {
                match self.$collection.get_mut(id) {
                    Some(entity) if guard(entity) => {
                        f(entity);
                        true
                    }
                    _ => false,
                }
            }

            /// All entities in insertion order.
            pub fn [<$collection>](&self) -> Vec<$entity> {
                self.$order
                    .iter()
                    .filter_map(|id| self.$collection.get(id).cloned())
                    .collect()
            }

            /// Number of entities.
            pub fn [<$name _count>](&self) -> usize {
                self.$collection.len()
            }

            /// Removes every entity.
            pub fn [<clear_ $collection>](&mut self) {
                self.$collection.clear();
                self.$order.clear();
            }
        }
    };
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// In-memory entity stores for one session.
///
/// Owned exclusively by the workflow orchestrator; views receive cloned snapshots.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    /// `None` while on the landing selection.
    pub mode: Option<FlowMode>,
    pub phase: WorkflowPhase,
    pub error: Option<String>,
    pub original_image: Option<ImageData>,
    pub analysis: Option<ImageAnalysis>,
    pub aspect_ratio: AspectRatio,
    pub is_adding_scene: bool,
    /// Bumped whenever back navigation or reset discards work in flight.
    pub epoch: u64,

    context_items: HashMap<String, UserContextItem>,
    context_order: Vec<String>,
    scenes: HashMap<String, ScriptScene>,
    scene_order: Vec<String>,
    images: HashMap<String, GeneratedImage>,
    image_order: Vec<String>,
    videos: HashMap<String, GeneratedVideo>,
    video_order: Vec<String>,
}

impl SessionStore {
    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Creates an empty store on the landing selection.
    pub fn new(aspect_ratio: AspectRatio) -> Self {
        Self {
            aspect_ratio,
            ..Default::default()
        }
    }

    /// Clears every store and returns to the landing selection.
    pub fn reset(&mut self, aspect_ratio: AspectRatio) {
        let epoch = self.epoch + 1;
        *self = Self::new(aspect_ratio);
        self.epoch = epoch;
    }

    // =========================================================================
    // ENTITY CRUD (Macro-generated)
    // =========================================================================

    entity_crud!(UserContextItem, context_item, context_items, context_order);
    entity_crud!(GeneratedImage, image, images, image_order);
    entity_crud!(GeneratedVideo, video, videos, video_order);

    // =========================================================================
    // PHASE & ERROR
    // =========================================================================

    /// Moves to `Error` and records a user-facing message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = WorkflowPhase::Error;
        self.error = Some(message.into());
    }

    /// Invalidates work started under the current epoch.
    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Clears the uploaded image and its analysis.
    pub fn clear_upload(&mut self) {
        self.original_image = None;
        self.analysis = None;
    }

    // =========================================================================
    // CONTEXT ITEMS
    // =========================================================================

    /// Replaces all context items, keeping the given order.
    pub fn replace_context_items(&mut self, items: Vec<UserContextItem>) {
        self.clear_context_items();
        for mut item in items {
            if item.id.is_empty() || self.context_items.contains_key(&item.id) {
                item.id = format!("item-{}", uuid::Uuid::new_v4());
            }
            self.insert_context_item(item);
        }
    }

    /// Reference images of all context items that have one.
    pub fn context_images(&self) -> Vec<ImageData> {
        self.context_order
            .iter()
            .filter_map(|id| self.context_items.get(id))
            .filter_map(|item| item.image_data.clone())
            .collect()
    }

    // =========================================================================
    // SCRIPT
    // =========================================================================

    /// Scenes ordered by scene number; ties keep insertion order.
    pub fn script(&self) -> Vec<ScriptScene> {
        let mut scenes: Vec<ScriptScene> = self
            .scene_order
            .iter()
            .filter_map(|id| self.scenes.get(id).cloned())
            .collect();
        scenes.sort_by_key(|scene| scene.scene_number);
        scenes
    }

    /// Gets a scene by ID.
    pub fn get_scene(&self, id: &str) -> Option<&ScriptScene> {
        self.scenes.get(id)
    }

    /// Number of scenes.
    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    /// Replaces the script. Missing or duplicate IDs are replaced with fresh ones.
    pub fn replace_script(&mut self, scenes: Vec<ScriptScene>) {
        self.clear_script();
        for scene in scenes {
            self.insert_scene(scene);
        }
    }

    /// Appends a new scene numbered after every existing one and returns it as stored.
    pub fn append_scene(&mut self, mut scene: ScriptScene) -> ScriptScene {
        scene.scene_number = self.next_scene_number();
        self.insert_scene(scene)
    }

    /// `count + 1`, bumped past the highest existing number if that is larger.
    pub fn next_scene_number(&self) -> u32 {
        let count = self.scenes.len() as u32;
        let highest = self
            .scenes
            .values()
            .map(|s| s.scene_number)
            .max()
            .unwrap_or(0);
        (count + 1).max(highest + 1)
    }

    /// Applies a read-modify-write to one scene.
    pub fn update_scene<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut ScriptScene),
    {
        match self.scenes.get_mut(id) {
            Some(scene) => {
                f(scene);
                true
            }
            None => false,
        }
    }

    /// Removes every scene.
    pub fn clear_script(&mut self) {
        self.scenes.clear();
        self.scene_order.clear();
    }

    fn insert_scene(&mut self, mut scene: ScriptScene) -> ScriptScene {
        if scene.id.is_empty() || self.scenes.contains_key(&scene.id) {
            scene.id = format!("scene-{}", uuid::Uuid::new_v4());
        }
        self.scene_order.push(scene.id.clone());
        self.scenes.insert(scene.id.clone(), scene.clone());
        scene
    }

    // =========================================================================
    // IMAGES & VIDEOS
    // =========================================================================

    /// Whether any image has a backend call outstanding.
    pub fn has_images_in_flight(&self) -> bool {
        self.images.values().any(|img| img.status.is_in_flight())
    }

    /// The video attached to an image, if any.
    pub fn video_for_image(&self, image_id: &str) -> Option<&GeneratedVideo> {
        self.videos.values().find(|v| v.image_id == image_id)
    }

    /// Creates or resets the image's video entry to `Generating` under a new
    /// attempt. Never duplicates. Returns the video ID and attempt.
    pub fn upsert_generating_video(&mut self, image_id: &str) -> (String, u32) {
        if let Some(id) = self.video_for_image(image_id).map(|v| v.id.clone()) {
            let mut attempt = 0;
            self.update_video(&id, |video| {
                video.status = VideoStatus::Generating;
                video.operation = None;
                video.error_message = None;
                video.attempt += 1;
                attempt = video.attempt;
            });
            return (id, attempt);
        }
        let video = GeneratedVideo::for_image(image_id);
        let started = (video.id.clone(), video.attempt);
        self.insert_video(video);
        started
    }

    /// Videos that are generating with an unfinished handle: ID, attempt, handle.
    pub fn pollable_videos(&self) -> Vec<(String, u32, VideoOperation)> {
        self.video_order
            .iter()
            .filter_map(|id| self.videos.get(id))
            .filter(|v| v.is_pollable())
            .filter_map(|v| {
                v.operation
                    .clone()
                    .map(|op| (v.id.clone(), v.attempt, op))
            })
            .collect()
    }

    /// Whether the polling loop has anything to do.
    pub fn has_pollable_videos(&self) -> bool {
        self.videos.values().any(|v| v.is_pollable())
    }

    /// Local blob URLs held by videos; used to release blobs when videos are cleared.
    pub fn video_blob_urls(&self) -> Vec<String> {
        self.videos
            .values()
            .filter_map(|v| v.blob_url.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: &str, number: u32) -> ScriptScene {
        ScriptScene::new(id, number)
            .with_description(format!("goal {number}"))
            .with_prompt(format!("prompt {number}"))
    }

    #[test]
    fn test_new_store() {
        let store = SessionStore::new(AspectRatio::Portrait);
        assert_eq!(store.phase, WorkflowPhase::Idle);
        assert!(store.mode.is_none());
        assert_eq!(store.image_count(), 0);
        assert!(store.script().is_empty());
    }

    #[test]
    fn test_insert_and_update_image() {
        let mut store = SessionStore::default();
        let image = GeneratedImage::for_scene(&scene("s1", 1));
        let id = image.id.clone();
        store.insert_image(image);

        assert!(store.update_image(&id, |img| img.status = ImageStatus::Generating));
        assert_eq!(store.get_image(&id).unwrap().status, ImageStatus::Generating);
        assert!(!store.update_image("missing", |img| img.status = ImageStatus::Failed));
    }

    #[test]
    fn test_guarded_update_drops_stale_write() {
        let mut store = SessionStore::default();
        let image = GeneratedImage::for_scene(&scene("s1", 1)).with_status(ImageStatus::UserApproved);
        let id = image.id.clone();
        store.insert_image(image);

        let applied = store.update_image_if(
            &id,
            |img| img.status == ImageStatus::Generating,
            |img| img.status = ImageStatus::Reviewing,
        );
        assert!(!applied);
        assert_eq!(store.get_image(&id).unwrap().status, ImageStatus::UserApproved);
    }

    #[test]
    fn test_interleaved_updates_keep_siblings() {
        let mut store = SessionStore::default();
        let a = GeneratedImage::for_scene(&scene("s1", 1));
        let b = GeneratedImage::for_scene(&scene("s2", 2));
        let (id_a, id_b) = (a.id.clone(), b.id.clone());
        store.insert_image(a);
        store.insert_image(b);

        store.update_image(&id_b, |img| img.status = ImageStatus::Failed);
        store.update_image(&id_a, |img| {
            img.image_data = Some(ImageData::new("AAAA", "image/png"));
            img.status = ImageStatus::Reviewing;
        });

        assert_eq!(store.get_image(&id_a).unwrap().status, ImageStatus::Reviewing);
        assert_eq!(store.get_image(&id_b).unwrap().status, ImageStatus::Failed);
        assert_eq!(store.images().len(), 2);
        assert_eq!(store.images()[0].id, id_a);
    }

    #[test]
    fn test_script_ordering_and_unique_ids() {
        let mut store = SessionStore::default();
        store.replace_script(vec![scene("cena-3", 3), scene("cena-1", 1), scene("cena-1", 2)]);

        let script = store.script();
        assert_eq!(
            script.iter().map(|s| s.scene_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(script[0].id, "cena-1");
        assert_ne!(script[1].id, "cena-1");
    }

    #[test]
    fn test_append_scene_numbering() {
        let mut store = SessionStore::default();
        store.replace_script(vec![scene("a", 1), scene("b", 5)]);

        let added = store.append_scene(scene("a", 1));
        assert_eq!(added.scene_number, 6);
        assert_ne!(added.id, "a");
        assert_eq!(store.scene_count(), 3);

        let mut fresh = SessionStore::default();
        fresh.replace_script(vec![scene("x", 1), scene("y", 2)]);
        assert_eq!(fresh.append_scene(scene("z", 9)).scene_number, 3);
    }

    #[test]
    fn test_video_upsert_never_duplicates() {
        let mut store = SessionStore::default();
        let (first, first_attempt) = store.upsert_generating_video("img-1");
        store.update_video(&first, |v| {
            v.status = VideoStatus::Failed;
            v.error_message = Some("quota".into());
            v.operation = Some(VideoOperation::pending("op-1"));
        });

        let (second, second_attempt) = store.upsert_generating_video("img-1");
        assert_eq!(first, second);
        assert_eq!(second_attempt, first_attempt + 1);
        assert_eq!(store.video_count(), 1);

        let video = store.get_video(&second).unwrap();
        assert_eq!(video.status, VideoStatus::Generating);
        assert!(video.error_message.is_none());
        assert!(video.operation.is_none());
    }

    #[test]
    fn test_pollable_videos() {
        let mut store = SessionStore::default();
        let (a, _) = store.upsert_generating_video("img-a");
        let (b, _) = store.upsert_generating_video("img-b");
        store.update_video(&a, |v| v.operation = Some(VideoOperation::pending("op-a")));
        store.update_video(&b, |v| v.operation = Some(VideoOperation::pending("op-b").with_uri("u")));

        let pollable = store.pollable_videos();
        assert_eq!(pollable.len(), 1);
        assert_eq!(pollable[0].0, a);
        assert_eq!(pollable[0].1, 1);
        assert!(store.has_pollable_videos());
    }

    #[test]
    fn test_context_images_skip_empty() {
        let mut store = SessionStore::default();
        store.replace_context_items(vec![
            UserContextItem::new(ContextType::Component),
            UserContextItem::new(ContextType::ScaleReference)
                .with_image(ImageData::new("BBBB", "image/jpeg")),
        ]);
        assert_eq!(store.context_item_count(), 2);
        assert_eq!(store.context_images(), vec![ImageData::new("BBBB", "image/jpeg")]);
    }

    #[test]
    fn test_reset_bumps_epoch() {
        let mut store = SessionStore::new(AspectRatio::Landscape);
        store.mode = Some(FlowMode::Photos);
        store.fail("boom");
        let before = store.epoch;

        store.reset(AspectRatio::Portrait);
        assert_eq!(store.epoch, before + 1);
        assert!(store.mode.is_none());
        assert!(store.error.is_none());
        assert_eq!(store.phase, WorkflowPhase::Idle);
        assert_eq!(store.aspect_ratio, AspectRatio::Portrait);
    }
}
