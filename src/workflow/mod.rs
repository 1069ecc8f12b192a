//! Workflow orchestration.
//!
//! This module provides:
//! - `orchestrator`: Workflow with the phase state machine and user intents
//! - `pipeline`: per-image generate and review pipeline, scene fan-out
//! - `navigation`: back navigation table
//! - `poller`: shared background polling loop for video jobs

pub mod navigation;
pub mod orchestrator;
mod pipeline;
mod poller;

pub use navigation::{back_step, BackStep, DataPresence};
pub use orchestrator::{Workflow, DEFAULT_SCENE_COUNT, MAX_SCENE_COUNT, MIN_SCENE_COUNT};
