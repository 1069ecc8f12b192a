//! Entity stores for one production session.
//!
//! This module provides:
//! - `model`: Data structures (WorkflowPhase, ImageAnalysis, UserContextItem, ScriptScene, GeneratedImage, GeneratedVideo)
//! - `manager`: SessionStore with per-entity keyed CRUD

pub mod manager;
pub mod model;

pub use manager::SessionStore;
pub use model::*;
