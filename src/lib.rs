//! ContentStudio - Workflow engine for AI-assisted product photo and video production.
//!
//! A session walks one product image through a guided pipeline:
//!
//! - **Analyze**: the upload is described and its components become context items
//! - **Plan**: a scene script is generated from the analysis and user context
//! - **Generate & review**: every scene gets an image, scored by a reviewer model
//! - **Approve**: the user approves, rejects, regenerates with feedback or retries
//! - **Animate**: approved images can be turned into videos, polled until done
//!
//! All model calls go through a [`Gateway`]. The [`Workflow`] owns the session
//! stores; views render [`WorkflowSnapshot`]s and send back [`Intent`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use contentstudio::{
//!     AspectRatio, FlowMode, GatewayConfig, HttpGateway, Intent, UploadedFile, Workflow,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::new("https://example.supabase.co/functions/v1/gemini-service")
//!     .with_api_key("anon-key");
//! let workflow = Workflow::new(Arc::new(HttpGateway::new(&config)?));
//!
//! Intent::SelectMode(FlowMode::Video).dispatch(&workflow).await?;
//! Intent::UploadImage(UploadedFile::new(std::fs::read("mic.png")?, "image/png"))
//!     .dispatch(&workflow)
//!     .await?;
//!
//! let items = workflow.snapshot().context_items;
//! workflow.confirm_setup(items, 3, AspectRatio::Portrait).await?;
//! workflow.confirm_script().await?;
//!
//! for card in workflow.snapshot().cards() {
//!     println!("scene {:?}: {}", card.scene_number, card.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod media;
pub mod session;
pub mod view;
pub mod workflow;

// Re-exports for convenience
pub use config::{GatewayConfig, WorkflowConfig};
pub use error::{StudioError, StudioResult};
pub use gateway::{Gateway, HttpGateway};
pub use media::{Blob, ImageData, UploadedFile};
pub use session::{
    AspectRatio, ContextItemEdit, ContextType, FlowMode, GeneratedImage, GeneratedVideo,
    ImageAnalysis, ImageStatus, ProductComponent, ReviewResult, ScriptScene, SessionStore,
    UserContextItem, VideoOperation, VideoStatus, WorkflowPhase,
};
pub use view::{ImageCard, Intent, WorkflowSnapshot};
pub use workflow::Workflow;
