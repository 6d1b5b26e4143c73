// lib.rs - Main library file that exports all modules
pub mod error;
pub mod pipeline;
pub mod reasoning_client;
pub mod session;
pub mod types;
pub mod video_client;

// Re-export commonly used types for convenience
pub use error::PipelineError;
pub use pipeline::assemble::{FirstClipAssembler, MasterAssembler};
pub use pipeline::orchestrator::ProductionOrchestrator;
pub use pipeline::render::RenderOptions;
pub use pipeline::{PipelineStatus, ProgressUpdate};
pub use reasoning_client::{GeminiClient, ReasoningService};
pub use session::{CredentialStore, Credentials, ModelSelection};
pub use types::*;
pub use video_client::{VeoClient, VideoService};
