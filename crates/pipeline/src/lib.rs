pub mod cleanup;
pub mod opportunities;
pub mod orchestrator;
pub mod phases;
pub mod request;
pub mod retry;
pub mod seeds;
pub mod sla;

use std::sync::Arc;

use devapi::{DevApiError, ManagementApi};
use genai::{ContentGenerator, GenError};
use thiserror::Error;

pub use orchestrator::{spawn_cleanup, spawn_generation};
pub use request::{CleanupRequest, GenerationRequest, Settings};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Api(#[from] DevApiError),
    #[error(transparent)]
    Generation(#[from] GenError),
    #[error("seed data error: {0}")]
    Seed(String),
    #[error("{0}")]
    Failed(String),
}

/// Constructs the two external adapters for a run. The management API is
/// per-request (it carries the caller's PAT); the content generator is
/// shared so its concurrency gate spans all sessions.
pub trait AdapterFactory: Send + Sync {
    fn management_api(&self, pat: &str) -> Arc<dyn ManagementApi>;

    fn content_generator(&self) -> Arc<dyn ContentGenerator>;
}
