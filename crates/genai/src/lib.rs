pub mod client;
pub mod parse;
pub mod prompts;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::OpenAiGenerator;

/// Capability → feature → subfeatures, as generated for a company website.
pub type Hierarchy = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Prompt template selector for generated work content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Tickets,
    Issues,
}

impl ContentKind {
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Tickets => "support tickets",
            ContentKind::Issues => "engineering issues",
        }
    }
}

/// One generated ticket or issue, before target-system fields are attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedWork {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    pub stage: String,
}

#[derive(Debug, Error)]
pub enum GenError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Provider-side failure (timeout, throttle, 5xx); retriable.
    #[error("provider failure: {0}")]
    Provider(String),
    /// The provider answered but not with parseable JSON.
    #[error("malformed generation output: {0}")]
    Malformed(String),
}

impl GenError {
    pub fn is_transient(&self) -> bool {
        // Malformed output is retried too: the model usually produces valid
        // JSON on a second attempt.
        matches!(self, GenError::Provider(_) | GenError::Malformed(_))
    }
}

/// Turns a context (company website, object kind, count) into generated
/// text blocks via the external AI capability. Stateless per call.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generates the product hierarchy tree for a company website.
    async fn generate_hierarchy(&self, website: &str) -> Result<Hierarchy, GenError>;

    /// Generates `count` works of the given kind for one hierarchy part.
    /// `count` must be at least 2 (`InvalidArgument` otherwise).
    async fn generate_works(
        &self,
        kind: ContentKind,
        part: &str,
        website: &str,
        count: u32,
    ) -> Result<Vec<GeneratedWork>, GenError>;
}
