use std::sync::Arc;

use devapi::{HttpManagementApi, ManagementApi};
use genai::{ContentGenerator, OpenAiGenerator, client::DEFAULT_MAX_CONCURRENT_CALLS};
use pipeline::AdapterFactory;
use tokio::sync::Semaphore;

const DEFAULT_DEVREV_BASE_URL: &str = "https://api.devrev.ai/internal";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Production adapter factory. The management API client is built per
/// request because it carries the caller's PAT; the content generator is
/// shared so its concurrency gate spans all sessions.
pub struct HttpAdapterFactory {
    devrev_base_url: String,
    generator: Arc<OpenAiGenerator>,
}

impl HttpAdapterFactory {
    /// Reads the adapter configuration from the environment.
    /// `OPENAI_API_KEY` is required; everything else has defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let devrev_base_url = std::env::var("DEMOGEN_DEVREV_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_DEVREV_BASE_URL.to_string());
        let openai_base_url = std::env::var("DEMOGEN_OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;
        let model = std::env::var("DEMOGEN_OPENAI_MODEL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string());
        let max_calls = std::env::var("DEMOGEN_MAX_CONCURRENT_AI_CALLS")
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_CALLS);

        tracing::info!(
            devrev_base_url,
            openai_base_url,
            model,
            max_calls,
            "adapter configuration loaded"
        );

        let gate = Arc::new(Semaphore::new(max_calls));
        let generator = Arc::new(OpenAiGenerator::new(
            &openai_base_url,
            &api_key,
            &model,
            gate,
        ));
        Ok(Self {
            devrev_base_url,
            generator,
        })
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn management_api(&self, pat: &str) -> Arc<dyn ManagementApi> {
        Arc::new(HttpManagementApi::new(&self.devrev_base_url, pat))
    }

    fn content_generator(&self) -> Arc<dyn ContentGenerator> {
        self.generator.clone()
    }
}
