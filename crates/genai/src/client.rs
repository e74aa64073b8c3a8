use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Semaphore;

use crate::{
    ContentGenerator, ContentKind, GenError, GeneratedWork, Hierarchy,
    parse::{parse_hierarchy, parse_works},
    prompts,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 4;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions generator.
///
/// All outstanding calls across every session pass through one shared
/// semaphore so the provider is never hit with more than the configured
/// number of simultaneous requests; excess callers queue.
pub struct OpenAiGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    gate: Arc<Semaphore>,
}

impl OpenAiGenerator {
    pub fn new(base_url: &str, api_key: &str, model: &str, gate: Arc<Semaphore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            gate,
        }
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, GenError> {
        let _permit = self
            .gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GenError::Provider("generation gate closed".to_string()))?;

        let payload = json!({
            "model": self.model,
            "messages": [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GenError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, body, "completion request failed");
            return Err(GenError::Provider(format!("HTTP {status}")));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| GenError::Malformed(e.to_string()))?;
        completion
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| GenError::Malformed("no completion content".to_string()))
    }
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    async fn generate_hierarchy(&self, website: &str) -> Result<Hierarchy, GenError> {
        let text = self
            .complete(&prompts::hierarchy_system(), &prompts::hierarchy_user(website))
            .await?;
        parse_hierarchy(&text)
    }

    async fn generate_works(
        &self,
        kind: ContentKind,
        part: &str,
        website: &str,
        count: u32,
    ) -> Result<Vec<GeneratedWork>, GenError> {
        if count < 2 {
            return Err(GenError::InvalidArgument(format!(
                "at least 2 {} required, got {count}",
                kind.label()
            )));
        }

        let text = self
            .complete(
                &prompts::works_system(kind, website, part, count),
                &prompts::works_user(kind, part, count),
            )
            .await?;
        parse_works(&text)
    }
}
