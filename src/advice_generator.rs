//! Tone-matched advice for sessions that warrant an intervention.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{WatchError, WatchResult};

/// Returned when no intervention is needed. No backend call is made.
pub const CALM_MESSAGE: &str = "You're doing fine!";

/// Returned in place of generated advice when the backend fails and the
/// generator is configured to fail open.
pub const FALLBACK_ADVICE: &str = "You've been watching for a while. \
    Take a short break, stretch, and check in with the goal you set for yourself.";

pub const SYSTEM_INSTRUCTION: &str = "You are a wellness AI that adapts to the user's tone.";

/// Text-generation capability used by [`AdviceGenerator`].
#[async_trait]
pub trait AdviceBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> WatchResult<String>;

    fn name(&self) -> &str;
}

/// The single prompt sent to the backend. The three inputs are embedded
/// verbatim.
pub fn build_prompt(goal: &str, label: &str, tone_description: &str) -> String {
    format!(
        "The user currently feels '{label}' and their self-set goal is: '{goal}'.\n\
         They hope you respond in the following style: \"{tone_description}\".\n\
         Please provide a one-paragraph piece of advice in this tone that is supportive and emotionally appropriate."
    )
}

// OpenAI-compatible chat completion request/response
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions backend for any OpenAI-compatible provider.
pub struct ChatCompletionBackend {
    endpoint: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl ChatCompletionBackend {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> WatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::config(format!("failed to build advice client: {e}")))?;

        Ok(Self {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
            client,
        })
    }
}

#[async_trait]
impl AdviceBackend for ChatCompletionBackend {
    async fn generate(&self, prompt: &str) -> WatchResult<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let res = request
            .send()
            .await
            .map_err(|e| WatchError::advice(format!("request failed: {e}")))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(WatchError::advice(format!("backend error {status}: {body}")));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| WatchError::advice(format!("response parse failed: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| WatchError::advice("backend returned no completion"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Produces the advice text for one session outcome.
#[derive(Clone)]
pub struct AdviceGenerator {
    backend: Arc<dyn AdviceBackend>,
    timeout: Duration,
    fail_open: bool,
}

impl AdviceGenerator {
    pub fn new(backend: Arc<dyn AdviceBackend>, timeout: Duration, fail_open: bool) -> Self {
        Self {
            backend,
            timeout,
            fail_open,
        }
    }

    /// Canned message when `intervene` is false, generated advice otherwise.
    pub async fn advise(
        &self,
        intervene: bool,
        goal: &str,
        label: &str,
        tone_description: &str,
    ) -> WatchResult<String> {
        if !intervene {
            return Ok(CALM_MESSAGE.to_string());
        }
        self.generate(goal, label, tone_description).await
    }

    pub async fn generate(
        &self,
        goal: &str,
        label: &str,
        tone_description: &str,
    ) -> WatchResult<String> {
        let prompt = build_prompt(goal, label, tone_description);
        let result = match tokio::time::timeout(self.timeout, self.backend.generate(&prompt)).await
        {
            Ok(result) => result,
            Err(_) => Err(WatchError::advice(format!(
                "no completion within {}s",
                self.timeout.as_secs_f32()
            ))),
        };

        match result {
            Ok(text) => Ok(text),
            Err(e) if self.fail_open => {
                tracing::warn!(backend = self.backend.name(), error = %e, "advice generation failed, using fallback advice");
                Ok(FALLBACK_ADVICE.to_string())
            }
            Err(e) => Err(e),
        }
    }
}
