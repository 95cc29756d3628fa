//! HTTP implementation of the [`LlmCaller`] contract.
//!
//! Speaks the OpenAI-compatible `chat/completions` shape. Supported
//! providers: `openai_compatible` and `yandex_ai_studio` (the latter adds an
//! `OpenAI-Project` header when the route carries a project id).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::caller::{CallError, LlmCaller};
use crate::catalog::CallSpec;

/// Deadline applied when the route does not carry one.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpLlmCaller {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl HttpLlmCaller {
    pub fn new(api_key: impl Into<String>) -> anyhow::Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            anyhow::bail!("an API key is required");
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
        })
    }

    fn build_url(&self, spec: &CallSpec) -> Result<String, CallError> {
        let base = spec
            .base_url
            .as_deref()
            .map(str::to_string)
            .or_else(|| std::env::var(crate::config::ENV_BASE_URL).ok())
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                CallError::Unavailable("no base_url on the route and no fallback configured".into())
            })?;
        Ok(format!("{}/chat/completions", base.trim_end_matches('/')))
    }

    fn build_body(&self, spec: &CallSpec, prompt: &str) -> serde_json::Value {
        let mut body = json!({
            "model": spec.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(temperature) = spec.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = spec.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl LlmCaller for HttpLlmCaller {
    async fn call(&self, spec: &CallSpec, prompt: &str) -> Result<String, CallError> {
        let url = self.build_url(spec)?;
        let timeout = spec
            .timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        info!(
            target: "llm_policy",
            provider = %spec.provider,
            model = %spec.model,
            timeout_ms = timeout.as_millis() as u64,
            "llm http request"
        );

        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&self.build_body(spec, prompt));
        if spec.provider == "yandex_ai_studio" {
            if let Some(project) = &spec.project {
                request = request.header("OpenAI-Project", project);
            }
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CallError::Timeout
            } else if e.is_connect() {
                CallError::Unavailable(format!("connection failed: {e}"))
            } else {
                CallError::Unavailable(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallError::Unavailable(format!("HTTP status {status}")));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|_| CallError::Unavailable("response body is not a chat completion".into()))?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CallError::Unavailable("completion carried no choices".into()))
    }
}
