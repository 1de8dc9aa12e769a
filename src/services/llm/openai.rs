// SPDX-License-Identifier: MIT

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::domain::GenerationRequest;
use crate::error::{Error, Result};
use crate::services::credentials;
use crate::services::extractor;
use crate::services::template::CompiledTemplate;

use super::{LlmProvider, expect_json_body, is_content_type_error, send_cancellable};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Models known to honor schema-constrained (`json_schema`) replies.
/// Anything else skips straight to the regular-completion tier.
const STRUCTURED_OUTPUT_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4o-2024-08-06",
    "gpt-4o-2024-11-20",
    "gpt-4o-mini-2024-07-18",
];

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn from_config(config: &Config) -> Result<Box<dyn LlmProvider>> {
        let api_key = credentials::resolve_api_key(config.api_key.as_deref(), "openai")
            .ok_or_else(|| {
                Error::Config(format!(
                    "openai requires an API key; set api_key or {}",
                    credentials::env_var_name("openai")
                ))
            })?;
        credentials::warn_if_suspect("openai", &api_key);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Ok(Box::new(Self {
            client,
            base_url: config
                .openai_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }))
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, prompt: &str, schema: Option<&Value>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if let Some(schema) = schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "commit_message",
                    "description": "Structured commit message for the diff",
                    "strict": true,
                    "schema": schema,
                },
            });
        }
        body
    }

    /// Tier 1: schema-constrained reply.
    async fn attempt_structured(
        &self,
        prompt: &str,
        template: &CompiledTemplate,
        cancel: &CancellationToken,
    ) -> Result<String> {
        debug!(model = %self.model, "attempting structured output");
        let body = self.request_body(prompt, Some(template.schema()));
        let reply = self.send_chat(&body, cancel).await?;
        extractor::extract(&reply)
    }

    /// Tier 2: plain completion, the model approximates the shape unaided.
    async fn attempt_regular(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        debug!(model = %self.model, "attempting regular completion");
        let body = self.request_body(prompt, None);
        let reply = self.send_chat(&body, cancel).await?;
        extractor::extract(&reply)
    }

    async fn send_chat(&self, body: &Value, cancel: &CancellationToken) -> Result<String> {
        let request = self
            .client
            .post(self.chat_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body);

        let response = send_cancellable(self.name(), cancel, request).await?;
        let value = expect_json_body(self.name(), response).await?;

        message_content(&value).ok_or_else(|| Error::Provider {
            provider: self.name().into(),
            message: "no message content in completion reply".into(),
        })
    }

    /// Tier 3: manually constructed request with lenient body handling, for
    /// gateways that mangle the response encoding of the stricter tiers.
    async fn attempt_raw(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        debug!(model = %self.model, "attempting raw transport");
        let body = serde_json::to_string(&self.request_body(prompt, None)).map_err(|e| {
            Error::Provider {
                provider: self.name().into(),
                message: e.to_string(),
            }
        })?;

        let request = self
            .client
            .post(self.chat_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("User-Agent", concat!("scribe/", env!("CARGO_PKG_VERSION")))
            .body(body);

        let response = send_cancellable(self.name(), cancel, request).await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.name().into(),
                message: format!("HTTP {status}: {text}"),
            });
        }

        // Tolerant parse: a proper completion envelope if the body is JSON,
        // otherwise the body itself is handed to the extractor.
        let reply = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| message_content(&v))
            .unwrap_or(text);

        extractor::extract(&reply)
    }
}

fn message_content(value: &Value) -> Option<String> {
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
        template: &CompiledTemplate,
        cancel: CancellationToken,
    ) -> Result<String> {
        let prompt = template.render_prompt(request)?;

        if STRUCTURED_OUTPUT_MODELS.contains(&self.model.as_str()) {
            match self.attempt_structured(&prompt, template, &cancel).await {
                Ok(message) => return Ok(message),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) if is_content_type_error(&e) => {
                    warn!(error = %e, "structured output hit a content-type mismatch, using raw transport");
                    return self.attempt_raw(&prompt, &cancel).await;
                }
                Err(e) => {
                    warn!(error = %e, "structured output failed, falling back to regular completion");
                }
            }
        }

        match self.attempt_regular(&prompt, &cancel).await {
            Ok(message) => Ok(message),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) if is_content_type_error(&e) => {
                warn!(error = %e, "regular completion hit a content-type mismatch, using raw transport");
                self.attempt_raw(&prompt, &cancel).await
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}
