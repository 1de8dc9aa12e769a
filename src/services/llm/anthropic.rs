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
use crate::services::extractor::{self, PARTIAL_COMPLETION_PREFIX};
use crate::services::template::CompiledTemplate;

use super::{LlmProvider, expect_json_body, is_content_type_error, send_cancellable};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";
const API_VERSION: &str = "2023-06-01";
const TOOL_NAME: &str = "emit_commit_message";

/// Models known to honor forced tool use with a JSON input schema.
const STRUCTURED_OUTPUT_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-3-7-sonnet-20250219",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
];

pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn from_config(config: &Config) -> Result<Box<dyn LlmProvider>> {
        let api_key = credentials::resolve_api_key(config.api_key.as_deref(), "anthropic")
            .ok_or_else(|| {
                Error::Config(format!(
                    "anthropic requires an API key; set api_key or {}",
                    credentials::env_var_name("anthropic")
                ))
            })?;
        credentials::warn_if_suspect("anthropic", &api_key);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Ok(Box::new(Self {
            client,
            base_url: config
                .anthropic_base_url
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

    fn messages_url(&self) -> String {
        format!("{}/messages", self.base_url)
    }

    fn base_request(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}],
        })
    }

    fn post(&self, body: &Value) -> reqwest::RequestBuilder {
        self.client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
    }

    /// Tier 1: forced tool use with the compiled schema as the tool input.
    async fn attempt_structured(
        &self,
        prompt: &str,
        template: &CompiledTemplate,
        cancel: &CancellationToken,
    ) -> Result<String> {
        debug!(model = %self.model, "attempting structured tool use");
        let mut body = self.base_request(prompt);
        body["tools"] = json!([{
            "name": TOOL_NAME,
            "description": "Emit a structured commit message for the diff",
            "input_schema": template.schema(),
        }]);
        body["tool_choice"] = json!({"type": "tool", "name": TOOL_NAME});

        let response = send_cancellable(self.name(), cancel, self.post(&body)).await?;
        let value = expect_json_body(self.name(), response).await?;

        let input = tool_input(&value).ok_or_else(|| Error::Provider {
            provider: self.name().into(),
            message: "no tool_use block in reply".into(),
        })?;
        let reply = serde_json::to_string(&input).map_err(|e| Error::Provider {
            provider: self.name().into(),
            message: e.to_string(),
        })?;
        extractor::extract(&reply)
    }

    /// Tier 2: plain messages call, primed with a partial JSON completion
    /// the model is expected to continue. The extractor re-prepends the
    /// prefix before parsing.
    async fn attempt_regular(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        debug!(model = %self.model, "attempting primed completion");
        let mut body = self.base_request(prompt);
        body["messages"] = json!([
            {"role": "user", "content": prompt},
            {"role": "assistant", "content": PARTIAL_COMPLETION_PREFIX},
        ]);

        let response = send_cancellable(self.name(), cancel, self.post(&body)).await?;
        let value = expect_json_body(self.name(), response).await?;

        let text = reply_text(&value).ok_or_else(|| Error::Provider {
            provider: self.name().into(),
            message: "no text block in reply".into(),
        })?;
        extractor::extract_with_prefix(PARTIAL_COMPLETION_PREFIX, &text)
    }

    /// Tier 3: manually constructed request, lenient body handling.
    async fn attempt_raw(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        debug!(model = %self.model, "attempting raw transport");
        let mut body = self.base_request(prompt);
        body["messages"] = json!([
            {"role": "user", "content": prompt},
            {"role": "assistant", "content": PARTIAL_COMPLETION_PREFIX},
        ]);
        let encoded = serde_json::to_string(&body).map_err(|e| Error::Provider {
            provider: self.name().into(),
            message: e.to_string(),
        })?;

        let request = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .header("User-Agent", concat!("scribe/", env!("CARGO_PKG_VERSION")))
            .body(encoded);

        let response = send_cancellable(self.name(), cancel, request).await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.name().into(),
                message: format!("HTTP {status}: {text}"),
            });
        }

        let reply = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| reply_text(&v))
            .unwrap_or(text);

        extractor::extract_with_prefix(PARTIAL_COMPLETION_PREFIX, &reply)
    }
}

fn reply_text(value: &Value) -> Option<String> {
    value["content"]
        .as_array()?
        .iter()
        .find(|block| block["type"] == "text")
        .and_then(|block| block["text"].as_str())
        .map(str::to_string)
}

fn tool_input(value: &Value) -> Option<Value> {
    value["content"]
        .as_array()?
        .iter()
        .find(|block| block["type"] == "tool_use")
        .map(|block| block["input"].clone())
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
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
                    warn!(error = %e, "structured tool use hit a content-type mismatch, using raw transport");
                    return self.attempt_raw(&prompt, &cancel).await;
                }
                Err(e) => {
                    warn!(error = %e, "structured tool use failed, falling back to primed completion");
                }
            }
        }

        match self.attempt_regular(&prompt, &cancel).await {
            Ok(message) => Ok(message),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) if is_content_type_error(&e) => {
                warn!(error = %e, "primed completion hit a content-type mismatch, using raw transport");
                self.attempt_raw(&prompt, &cancel).await
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
