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
use crate::services::extractor;
use crate::services::template::CompiledTemplate;

use super::{LlmProvider, expect_json_body, is_content_type_error, send_cancellable};

const DEFAULT_MODEL: &str = "qwen3:4b";

/// Model families known to honor a JSON schema in the `format` field.
const STRUCTURED_OUTPUT_FAMILIES: &[&str] = &["llama3", "qwen", "mistral", "gemma"];

pub struct OllamaProvider {
    client: Client,
    host: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaProvider {
    pub fn from_config(config: &Config) -> Result<Box<dyn LlmProvider>> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Ok(Box::new(Self {
            client,
            // Trailing slashes would produce //api/chat
            host: config.ollama_host.trim_end_matches('/').to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }))
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.host)
    }

    fn supports_schema_format(&self) -> bool {
        STRUCTURED_OUTPUT_FAMILIES
            .iter()
            .any(|family| self.model.starts_with(family))
    }

    fn request_body(&self, prompt: &str, schema: Option<&Value>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });
        if let Some(schema) = schema {
            body["format"] = schema.clone();
        }
        body
    }

    /// Tier 1: schema-constrained reply via the `format` field.
    async fn attempt_structured(
        &self,
        prompt: &str,
        template: &CompiledTemplate,
        cancel: &CancellationToken,
    ) -> Result<String> {
        debug!(model = %self.model, "attempting schema-constrained chat");
        let body = self.request_body(prompt, Some(template.schema()));
        let reply = self.send_chat(&body, cancel).await?;
        extractor::extract(&reply)
    }

    /// Tier 2: plain chat completion.
    async fn attempt_regular(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        debug!(model = %self.model, "attempting plain chat");
        let body = self.request_body(prompt, None);
        let reply = self.send_chat(&body, cancel).await?;
        extractor::extract(&reply)
    }

    async fn send_chat(&self, body: &Value, cancel: &CancellationToken) -> Result<String> {
        let request = self.client.post(self.chat_url()).json(body);
        let response = send_cancellable(self.name(), cancel, request).await?;
        let value = expect_json_body(self.name(), response).await?;

        message_content(&value).ok_or_else(|| Error::Provider {
            provider: self.name().into(),
            message: "no message content in chat reply".into(),
        })
    }

    /// Tier 3: manually constructed request, lenient body handling.
    async fn attempt_raw(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        debug!(model = %self.model, "attempting raw transport");
        let encoded = serde_json::to_string(&self.request_body(prompt, None)).map_err(|e| {
            Error::Provider {
                provider: self.name().into(),
                message: e.to_string(),
            }
        })?;

        let request = self
            .client
            .post(self.chat_url())
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
            .and_then(|v| message_content(&v))
            .unwrap_or(text);

        extractor::extract(&reply)
    }
}

fn message_content(value: &Value) -> Option<String> {
    value["message"]["content"].as_str().map(str::to_string)
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
        template: &CompiledTemplate,
        cancel: CancellationToken,
    ) -> Result<String> {
        let prompt = template.render_prompt(request)?;

        if self.supports_schema_format() {
            match self.attempt_structured(&prompt, template, &cancel).await {
                Ok(message) => return Ok(message),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) if is_content_type_error(&e) => {
                    warn!(error = %e, "schema-constrained chat hit a content-type mismatch, using raw transport");
                    return self.attempt_raw(&prompt, &cancel).await;
                }
                Err(e) => {
                    warn!(error = %e, "schema-constrained chat failed, falling back to plain chat");
                }
            }
        }

        match self.attempt_regular(&prompt, &cancel).await {
            Ok(message) => Ok(message),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) if is_content_type_error(&e) => {
                warn!(error = %e, "plain chat hit a content-type mismatch, using raw transport");
                self.attempt_raw(&prompt, &cancel).await
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
