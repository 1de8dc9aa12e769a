// SPDX-License-Identifier: MIT

//! Provider abstraction and registry.
//!
//! The orchestrator only ever sees [`LlmProvider`]; concrete backends are
//! resolved by name through [`ProviderRegistry`], so new backends (and test
//! doubles) register a factory instead of growing a match statement at every
//! call site.

pub mod anthropic;
pub mod ollama;
pub mod openai;

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::domain::GenerationRequest;
use crate::error::{Error, Result};
use crate::services::template::CompiledTemplate;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// One stateless generation round trip. Implementations run a
    /// structured-output → regular-completion → raw-transport degradation
    /// ladder internally and return an already-extracted commit message.
    async fn generate(
        &self,
        request: &GenerationRequest,
        template: &CompiledTemplate,
        cancel: CancellationToken,
    ) -> Result<String>;

    fn name(&self) -> &str;
}

pub type ProviderFactory =
    Box<dyn Fn(&Config) -> Result<Box<dyn LlmProvider>> + Send + Sync>;

static GLOBAL: LazyLock<ProviderRegistry> = LazyLock::new(ProviderRegistry::with_builtins);

/// Name-keyed factory table for provider backends.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: RwLock<HashMap<String, ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the builtin backends.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("ollama", Box::new(ollama::OllamaProvider::from_config));
        registry.register("openai", Box::new(openai::OpenAiProvider::from_config));
        registry.register("anthropic", Box::new(anthropic::AnthropicProvider::from_config));
        registry
    }

    /// The process-wide registry.
    pub fn global() -> &'static ProviderRegistry {
        &GLOBAL
    }

    pub fn register(&self, name: impl Into<String>, factory: ProviderFactory) {
        self.factories.write().insert(name.into(), factory);
    }

    /// Build a provider by name, or fail with a distinct unsupported-provider
    /// error. Configuration errors are never retried upstream.
    pub fn resolve(&self, name: &str, config: &Config) -> Result<Box<dyn LlmProvider>> {
        let factories = self.factories.read();
        let factory = factories
            .get(name)
            .ok_or_else(|| Error::UnsupportedProvider(name.to_string()))?;
        factory(config)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }
}

/// Content-type/response-shape mismatches (proxy or gateway mangling the
/// reply encoding) are recognized by substring so the degradation ladder can
/// jump straight to raw transport.
pub(crate) fn is_content_type_error(err: &Error) -> bool {
    let text = err.to_string().to_lowercase();
    text.contains("content-type")
        || text.contains("application/json")
        || text.contains("expected destination type")
}

/// Race an in-flight HTTP call against the cancellation token so a cancelled
/// or expired context aborts instead of hanging.
pub(crate) async fn send_cancellable(
    provider: &str,
    cancel: &CancellationToken,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        response = request.send() => response.map_err(|e| {
            if e.is_timeout() {
                Error::Provider {
                    provider: provider.into(),
                    message: "request timed out".into(),
                }
            } else {
                Error::Provider {
                    provider: provider.into(),
                    message: e.to_string(),
                }
            }
        }),
    }
}

/// Reject non-2xx replies and replies whose content type is not JSON; the
/// latter error text is what triggers the raw-transport jump.
pub(crate) async fn expect_json_body(
    provider: &str,
    response: reqwest::Response,
) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Provider {
            provider: provider.into(),
            message: format!("HTTP {status}: {body}"),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("application/json") {
        return Err(Error::Provider {
            provider: provider.into(),
            message: format!(
                "unexpected content-type '{content_type}', expected application/json"
            ),
        });
    }

    let body = response.text().await.map_err(|e| Error::Provider {
        provider: provider.into(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&body).map_err(|e| Error::Provider {
        provider: provider.into(),
        message: format!("response body is not valid application/json: {e}"),
    })
}
