// SPDX-License-Identifier: MIT

//! Retry orchestration around a single provider.
//!
//! One generation at a time per invocation: validate the style, compile (or
//! fetch) the template, then drive an explicit attempt loop with linear
//! backoff. Exhausting the loop is a reported failure, never a silent
//! default message.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::domain::{CommitStyle, GenerationRequest};
use crate::error::{Error, Result};
use crate::services::llm::{LlmProvider, ProviderRegistry};
use crate::services::template::TemplateCache;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

pub struct Generator {
    provider: Box<dyn LlmProvider>,
    max_attempts: u32,
    backoff_base: Duration,
}

impl Generator {
    /// Resolve the configured provider through the process-wide registry.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_registry(ProviderRegistry::global(), config)
    }

    /// Resolve through an explicit registry (tests register doubles here).
    pub fn from_registry(registry: &ProviderRegistry, config: &Config) -> Result<Self> {
        let provider = registry.resolve(&config.provider, config)?;
        Ok(Self {
            provider,
            max_attempts: config.max_retries.max(1),
            backoff_base: Duration::from_millis(config.retry_base_ms),
        })
    }

    /// Wrap an already-built provider, bypassing the registry.
    pub fn with_provider(provider: Box<dyn LlmProvider>) -> Self {
        Self {
            provider,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF,
        }
    }

    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// The sole public entry point of the pipeline: produce a formatted
    /// commit message for `diff`, or a terminal error once style
    /// validation, degradation tiers, and retries are all exhausted.
    pub async fn generate(
        &self,
        diff: &str,
        style: &str,
        context: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<String> {
        // Invalid style is a caller bug: terminal, never retried
        let style: CommitStyle = style.parse()?;
        let template = TemplateCache::global().get_or_compile(style)?;

        let mut request = GenerationRequest::new(diff, style);
        if let Some(context) = context {
            request = request.with_context(context);
        }

        let mut last_err = Error::Extraction;

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            debug!(
                attempt,
                provider = self.provider.name(),
                style = %style,
                "generating commit message"
            );

            match self
                .provider
                .generate(&request, &template, cancel.clone())
                .await
            {
                Ok(message) if !message.trim().is_empty() => {
                    debug!(attempt, "commit message generated");
                    return Ok(message);
                }
                Ok(_) => {
                    warn!(attempt, "provider returned an empty message");
                    last_err = Error::Extraction;
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(attempt, error = %e, "generation attempt failed");
                    last_err = e;
                }
            }

            if attempt < self.max_attempts {
                let delay = self.backoff_base * attempt;
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Err(Error::Exhausted {
            attempts: self.max_attempts,
            source: Box::new(last_err),
        })
    }
}
