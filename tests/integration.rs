// SPDX-License-Identifier: MIT

//! Integration tests for the provider ladder and the generation loop.
//!
//! Uses `wiremock` to mock HTTP endpoints so no real LLM servers are needed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scribe::config::Config;
use scribe::domain::{CommitStyle, GenerationRequest};
use scribe::error::Error;
use scribe::services::generator::Generator;
use scribe::services::llm::{LlmProvider, ProviderRegistry};
use scribe::services::template::{self, CompiledTemplate};

// ─── Test helpers ────────────────────────────────────────────────────────────

const DIFF: &str = "diff --git a/src/lib.rs b/src/lib.rs\n+fn hello() {}\n";

fn ollama_config(server_url: &str) -> Config {
    Config {
        provider: "ollama".into(),
        ollama_host: server_url.to_string(),
        timeout_secs: 5,
        retry_base_ms: 1,
        ..Config::default()
    }
}

fn openai_config(server_url: &str) -> Config {
    Config {
        provider: "openai".into(),
        model: Some("gpt-4o-mini".into()),
        openai_base_url: Some(server_url.to_string()),
        api_key: Some("test-key-12345678".into()),
        timeout_secs: 5,
        retry_base_ms: 1,
        ..Config::default()
    }
}

fn anthropic_config(server_url: &str) -> Config {
    Config {
        provider: "anthropic".into(),
        model: Some("claude-3-5-haiku-20241022".into()),
        anthropic_base_url: Some(server_url.to_string()),
        api_key: Some("test-key-12345678".into()),
        timeout_secs: 5,
        retry_base_ms: 1,
        ..Config::default()
    }
}

fn conventional_template() -> CompiledTemplate {
    template::compile(CommitStyle::Conventional).unwrap()
}

fn conventional_request() -> GenerationRequest {
    GenerationRequest::new(DIFF, CommitStyle::Conventional)
}

fn resolve(config: &Config) -> Box<dyn LlmProvider> {
    ProviderRegistry::with_builtins()
        .resolve(&config.provider, config)
        .unwrap()
}

// ─── OpenAI: structured output tier ──────────────────────────────────────────

#[tokio::test]
async fn openai_structured_output_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "response_format": {"type": "json_schema"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content":
                r#"{"type":"feat","scope":"auth","subject":"add login endpoint","body":"Implements POST /login with JWT."}"#
            }}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = resolve(&openai_config(&server.uri()));
    let message = provider
        .generate(
            &conventional_request(),
            &conventional_template(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        message,
        "feat(auth): add login endpoint\n\nImplements POST /login with JWT."
    );
}

// ─── OpenAI: structured failure falls back to regular completion ─────────────

#[tokio::test]
async fn openai_falls_back_to_regular_completion() {
    let server = MockServer::start().await;

    // Structured requests carry response_format; reject those.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "response_format": {"type": "json_schema"}
        })))
        .respond_with(ResponseTemplate::new(400).set_body_string("schema not supported"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content":
                r#"{"type":"fix","subject":"handle empty diff"}"#
            }}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = resolve(&openai_config(&server.uri()));
    let message = provider
        .generate(
            &conventional_request(),
            &conventional_template(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(message, "fix: handle empty diff");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

// ─── OpenAI: content-type mismatch jumps straight to raw transport ───────────

#[tokio::test]
async fn openai_content_type_mismatch_uses_raw_transport() {
    let server = MockServer::start().await;

    // A misbehaving gateway that answers every call with text/plain. The
    // structured tier must fail on the content type and the provider must
    // issue exactly one raw-transport request, which tolerates the body.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("feat: quick fix"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let provider = resolve(&openai_config(&server.uri()));
    let message = provider
        .generate(
            &conventional_request(),
            &conventional_template(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(message, "feat: quick fix");
    // structured + raw, never the regular-completion tier
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

// ─── OpenAI: server error surfaces as a provider error ───────────────────────

#[tokio::test]
async fn openai_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let provider = resolve(&openai_config(&server.uri()));
    let result = provider
        .generate(
            &conventional_request(),
            &conventional_template(),
            CancellationToken::new(),
        )
        .await;

    let err = result.unwrap_err();
    match err {
        Error::Provider { provider, message } => {
            assert_eq!(provider, "openai");
            assert!(
                message.contains("500"),
                "expected message to contain status code 500, got: {message}"
            );
        }
        other => panic!("expected Provider error, got: {other:?}"),
    }
}

// ─── Anthropic: forced tool use ───────────────────────────────────────────────

#[tokio::test]
async fn anthropic_tool_use_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(serde_json::json!({
            "tool_choice": {"type": "tool", "name": "emit_commit_message"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{
                "type": "tool_use",
                "name": "emit_commit_message",
                "input": {
                    "type": "feat",
                    "scope": "auth",
                    "subject": "add login endpoint",
                    "body": "Implements POST /login with JWT."
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = resolve(&anthropic_config(&server.uri()));
    let message = provider
        .generate(
            &conventional_request(),
            &conventional_template(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        message,
        "feat(auth): add login endpoint\n\nImplements POST /login with JWT."
    );
}

// ─── Anthropic: primed completion for models without tool support ────────────

#[tokio::test]
async fn anthropic_primed_completion_success() {
    let server = MockServer::start().await;

    // The model continues the primed JSON prefix; the extractor re-prepends
    // it before parsing.
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{
                "type": "text",
                "text": "feat\",\n  \"subject\": \"add retries\"\n}"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = anthropic_config(&server.uri());
    config.model = Some("claude-2.1".into());

    let provider = resolve(&config);
    let message = provider
        .generate(
            &conventional_request(),
            &conventional_template(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(message, "feat: add retries");
}

// ─── Anthropic: content-type mismatch jumps to raw transport ─────────────────

#[tokio::test]
async fn anthropic_content_type_mismatch_uses_raw_transport() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("fix(parser): resolve token scanner bug"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let provider = resolve(&anthropic_config(&server.uri()));
    let message = provider
        .generate(
            &conventional_request(),
            &conventional_template(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(message, "fix(parser): resolve token scanner bug");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

// ─── Ollama: schema-constrained chat ──────────────────────────────────────────

#[tokio::test]
async fn ollama_schema_format_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "format": {"type": "object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": {"content":
                r#"{"type":"refactor","scope":"cache","subject":"use double-checked locking"}"#
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = resolve(&ollama_config(&server.uri()));
    let message = provider
        .generate(
            &conventional_request(),
            &conventional_template(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(message, "refactor(cache): use double-checked locking");
}

// ─── Generator: transient failures retried, then success ─────────────────────

#[tokio::test]
async fn generator_retries_transient_failures() {
    let server = MockServer::start().await;

    // First two attempts fail with a server error, the third succeeds.
    // The phi3 model family skips the schema tier, so each generation
    // attempt is exactly one request.
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": {"content": r#"{"type":"fix","subject":"survive flaky backends"}"#}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = ollama_config(&server.uri());
    config.model = Some("phi3".into());
    config.max_retries = 3;

    let registry = ProviderRegistry::with_builtins();
    let generator = Generator::from_registry(&registry, &config).unwrap();

    let message = generator
        .generate(DIFF, "conventional", None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(message, "fix: survive flaky backends");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

// ─── Generator: exhaustion after the attempt cap ──────────────────────────────

#[tokio::test]
async fn generator_exhausts_after_max_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = ollama_config(&server.uri());
    config.model = Some("phi3".into());
    config.max_retries = 3;

    let registry = ProviderRegistry::with_builtins();
    let generator = Generator::from_registry(&registry, &config).unwrap();

    let err = generator
        .generate(DIFF, "conventional", None, CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Exhausted { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, Error::Provider { .. }));
        }
        other => panic!("expected Exhausted, got: {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

// ─── Generator: custom providers through the registry ────────────────────────

/// Test double: returns an empty message on the first call, then a real one.
struct FlakyProvider {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LlmProvider for FlakyProvider {
    async fn generate(
        &self,
        _request: &GenerationRequest,
        _template: &CompiledTemplate,
        _cancel: CancellationToken,
    ) -> scribe::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            Ok(String::new())
        } else {
            Ok("chore: tidy imports".into())
        }
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[tokio::test]
async fn generator_retries_empty_messages_from_registered_provider() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_for_factory = calls.clone();

    let registry = ProviderRegistry::new();
    registry.register(
        "flaky",
        Box::new(move |_config| {
            Ok(Box::new(FlakyProvider {
                calls: calls_for_factory.clone(),
            }) as Box<dyn LlmProvider>)
        }),
    );

    let config = Config {
        provider: "flaky".into(),
        retry_base_ms: 1,
        ..Config::default()
    };

    let generator = Generator::from_registry(&registry, &config).unwrap();
    let message = generator
        .generate(DIFF, "conventional", None, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(message, "chore: tidy imports");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn generator_rejects_unknown_style_before_contacting_provider() {
    let calls = Arc::new(AtomicUsize::new(0));
    let generator = Generator::with_provider(Box::new(FlakyProvider {
        calls: calls.clone(),
    }))
    .backoff_base(Duration::from_millis(1));

    let err = generator
        .generate(DIFF, "haiku", None, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnknownStyle(style) if style == "haiku"));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "provider must not be called");
}

#[tokio::test]
async fn unsupported_provider_is_a_distinct_error() {
    let config = Config {
        provider: "mystery".into(),
        ..Config::default()
    };

    let registry = ProviderRegistry::with_builtins();
    let Err(err) = Generator::from_registry(&registry, &config) else {
        panic!("expected resolution to fail for an unregistered provider");
    };

    assert!(matches!(err, Error::UnsupportedProvider(name) if name == "mystery"));
}

// ─── Cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_token_aborts_before_any_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": {"content": "feat: never seen"}
        })))
        .expect(0)
        .mount(&server)
        .await;

    let config = ollama_config(&server.uri());
    let registry = ProviderRegistry::with_builtins();
    let generator = Generator::from_registry(&registry, &config).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = generator
        .generate(DIFF, "conventional", None, cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
}
