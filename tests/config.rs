// SPDX-License-Identifier: MIT

use scribe::config::Config;

// ─── Default values ──────────────────────────────────────────────────────────

#[test]
fn default_config_values() {
    let config = Config::default();
    assert_eq!(config.provider, "ollama");
    assert!(config.model.is_none());
    assert_eq!(config.style, "conventional");
    assert!(config.api_key.is_none());
    assert_eq!(config.ollama_host, "http://localhost:11434");
    assert!(config.openai_base_url.is_none());
    assert!(config.anthropic_base_url.is_none());
    assert_eq!(config.timeout_secs, 300);
    assert!((config.temperature - 0.3).abs() < f32::EPSILON);
    assert_eq!(config.max_tokens, 512);
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.retry_base_ms, 1000);
    assert!(config.extra.is_empty());
}

// ─── TOML deserialization ────────────────────────────────────────────────────

#[test]
fn load_from_valid_toml() {
    let toml_str = r#"
provider = "openai"
model = "gpt-4o"
style = "gitmoji"
timeout_secs = 60
max_retries = 5

[extra]
organization = "acme"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.provider, "openai");
    assert_eq!(config.model.as_deref(), Some("gpt-4o"));
    assert_eq!(config.style, "gitmoji");
    assert_eq!(config.timeout_secs, 60);
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.extra.get("organization").map(String::as_str), Some("acme"));
}

#[test]
fn load_partial_toml_uses_defaults() {
    let toml_str = r#"model = "llama3:8b""#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.model.as_deref(), Some("llama3:8b"));
    // Everything else should be default
    assert_eq!(config.provider, "ollama");
    assert_eq!(config.style, "conventional");
    assert_eq!(config.ollama_host, "http://localhost:11434");
}

#[test]
fn empty_toml_uses_all_defaults() {
    let config: Config = toml::from_str("").unwrap();
    let default = Config::default();
    assert_eq!(config.provider, default.provider);
    assert_eq!(config.model, default.model);
    assert_eq!(config.max_retries, default.max_retries);
}

// ─── Error handling ──────────────────────────────────────────────────────────

#[test]
fn invalid_toml_returns_error() {
    let result: std::result::Result<Config, _> = toml::from_str("provider = [invalid");
    assert!(result.is_err(), "invalid TOML should return an error");
}
