// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cli::Cli;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider name resolved through the registry (ollama, openai,
    /// anthropic, or anything registered by an embedder).
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name; each provider falls back to its own default when unset.
    #[serde(default)]
    pub model: Option<String>,

    /// Commit message style: default, conventional, gitmoji
    #[serde(default = "default_style")]
    pub style: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_ollama_host")]
    pub ollama_host: String,

    #[serde(default)]
    pub openai_base_url: Option<String>,

    #[serde(default)]
    pub anthropic_base_url: Option<String>,

    /// Request timeout in seconds (default 300)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// LLM temperature (0.0-2.0, default 0.3)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate (default 512)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Generation attempts before giving up (default 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between attempts in milliseconds; attempt N sleeps
    /// N * base (default 1000)
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Provider-specific extension settings, passed through untouched.
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

fn default_provider() -> String {
    "ollama".into()
}
fn default_style() -> String {
    "conventional".into()
}
fn default_ollama_host() -> String {
    "http://localhost:11434".into()
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    512
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    1_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            style: default_style(),
            api_key: None,
            ollama_host: default_ollama_host(),
            openai_base_url: None,
            anthropic_base_url: None,
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            extra: HashMap::new(),
        }
    }
}

impl Config {
    /// Load with priority: CLI > ENV > user config > project config > defaults
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Project-level config (.scribe.toml in the working directory)
        if let Ok(cwd) = std::env::current_dir() {
            let project_config = cwd.join(".scribe.toml");
            if project_config.exists() {
                figment = figment.merge(Toml::file(&project_config));
            }
        }

        // User-level config
        if let Some(path) = Self::config_path() {
            if path.exists() {
                figment = figment.merge(Toml::file(&path));
            }
        }

        // Environment variables (SCRIBE_MODEL, SCRIBE_PROVIDER, ...)
        figment = figment.merge(Env::prefixed("SCRIBE_"));

        let mut config: Config = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "scribe").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref p) = cli.provider {
            self.provider = p.to_lowercase();
        }
        if let Some(ref m) = cli.model {
            self.model = Some(m.clone());
        }
        if let Some(ref s) = cli.style {
            self.style = s.to_lowercase();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.provider.trim().is_empty() {
            return Err(Error::Config("provider cannot be empty".into()));
        }

        if !(1..=3600).contains(&self.timeout_secs) {
            return Err(Error::Config(format!(
                "timeout_secs must be 1–3600, got {}",
                self.timeout_secs
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "temperature must be 0.0–2.0, got {}",
                self.temperature
            )));
        }

        if !(1..=10).contains(&self.max_retries) {
            return Err(Error::Config(format!(
                "max_retries must be 1–10, got {}",
                self.max_retries
            )));
        }

        for (name, value) in [
            ("ollama_host", Some(&self.ollama_host)),
            ("openai_base_url", self.openai_base_url.as_ref()),
            ("anthropic_base_url", self.anthropic_base_url.as_ref()),
        ] {
            let Some(value) = value else { continue };
            let url = Url::parse(value)
                .map_err(|e| Error::Config(format!("{name} is not a valid URL: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "{name} must use http:// or https://, got '{value}'"
                )));
            }
        }

        Ok(())
    }

    /// Create default config file with secure permissions
    pub fn create_default() -> Result<PathBuf> {
        let Some(dir) = Self::config_dir() else {
            return Err(Error::Config("Cannot determine config directory".into()));
        };

        fs::create_dir_all(&dir)?;

        let path = dir.join("config.toml");
        let content = r#"# scribe configuration

# LLM provider: ollama, openai, anthropic
provider = "ollama"

# Model name (each provider has its own default when unset)
# model = "qwen3:4b"

# Commit message style: default, conventional, gitmoji
style = "conventional"

# Ollama server URL
ollama_host = "http://localhost:11434"

# Request timeout in seconds
timeout_secs = 300

# Generation attempts before giving up
max_retries = 3
"#;

        fs::write(&path, content)?;

        // API keys may end up in here; keep it private (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(path)
    }
}
