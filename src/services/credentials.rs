// SPDX-License-Identifier: MIT

//! Credential resolution and hygiene.
//!
//! Keys come from the config first, then from a `<PROVIDER>_API_KEY`
//! environment variable. Validation only ever warns: a placeholder-looking
//! or short key may still work, and the backend's own 401 is the real
//! authority.

use tracing::warn;

const PLACEHOLDERS: &[&str] = &[
    "your-api-key",
    "your-token",
    "your-secret",
    "api-key-here",
    "token-here",
    "secret-here",
    "changeme",
    "replace-me",
];

const MIN_CREDENTIAL_LEN: usize = 8;

/// Resolve a credential for `provider`: explicit config value first, then
/// the `<PROVIDER>_API_KEY` environment variable.
pub fn resolve_api_key(explicit: Option<&str>, provider: &str) -> Option<String> {
    if let Some(key) = explicit {
        if !key.trim().is_empty() {
            return Some(key.to_string());
        }
    }
    std::env::var(env_var_name(provider)).ok().filter(|k| !k.trim().is_empty())
}

/// Deterministic environment variable name for a provider, e.g.
/// `OPENAI_API_KEY` for `openai`.
pub fn env_var_name(provider: &str) -> String {
    format!("{}_API_KEY", provider.to_uppercase())
}

/// Warn (never fail) when a credential looks like a placeholder or is
/// suspiciously short. Logs only the masked form.
pub fn warn_if_suspect(provider: &str, credential: &str) {
    if credential.is_empty() {
        return;
    }

    let lowered = credential.to_lowercase();
    if PLACEHOLDERS.iter().any(|p| lowered.contains(p)) {
        warn!(
            provider,
            key = %mask(credential),
            "credential looks like a placeholder value"
        );
        return;
    }

    if credential.len() < MIN_CREDENTIAL_LEN {
        warn!(
            provider,
            key = %mask(credential),
            "credential looks too short to be valid"
        );
    }
}

/// Mask a credential for logging: first and last four characters visible
/// for long values, fully masked otherwise.
pub fn mask(credential: &str) -> String {
    if credential.is_empty() {
        return "[not-set]".to_string();
    }
    if credential.len() <= 8 || !credential.is_ascii() {
        return "*".repeat(credential.chars().count());
    }
    format!(
        "{}{}{}",
        &credential[..4],
        "*".repeat(credential.len() - 8),
        &credential[credential.len() - 4..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_credentials() {
        // 19 chars: first 4 + 11 stars + last 4
        assert_eq!(mask("sk-abcdefghijklmnop"), "sk-a***********mnop");
    }

    #[test]
    fn masks_short_credentials_entirely() {
        assert_eq!(mask("secret"), "******");
        assert_eq!(mask(""), "[not-set]");
    }

    #[test]
    fn env_var_name_follows_convention() {
        assert_eq!(env_var_name("openai"), "OPENAI_API_KEY");
        assert_eq!(env_var_name("anthropic"), "ANTHROPIC_API_KEY");
    }

    #[test]
    fn explicit_key_wins() {
        assert_eq!(
            resolve_api_key(Some("sk-explicit"), "nonexistent-provider"),
            Some("sk-explicit".to_string())
        );
    }

    #[test]
    fn blank_explicit_key_is_ignored() {
        assert_eq!(resolve_api_key(Some("  "), "nonexistent-provider-xyz"), None);
    }
}
