// SPDX-License-Identifier: MIT

//! Normalizes raw provider replies into a commit-message string.
//!
//! Models reply with anything from clean JSON to fenced JSON to truncated
//! fragments to plain chatter. Strategies are tried in order of strictness:
//! direct JSON, fenced JSON, repaired truncated JSON, then a free-text scan.
//! An empty result is a hard error; callers never receive a zero-length
//! message.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::domain::CommitMessage;
use crate::error::{Error, Result};

/// JSON prefix some backends are primed with as a partial assistant turn.
pub const PARTIAL_COMPLETION_PREFIX: &str = "{\n  \"type\": \"";

static CONVENTIONAL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(feat|fix|docs|style|refactor|test|chore|build|ci|perf|revert)(\([^)]*\))?!?: .+",
    )
    .expect("conventional line regex")
});

// Same shape with a short leading token, as produced by the gitmoji style.
static GITMOJI_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\S{1,8} (feat|fix|docs|style|refactor|test|chore|build|ci|perf|revert)(\([^)]*\))?!?: .+",
    )
    .expect("gitmoji line regex")
});

/// Extract a commit message from a raw reply, or fail with a shape error.
pub fn extract(raw: &str) -> Result<String> {
    extract_inner(raw)
        .filter(|msg| !msg.trim().is_empty())
        .ok_or(Error::Extraction)
}

/// Extraction variant for replies that continue a known priming prefix.
///
/// The prefix is prepended first; if the model ignored the priming and
/// restated a full object, plain extraction still applies.
pub fn extract_with_prefix(prefix: &str, raw: &str) -> Result<String> {
    if !raw.trim_start().starts_with('{') {
        let combined = format!("{prefix}{raw}");
        if let Some(msg) = extract_inner(&combined) {
            return Ok(msg);
        }
    }
    extract(raw)
}

fn extract_inner(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Strategy 1: well-formed JSON
    if let Some(msg) = parse_structured(trimmed) {
        return Some(msg);
    }

    // Strategy 2: markdown-fenced JSON, possibly itself truncated
    if let Some(inner) = strip_code_fence(trimmed) {
        if let Some(msg) = parse_structured(inner) {
            return Some(msg);
        }
        if let Some(repaired) = repair_truncated_json(inner) {
            if let Some(msg) = parse_structured(&repaired) {
                return Some(msg);
            }
        }
    }

    // Strategy 3: truncated JSON
    if let Some(repaired) = repair_truncated_json(trimmed) {
        if let Some(msg) = parse_structured(&repaired) {
            return Some(msg);
        }
    }

    // Strategy 4: free-text fallback
    free_text_fallback(trimmed)
}

/// Parse a JSON object into the structured commit shape, tolerating the
/// legacy `{"commit_message": "..."}` form.
fn parse_structured(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;

    if let Some(msg) = CommitMessage::from_json(&value) {
        return Some(msg.render());
    }

    let legacy = value.get("commit_message")?.as_str()?.trim();
    (!legacy.is_empty()).then(|| legacy.to_string())
}

/// Strip a triple-backtick fence, optionally tagged `json`.
fn strip_code_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_ticks = &text[start + 3..];
    // Skip a language tag on the fence line
    let body_start = after_ticks.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_ticks[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Best-effort repair of a truncated JSON object.
///
/// Heuristics, applied in order: close an unterminated string literal, drop
/// a dangling incomplete field (a key with no value), strip a trailing
/// comma, then append the missing closing braces. Pure string-in/string-out
/// so it can be property-tested without any network code.
///
/// Returns `None` when the input does not look like truncated JSON.
pub fn repair_truncated_json(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return None;
    }

    let opens = trimmed.matches('{').count();
    let closes = trimmed.matches('}').count();
    if opens <= closes {
        return None;
    }

    let mut fixed = trimmed.trim_end().to_string();

    if count_unescaped_quotes(&fixed) % 2 == 1 {
        fixed.push('"');
    }

    while fixed.ends_with(',') || fixed.ends_with(char::is_whitespace) {
        fixed.pop();
    }

    if fixed.ends_with(':') {
        // Value never arrived; drop the whole field
        drop_trailing_field(&mut fixed);
    } else if fixed.ends_with('"') && trailing_string_is_bare_key(&fixed) {
        drop_trailing_field(&mut fixed);
    }

    while fixed.ends_with(',') || fixed.ends_with(char::is_whitespace) {
        fixed.pop();
    }

    let missing = fixed.matches('{').count().saturating_sub(fixed.matches('}').count());
    for _ in 0..missing {
        fixed.push('}');
    }

    Some(fixed)
}

fn count_unescaped_quotes(s: &str) -> usize {
    let mut count = 0;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => count += 1,
            _ => {}
        }
    }
    count
}

/// True when the string literal at the very end of `s` sits in key position
/// (preceded by `,` or `{`) with no `:` after it.
fn trailing_string_is_bare_key(s: &str) -> bool {
    let quote_positions: Vec<usize> = {
        let mut positions = Vec::new();
        let mut escaped = false;
        for (i, c) in s.char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '"' => positions.push(i),
                _ => {}
            }
        }
        positions
    };

    let Some(&open) = quote_positions.len().checked_sub(2).map(|i| &quote_positions[i]) else {
        return false;
    };

    let before = s[..open].trim_end();
    before.ends_with(',') || before.ends_with('{')
}

/// Cut back to the previous comma (or an opening brace) to remove an
/// incomplete trailing field.
fn drop_trailing_field(fixed: &mut String) {
    if let Some(cut) = fixed.rfind(',') {
        fixed.truncate(cut);
    } else if let Some(cut) = fixed.rfind('{') {
        fixed.truncate(cut + 1);
    }
}

/// Scan chatter for a line shaped like a commit message.
fn free_text_fallback(text: &str) -> Option<String> {
    // Already-normalized input stays intact, body and all
    if let Some(first_line) = text.lines().next() {
        let first_line = first_line.trim();
        if CONVENTIONAL_LINE.is_match(first_line) || GITMOJI_LINE.is_match(first_line) {
            return Some(text.trim().to_string());
        }
    }

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || looks_like_json_noise(line) {
            continue;
        }
        if CONVENTIONAL_LINE.is_match(line) || GITMOJI_LINE.is_match(line) {
            return Some(line.to_string());
        }
    }

    // Last resort: first plausible non-JSON-looking line
    text.lines()
        .map(str::trim)
        .find(|line| {
            line.len() > 5
                && !looks_like_json_noise(line)
                && !line.contains('{')
                && !line.contains('}')
        })
        .map(str::to_string)
}

fn looks_like_json_noise(line: &str) -> bool {
    line.starts_with('{')
        || line.starts_with('}')
        || line.starts_with("```")
        || line.starts_with('"')
        || line.contains("commit_message")
}
