// SPDX-License-Identifier: MIT

//! Style-driven prompt compilation.
//!
//! Each [`CommitStyle`] maps to a fixed prompt skeleton plus a JSON schema
//! describing the reply shape the model is asked for. Skeletons are rendered
//! with `tera`, but the engine is deliberately stripped down: no custom
//! functions, no filesystem templates, and the environment-reading builtin
//! is disabled. Diff content is attacker-influenceable, so it is sanitized
//! before it ever reaches the renderer.

pub mod cache;

use std::collections::HashMap;

use serde_json::{Value, json};
use tera::Tera;

use crate::domain::{CommitStyle, GenerationRequest};
use crate::error::{Error, Result};

pub use cache::TemplateCache;

/// Upper bound on diff bytes fed into a prompt. Bounds both memory and
/// token cost; anything past it is summarizing noise anyway.
pub const MAX_DIFF_BYTES: usize = 50_000;

const TRUNCATION_MARKER: &str = "\n... [diff truncated]";

const DEFAULT_SKELETON: &str = r#"Generate a commit message for the following git diff:

{{ diff }}

{% if context %}Additional context:
{{ context }}

{% endif %}The commit message should follow this format:
<type>(<scope>): <subject>

<body>

<footer>
Where:
- <type> is one of: feat, fix, docs, style, refactor, test, chore
- <scope> is optional and represents the module affected
- <subject> is a short description in the present tense
- <body> provides additional context (optional)
- <footer> mentions any breaking changes or closed issues (optional)

Reply with a single JSON object matching this schema:
{{ schema }}
"#;

const CONVENTIONAL_SKELETON: &str = r#"Generate a conventional commit message for the following git diff:

{{ diff }}

{% if context %}Additional context:
{{ context }}

{% endif %}The commit message should follow this format:
<type>[optional scope]: <description>

[optional body]

[optional footer(s)]
Where:
- <type> is one of: feat, fix, docs, style, refactor, test, chore, build, ci, perf, revert
- <scope> is optional and represents the module affected
- <description> is a short summary in the present tense
- <body> provides additional context (optional)
- <footer> mentions any breaking changes or closed issues (optional)

Reply with a single JSON object matching this schema:
{{ schema }}
"#;

const GITMOJI_SKELETON: &str = r#"Generate a gitmoji commit message for the following git diff:

{{ diff }}

{% if context %}Additional context:
{{ context }}

{% endif %}The commit message should follow this format:
<gitmoji> <type>[optional scope]: <subject>

<body>

<footer>
Where:
- <gitmoji> is an appropriate emoji for the change (e.g. a bug emoji for fixes, sparkles for new features)
- <type> is one of: feat, fix, docs, style, refactor, test, chore, build, ci, perf, revert
- <scope> is optional and represents the module affected
- <subject> is a short description in the present tense
- <body> provides additional context (optional)
- <footer> mentions any breaking changes or closed issues (optional)

Reply with a single JSON object matching this schema, choosing an appropriate gitmoji:
{{ schema }}
"#;

/// A compiled (prompt template, reply schema) pair for one style.
///
/// Created once per style and cached for the process lifetime; never mutated
/// after creation. A cache miss produces a replacement, not an edit.
pub struct CompiledTemplate {
    style: CommitStyle,
    engine: Tera,
    schema: Value,
    schema_text: String,
}

impl CompiledTemplate {
    pub fn style(&self) -> CommitStyle {
        self.style
    }

    /// The JSON schema the reply is asked to conform to.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn schema_text(&self) -> &str {
        &self.schema_text
    }

    /// Render the ready-to-send prompt for one request. The diff is
    /// sanitized and size-capped here, on every render, so correctness does
    /// not depend on what callers hand in.
    pub fn render_prompt(&self, request: &GenerationRequest) -> Result<String> {
        let mut ctx = tera::Context::new();
        ctx.insert("diff", &sanitize_diff(&request.diff));
        ctx.insert("context", &request.context.as_deref().map(sanitize_diff));
        ctx.insert("schema", &self.schema_text);

        self.engine
            .render(self.style.as_str(), &ctx)
            .map_err(|e| Error::Template {
                style: self.style.to_string(),
                message: e.to_string(),
            })
    }
}

/// Compile the prompt skeleton and reply schema for a style.
///
/// Fails fast on engine errors; there is no fallback style.
pub fn compile(style: CommitStyle) -> Result<CompiledTemplate> {
    let skeleton = match style {
        CommitStyle::Default => DEFAULT_SKELETON,
        CommitStyle::Conventional => CONVENTIONAL_SKELETON,
        CommitStyle::Gitmoji => GITMOJI_SKELETON,
    };

    let mut engine = Tera::default();
    engine.autoescape_on(vec![]);
    // Diff text is attacker-influenceable; the renderer must not be able to
    // read the environment even if a delimiter slips through sanitization.
    engine.register_function("get_env", |_: &HashMap<String, Value>| {
        Err(tera::Error::msg("get_env is disabled"))
    });
    engine
        .add_raw_template(style.as_str(), skeleton)
        .map_err(|e| Error::Template {
            style: style.to_string(),
            message: e.to_string(),
        })?;

    let schema = reply_schema(style);
    let schema_text = serde_json::to_string_pretty(&schema).map_err(|e| Error::Template {
        style: style.to_string(),
        message: format!("failed to serialize schema: {e}"),
    })?;

    Ok(CompiledTemplate {
        style,
        engine,
        schema,
        schema_text,
    })
}

/// JSON schema for the structured reply of a style. Gitmoji adds a required
/// `gitmoji` field whose description steers the model's emoji choice.
pub fn reply_schema(style: CommitStyle) -> Value {
    let mut properties = json!({
        "type": {
            "type": "string",
            "description": "The type of change (e.g. feat, fix, docs, style, refactor, test, chore)"
        },
        "scope": {
            "type": "string",
            "description": "The scope of the change (optional)"
        },
        "subject": {
            "type": "string",
            "description": "A short description of the change"
        },
        "body": {
            "type": "string",
            "description": "A more detailed description of the change (optional)"
        },
        "footer": {
            "type": "string",
            "description": "Breaking changes or closed issues (optional)"
        }
    });

    let mut required = vec!["type", "subject"];
    if style.wants_gitmoji() {
        properties["gitmoji"] = json!({
            "type": "string",
            "description": "A single emoji that best represents the change, e.g. a bug for fixes or sparkles for features"
        });
        required.insert(0, "gitmoji");
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

/// Neutralize template delimiters and cap the size of untrusted input
/// before it is handed to the renderer.
///
/// Delimiter pairs are broken with a space, which keeps the surrounding
/// text readable while making the sequence inert to any template engine.
/// The pass is character-wise so runs like `{{{` cannot recombine into a
/// live delimiter, and a second pass is a no-op.
pub fn sanitize_diff(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev = '\0';
    for c in input.chars() {
        let pair = matches!(
            (prev, c),
            ('{', '{') | ('{', '%') | ('{', '#') | ('}', '}') | ('%', '}')
        );
        if pair {
            out.push(' ');
        }
        out.push(c);
        prev = c;
    }

    if out.len() > MAX_DIFF_BYTES {
        let mut end = MAX_DIFF_BYTES;
        while !out.is_char_boundary(end) {
            end -= 1;
        }
        out.truncate(end);
        out.push_str(TRUNCATION_MARKER);
    }

    out
}
