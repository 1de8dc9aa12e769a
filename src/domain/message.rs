// SPDX-License-Identifier: MIT

use serde_json::Value;

/// A commit message normalized out of a provider reply.
///
/// Immutable once produced; `render` is the single serialization point so
/// every provider and extraction strategy formats identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    pub gitmoji: Option<String>,
    pub commit_type: String,
    pub scope: Option<String>,
    pub subject: String,
    pub body: Option<String>,
    pub footer: Option<String>,
}

impl CommitMessage {
    /// Build from a decoded JSON object, tolerating the field-shape drift
    /// real models produce: `body` may arrive as a string or as an array of
    /// lines, optional fields may be present-but-empty.
    ///
    /// Returns `None` unless both `type` and `subject` carry usable text.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let commit_type = non_empty_str(obj.get("type"))?;
        let subject = non_empty_str(obj.get("subject"))?;

        Some(Self {
            gitmoji: non_empty_str(obj.get("gitmoji")),
            commit_type,
            scope: non_empty_str(obj.get("scope")),
            subject,
            body: body_text(obj.get("body")),
            footer: non_empty_str(obj.get("footer")),
        })
    }

    /// Serialize as `type(scope): subject\n\nbody\n\nfooter`, with the
    /// gitmoji prefixed when present.
    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(ref emoji) = self.gitmoji {
            out.push_str(emoji);
            out.push(' ');
        }

        out.push_str(&self.commit_type);
        if let Some(ref scope) = self.scope {
            out.push('(');
            out.push_str(scope);
            out.push(')');
        }
        out.push_str(": ");
        out.push_str(self.subject.trim());

        if let Some(ref body) = self.body {
            let body = body.trim();
            if !body.is_empty() {
                out.push_str("\n\n");
                out.push_str(body);
            }
        }

        if let Some(ref footer) = self.footer {
            let footer = footer.trim();
            if !footer.is_empty() {
                out.push_str("\n\n");
                out.push_str(footer);
            }
        }

        out
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// `body` tolerates both `"line"` and `["line", "line"]` shapes.
fn body_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Array(lines) => {
            let joined = lines
                .iter()
                .filter_map(|l| l.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let joined = joined.trim().to_string();
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}
