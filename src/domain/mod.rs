// SPDX-License-Identifier: MIT

pub mod message;
pub mod style;

pub use message::CommitMessage;
pub use style::CommitStyle;

/// Everything a provider needs for one generation round trip.
/// Constructed once per call; read-only downstream.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub diff: String,
    pub style: CommitStyle,
    pub context: Option<String>,
}

impl GenerationRequest {
    pub fn new(diff: impl Into<String>, style: CommitStyle) -> Self {
        Self {
            diff: diff.into(),
            style,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}
