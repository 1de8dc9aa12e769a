// SPDX-License-Identifier: MIT

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Named commit-message conventions supported by the prompt compiler.
///
/// Parsing is strict: an unrecognized or empty style name is an error, never
/// a silent fallback to a default prompt. A fallback would hide caller bugs
/// where a misspelled style quietly produces the wrong message shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitStyle {
    Default,
    Conventional,
    Gitmoji,
}

impl CommitStyle {
    pub const ALL: &'static [CommitStyle] = &[
        CommitStyle::Default,
        CommitStyle::Conventional,
        CommitStyle::Gitmoji,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Conventional => "conventional",
            Self::Gitmoji => "gitmoji",
        }
    }

    /// Whether the reply schema for this style carries a `gitmoji` field.
    pub fn wants_gitmoji(&self) -> bool {
        matches!(self, Self::Gitmoji)
    }
}

impl fmt::Display for CommitStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "conventional" => Ok(Self::Conventional),
            // Both spellings show up in configs in the wild
            "gitmoji" | "gitmojis" => Ok(Self::Gitmoji),
            other => Err(Error::UnknownStyle(other.to_string())),
        }
    }
}
