// SPDX-License-Identifier: MIT

// miette's Diagnostic derive generates code that triggers this false positive
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("No staged changes found")]
    #[diagnostic(
        code(scribe::git::no_staged),
        help("Stage files with: git add <files>")
    )]
    NoStagedChanges,

    #[error("Not a git repository")]
    #[diagnostic(
        code(scribe::git::not_repo),
        help("Run this command inside a git repository")
    )]
    NotAGitRepo,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unknown commit style: '{0}'")]
    #[diagnostic(
        code(scribe::style::unknown),
        help("Supported styles: default, conventional, gitmoji")
    )]
    UnknownStyle(String),

    #[error("Unsupported provider: '{0}'")]
    #[diagnostic(
        code(scribe::provider::unsupported),
        help("Supported providers: ollama, openai, anthropic")
    )]
    UnsupportedProvider(String),

    #[error("Template error for style '{style}': {message}")]
    #[diagnostic(code(scribe::template::error))]
    Template { style: String, message: String },

    #[error("Provider '{provider}' error: {message}")]
    #[diagnostic(code(scribe::provider::error))]
    Provider { provider: String, message: String },

    #[error("Could not extract a commit message from the model reply")]
    #[diagnostic(
        code(scribe::extract::unusable),
        help("The model returned no parseable content; try again or switch models")
    )]
    Extraction,

    #[error("Failed to generate a commit message after {attempts} attempts")]
    #[diagnostic(
        code(scribe::generate::exhausted),
        help("The provider may be unavailable; check connectivity and credentials")
    )]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(scribe::config::error))]
    Config(String),

    #[error("Git error: {0}")]
    #[diagnostic(code(scribe::git::error))]
    Git(String),

    #[error("Hook error: {0}")]
    #[diagnostic(code(scribe::hook::error))]
    Hook(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Dialog error: {0}")]
    Dialog(String),
}

impl From<dialoguer::Error> for Error {
    fn from(e: dialoguer::Error) -> Self {
        Error::Dialog(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
