// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(version)]
#[command(about = "AI-powered commit message generator", long_about = None)]
pub struct Cli {
    /// LLM provider (ollama, openai, anthropic)
    #[arg(short, long, env = "SCRIBE_PROVIDER")]
    pub provider: Option<String>,

    /// Model name
    #[arg(short, long, env = "SCRIBE_MODEL")]
    pub model: Option<String>,

    /// Commit message style (default, conventional, gitmoji)
    #[arg(short, long, env = "SCRIBE_STYLE")]
    pub style: Option<String>,

    /// Extra context for the model (ticket number, intent, ...)
    #[arg(short, long)]
    pub context: Option<String>,

    /// Auto-confirm and commit without prompting
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Print message only, don't commit
    #[arg(long)]
    pub dry_run: bool,

    /// Show the prompt sent to the model
    #[arg(long)]
    pub show_prompt: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Initialize config file
    Init,
    /// Show current configuration
    Config,
    /// Manage the prepare-commit-msg git hook
    Hook {
        #[command(subcommand)]
        action: HookAction,
    },
    /// Entry point invoked by the installed git hook
    #[command(name = "prepare-commit-msg", hide = true)]
    PrepareCommitMsg {
        commit_msg_file: PathBuf,
        commit_source: Option<String>,
        sha: Option<String>,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum HookAction {
    /// Install the hook into the current repository
    Install,
    /// Remove the hook from the current repository
    Uninstall,
}
