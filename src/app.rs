// SPDX-License-Identifier: MIT

use std::io::IsTerminal;
use std::path::Path;

use console::style;
use dialoguer::Confirm;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::{Cli, Commands, HookAction};
use crate::config::Config;
use crate::domain::GenerationRequest;
use crate::error::{Error, Result};
use crate::services::{
    generator::Generator,
    git::GitService,
    hook,
    template::TemplateCache,
};

pub struct App {
    cli: Cli,
    config: Config,
    cancel_token: CancellationToken,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        let config = Config::load(&cli)?;
        debug!(
            provider = %config.provider,
            style = %config.style,
            max_retries = config.max_retries,
            "config loaded"
        );
        let cancel_token = CancellationToken::new();
        Ok(Self {
            cli,
            config,
            cancel_token,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup Ctrl+C handler with CancellationToken
        let cancel = self.cancel_token.clone();
        tokio::spawn(async move {
            signal::ctrl_c().await.ok();
            cancel.cancel();
        });

        // Handle subcommands
        if let Some(ref cmd) = self.cli.command {
            return self.handle_command(cmd).await;
        }

        self.generate_commit().await
    }

    async fn generate_commit(&mut self) -> Result<()> {
        if self.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.print_status("Reading staged changes...");

        let git = GitService::discover()?;
        let diff = git.staged_diff().await?;

        self.print_info(&format!("{} bytes of staged diff", diff.len()));

        if self.cli.show_prompt {
            let commit_style = self.config.style.parse()?;
            let template = TemplateCache::global().get_or_compile(commit_style)?;
            let mut request = GenerationRequest::new(&diff, commit_style);
            if let Some(ref ctx) = self.cli.context {
                request = request.with_context(ctx);
            }
            let prompt = template.render_prompt(&request)?;
            eprintln!("{}", style("--- PROMPT ---").dim());
            eprintln!("{}", prompt);
            eprintln!("{}", style("--- END PROMPT ---").dim());
        }

        if self.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let generator = Generator::from_config(&self.config)?;

        self.print_status(&format!(
            "Contacting {} ({})...",
            generator.provider_name(),
            self.config.model.as_deref().unwrap_or("default model"),
        ));

        let message = generator
            .generate(
                &diff,
                &self.config.style,
                self.cli.context.as_deref(),
                self.cancel_token.clone(),
            )
            .await?;

        if self.cli.dry_run {
            println!("{}", message);
            return Ok(());
        }

        let is_interactive = std::io::stdout().is_terminal() && std::io::stdin().is_terminal();

        if !self.cli.yes {
            if !is_interactive {
                eprintln!("{}", style("warning:").yellow().bold());
                eprintln!("  Not a terminal. Use --yes to auto-confirm in scripts/hooks.");
                println!("{}", message);
                return Ok(());
            }

            eprintln!("\n{}", style("Generated commit message:").bold());
            eprintln!("{}", style(&message).green());
            eprintln!();

            let confirm = Confirm::new()
                .with_prompt("Create commit with this message?")
                .default(true)
                .interact()?;

            if !confirm {
                return Err(Error::Cancelled);
            }
        }

        git.commit(&message).await?;

        eprintln!("{} Committed!", style("✓").green().bold());

        Ok(())
    }

    async fn handle_command(&self, cmd: &Commands) -> Result<()> {
        match cmd {
            Commands::Init => {
                let path = Config::create_default()?;
                println!("Created config: {}", path.display());
                Ok(())
            }
            Commands::Config => {
                println!("Provider: {}", self.config.provider);
                println!(
                    "Model: {}",
                    self.config.model.as_deref().unwrap_or("(provider default)")
                );
                println!("Style: {}", self.config.style);
                println!("Ollama host: {}", self.config.ollama_host);
                println!("Timeout: {}s", self.config.timeout_secs);
                println!("Temperature: {}", self.config.temperature);
                println!("Max tokens: {}", self.config.max_tokens);
                println!("Max retries: {}", self.config.max_retries);
                if let Some(path) = Config::config_path() {
                    let status = if path.exists() { "found" } else { "not found" };
                    println!("Config file: {} ({})", path.display(), status);
                }
                Ok(())
            }
            Commands::Hook { action } => self.handle_hook(action),
            Commands::PrepareCommitMsg {
                commit_msg_file,
                commit_source,
                sha: _,
            } => {
                self.prepare_commit_msg(commit_msg_file, commit_source.as_deref())
                    .await
            }
        }
    }

    // ─── Hook Commands ───

    fn handle_hook(&self, action: &HookAction) -> Result<()> {
        let git = GitService::discover()?;
        let hook_path = git.hook_path(hook::HOOK_NAME);

        match action {
            HookAction::Install => {
                hook::install(&hook_path)?;
                eprintln!(
                    "{} Hook installed at {}",
                    style("✓").green().bold(),
                    hook_path.display()
                );
                Ok(())
            }
            HookAction::Uninstall => {
                hook::uninstall(&hook_path)?;
                eprintln!(
                    "{} Hook removed from {}",
                    style("✓").green().bold(),
                    hook_path.display()
                );
                Ok(())
            }
        }
    }

    /// Hook-mode entry point: git calls this with the path of the commit
    /// message file. Non-interactive by nature; writes the generated
    /// message above whatever git already put in the file.
    async fn prepare_commit_msg(&self, msg_file: &Path, source: Option<&str>) -> Result<()> {
        if hook::should_skip_source(source) {
            debug!(source = source.unwrap_or(""), "skipping commit source");
            return Ok(());
        }

        let git = GitService::discover()?;
        let diff = match git.staged_diff().await {
            Ok(diff) => diff,
            Err(Error::NoStagedChanges) => return Ok(()),
            Err(e) => return Err(e),
        };

        let generator = Generator::from_config(&self.config)?;
        let message = match generator
            .generate(
                &diff,
                &self.config.style,
                None,
                self.cancel_token.clone(),
            )
            .await
        {
            Ok(message) => message,
            Err(e) => {
                // Never block the commit itself; leave the file for the
                // user to edit by hand.
                warn!(error = %e, "hook generation failed");
                return Ok(());
            }
        };

        let existing = std::fs::read_to_string(msg_file).unwrap_or_default();
        let content = if existing.trim().is_empty() {
            format!("{}\n", message)
        } else {
            format!("{}\n\n{}", message, existing)
        };
        std::fs::write(msg_file, content)?;

        Ok(())
    }

    // ─── Output Helpers ───

    fn print_status(&self, msg: &str) {
        eprintln!("{} {}", style("→").cyan(), msg);
    }

    fn print_info(&self, msg: &str) {
        eprintln!("{} {}", style("info:").cyan(), msg);
    }
}
