// SPDX-License-Identifier: MIT

//! prepare-commit-msg hook installation.
//!
//! The hook body lives between marker comments so install is idempotent and
//! uninstall removes exactly our block, leaving any coexisting hook manager
//! content (lefthook, husky) untouched.

use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::info;

use crate::error::{Error, Result};

const HOOK_START_MARKER: &str = "# BEGIN SCRIBE HOOK";
const HOOK_END_MARKER: &str = "# END SCRIBE HOOK";

pub const HOOK_NAME: &str = "prepare-commit-msg";

fn hook_block(binary: &str) -> String {
    format!(
        r#"{HOOK_START_MARKER}
COMMIT_MSG_FILE="$1"
COMMIT_SOURCE="$2"

{binary} prepare-commit-msg "$COMMIT_MSG_FILE" "$COMMIT_SOURCE"
{HOOK_END_MARKER}
"#
    )
}

fn block_pattern() -> Regex {
    Regex::new(&format!(
        r"(?s){}.*?{}\n?",
        regex::escape(HOOK_START_MARKER),
        regex::escape(HOOK_END_MARKER)
    ))
    .expect("hook block regex")
}

/// Install (or refresh) our block in the hook file.
pub fn install(hook_path: &Path) -> Result<()> {
    let binary = std::env::current_exe()
        .map_err(|e| Error::Hook(format!("cannot locate own executable: {e}")))?;
    let binary = binary.to_string_lossy().to_string();

    if let Some(parent) = hook_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let block = hook_block(&binary);
    let content = if hook_path.exists() {
        let existing = fs::read_to_string(hook_path)?;
        // Replace any previous version of our block
        let stripped = block_pattern().replace_all(&existing, "").to_string();
        let stripped = stripped.trim_end();
        if stripped.is_empty() || stripped == "#!/bin/sh" {
            format!("#!/bin/sh\n\n{block}")
        } else {
            format!("{stripped}\n\n{block}")
        }
    } else {
        format!("#!/bin/sh\n\n{block}")
    };

    fs::write(hook_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(hook_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(hook_path, perms)?;
    }

    info!(path = %hook_path.display(), "hook installed");
    Ok(())
}

/// Remove our block; delete the file if nothing else remains.
pub fn uninstall(hook_path: &Path) -> Result<()> {
    if !hook_path.exists() {
        return Ok(());
    }

    let existing = fs::read_to_string(hook_path)?;
    let stripped = block_pattern().replace_all(&existing, "").to_string();

    let remainder = stripped.trim();
    if remainder.is_empty() || remainder == "#!/bin/sh" {
        fs::remove_file(hook_path)?;
    } else {
        fs::write(hook_path, stripped)?;
    }

    info!(path = %hook_path.display(), "hook uninstalled");
    Ok(())
}

/// Commit sources for which the hook must stay silent: git already has a
/// message (merge, squash, -m, amend template).
pub fn should_skip_source(commit_source: Option<&str>) -> bool {
    matches!(commit_source, Some("merge" | "squash" | "message" | "commit"))
}
