// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use tokio::process::Command;

use crate::error::{Error, Result};

/// Thin wrapper over the repository: discovery and state checks through
/// `gix`, diff/commit plumbing through the git binary.
pub struct GitService {
    work_dir: PathBuf,
    git_dir: PathBuf,
}

impl GitService {
    pub fn discover() -> Result<Self> {
        let repo = gix::discover(".").map_err(|_| Error::NotAGitRepo)?;

        let work_dir = repo
            .workdir()
            .ok_or_else(|| Error::Git("Bare repository not supported".into()))?
            .to_path_buf();
        let git_dir = repo.git_dir().to_path_buf();

        Ok(Self { work_dir, git_dir })
    }

    pub fn work_dir(&self) -> &PathBuf {
        &self.work_dir
    }

    /// The staged diff as UTF-8 text. Empty diff is an error; there is
    /// nothing to describe.
    pub async fn staged_diff(&self) -> Result<String> {
        let output = Command::new("git")
            .args(["diff", "--cached", "--no-color", "--no-ext-diff"])
            .current_dir(&self.work_dir)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Git(stderr.to_string()));
        }

        let diff = String::from_utf8_lossy(&output.stdout).to_string();
        if diff.trim().is_empty() {
            return Err(Error::NoStagedChanges);
        }

        Ok(diff)
    }

    /// Commit staged changes with the given message.
    pub async fn commit(&self, message: &str) -> Result<()> {
        let output = Command::new("git")
            .args(["commit", "-m", message])
            .current_dir(&self.work_dir)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Git(stderr.to_string()));
        }

        Ok(())
    }

    /// Path to a hook file under the repository's git directory. Resolved
    /// from the discovered git dir rather than `<work_dir>/.git`, which is a
    /// file (not a directory) in linked worktrees.
    pub fn hook_path(&self, hook_name: &str) -> PathBuf {
        self.git_dir.join("hooks").join(hook_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_path_follows_the_git_dir() {
        let service = GitService {
            work_dir: PathBuf::from("/repos/app"),
            git_dir: PathBuf::from("/repos/app/.git"),
        };

        assert_eq!(
            service.hook_path("prepare-commit-msg"),
            PathBuf::from("/repos/app/.git/hooks/prepare-commit-msg"),
        );
    }

    #[test]
    fn hook_path_in_a_linked_worktree_uses_the_real_git_dir() {
        // In a linked worktree `<work_dir>/.git` is a file pointing at the
        // main repository, so the hook must live under the resolved git dir.
        let service = GitService {
            work_dir: PathBuf::from("/repos/app-hotfix"),
            git_dir: PathBuf::from("/repos/app/.git/worktrees/app-hotfix"),
        };

        assert_eq!(
            service.hook_path("prepare-commit-msg"),
            PathBuf::from("/repos/app/.git/worktrees/app-hotfix/hooks/prepare-commit-msg"),
        );
    }
}
