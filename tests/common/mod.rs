//! Common test utilities and helpers

#![allow(dead_code)]

use anyhow::{bail, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use stagegate::config::{CommandMap, Options};
use stagegate::report::{Reporter, SharedBuffer};
use stagegate::subprocess::SubprocessManager;
use stagegate::{RunFailure, RunSummary};

/// A throw-away git repository with one initial commit, plus a separate
/// directory for helper scripts so they never show up in `git status`
pub struct TestRepo {
    dir: TempDir,
    scripts: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let repo = Self {
            dir: TempDir::new()?,
            scripts: TempDir::new()?,
        };
        repo.git(&["init", "--quiet"])?;
        repo.git(&["config", "user.email", "test@example.com"])?;
        repo.git(&["config", "user.name", "Test User"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        repo.git(&["config", "core.autocrlf", "false"])?;
        repo.write("README.md", "# test\n")?;
        repo.git(&["add", "README.md"])?;
        repo.git(&["commit", "--quiet", "-m", "initial commit"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn git_dir(&self) -> PathBuf {
        self.path().join(".git")
    }

    /// Run git in the repository and return stdout
    pub fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn write(&self, path: &str, content: &str) -> Result<()> {
        let full = self.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, content)?;
        Ok(())
    }

    pub fn read(&self, path: &str) -> Result<String> {
        Ok(fs::read_to_string(self.path().join(path))?)
    }

    /// Write and stage a file
    pub fn stage(&self, path: &str, content: &str) -> Result<()> {
        self.write(path, content)?;
        self.git(&["add", "--", path])?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.git(&["commit", "--quiet", "-m", message])?;
        Ok(())
    }

    /// Content of `path` in the index
    pub fn staged_content(&self, path: &str) -> Result<String> {
        self.git(&["show", &format!(":{path}")])
    }

    pub fn stash_list(&self) -> Result<String> {
        self.git(&["stash", "list"])
    }

    /// Write a shell script outside the repository and return the command running it
    pub fn script(&self, name: &str, body: &str) -> Result<String> {
        let path = self.scripts.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
        Ok(format!("sh {}", path.display()))
    }

    /// A path inside the scripts directory, for scripts that leave evidence behind
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.scripts.path().join(name)
    }

    /// Options for a run in this repository with an inline configuration
    pub fn options(&self, config: CommandMap) -> Options {
        // git reports the resolved top level, so match it when the temp dir sits behind a symlink
        let cwd = self
            .path()
            .canonicalize()
            .unwrap_or_else(|_| self.path().to_path_buf());
        Options {
            cwd: Some(cwd),
            config: Some(config),
            ..Default::default()
        }
    }
}

/// Run with real processes, capturing everything the reporter prints
pub async fn run(options: &Options) -> (Result<RunSummary, RunFailure>, SharedBuffer) {
    let (reporter, buffer) = Reporter::buffered(false);
    let subprocess = SubprocessManager::production();
    let result = stagegate::run_all(options, &subprocess, &reporter).await;
    if let Err(failure) = &result {
        stagegate::orchestrator::report_failure(failure, &reporter);
    }
    (result, buffer)
}
