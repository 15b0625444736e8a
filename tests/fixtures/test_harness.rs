//! Test harness for publishing into throwaway repositories

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A working clone with a bare `origin` remote, both inside one temporary directory
pub struct PublishHarness {
    temp_dir: TempDir,
    work_dir: PathBuf,
    remote_dir: PathBuf,
    config_path: PathBuf,
}

impl PublishHarness {
    /// Create the remote, the clone and an initial commit pushed to `main`
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let work_dir = temp_dir.path().join("work");
        let remote_dir = temp_dir.path().join("remote.git");
        std::fs::create_dir_all(&work_dir)?;

        run_git(temp_dir.path(), &["init", "--bare", "remote.git"])?;
        run_git(&work_dir, &["init"])?;
        setup_git_config(&work_dir)?;

        std::fs::write(work_dir.join("README.md"), "# Blog\n")?;
        run_git(&work_dir, &["add", "."])?;
        run_git(&work_dir, &["commit", "-m", "Initial commit"])?;
        run_git(&work_dir, &["branch", "-M", "main"])?;
        run_git(&work_dir, &["remote", "add", "origin", &remote_dir.to_string_lossy()])?;
        run_git(&work_dir, &["push", "-u", "origin", "main"])?;

        let config_path = temp_dir.path().join("autopublish-test.toml");
        let harness = Self {
            temp_dir,
            work_dir,
            remote_dir,
            config_path,
        };
        harness.set_generator("true")?;
        Ok(harness)
    }

    /// Path of the working clone
    pub fn path(&self) -> &Path {
        &self.work_dir
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Use `sh -c <script>` as the generator
    pub fn set_generator(&self, script: &str) -> Result<()> {
        self.write_config(script, "")
    }

    /// Write the configuration file (kept outside the work tree) with extra TOML appended
    pub fn write_config(&self, script: &str, extra: &str) -> Result<()> {
        let config = format!(
            "[generator]\nprogram = \"sh\"\nargs = [\"-c\", {}]\n\n{}",
            toml_string(script),
            extra
        );
        std::fs::write(&self.config_path, config)?;
        Ok(())
    }

    /// Run git in the working clone and return trimmed stdout
    pub fn git(&self, args: &[&str]) -> Result<String> {
        run_git(&self.work_dir, args)
    }

    pub fn local_commit_count(&self) -> Result<u32> {
        Ok(self.git(&["rev-list", "--count", "HEAD"])?.parse()?)
    }

    pub fn remote_commit_count(&self) -> Result<u32> {
        let out = run_git(&self.remote_dir, &["rev-list", "--count", "main"])?;
        Ok(out.parse()?)
    }

    pub fn last_commit_message(&self) -> Result<String> {
        self.git(&["log", "-1", "--format=%s"])
    }

    /// Point `origin` somewhere that cannot be pushed to
    pub fn break_remote(&self) -> Result<()> {
        let missing = self.temp_dir.path().join("missing.git");
        self.git(&["remote", "set-url", "origin", &missing.to_string_lossy()])?;
        Ok(())
    }
}

fn toml_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Set up basic Git configuration for testing
fn setup_git_config(repo_path: &Path) -> Result<()> {
    run_git(repo_path, &["config", "user.name", "Test User"])?;
    run_git(repo_path, &["config", "user.email", "test@example.com"])?;
    run_git(repo_path, &["config", "commit.gpgsign", "false"])?;
    Ok(())
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git").args(args).current_dir(dir).output()?;

    if !output.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
