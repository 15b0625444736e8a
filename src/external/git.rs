//! Git command abstractions
//!
//! Provides trait-based abstractions for the git operations the publisher
//! needs, enabling testable integrations through dependency injection.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use super::command::{CommandError, CommandExecutor, CommandOutput};

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Not a git repository (or any of the parent directories)")]
    NotARepository,
    #[error("`{command}` failed with exit code {status_code}: {stderr}")]
    CommandFailed {
        command: String,
        status_code: i32,
        stderr: String,
    },
    #[error("Command execution error: {source}")]
    Command {
        #[from]
        source: CommandError,
    },
    #[error("Unexpected git output for `{command}`: {output}")]
    UnexpectedOutput { command: String, output: String },
}

impl GitError {
    /// Exit status of the failing git process, if git ran at all
    pub fn status_code(&self) -> Option<i32> {
        match self {
            GitError::CommandFailed { status_code, .. } => Some(*status_code),
            GitError::NotARepository => Some(128),
            _ => None,
        }
    }
}

/// One line of `git status --porcelain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Index (staged) status column
    pub index: char,
    /// Work tree status column
    pub worktree: char,
    pub path: String,
    /// Source path of a rename or copy
    pub original_path: Option<String>,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.index == '?' && self.worktree == '?'
    }

    /// Final path component, used for matching protected files anywhere in the tree
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitStatus {
    pub entries: Vec<StatusEntry>,
}

impl GitStatus {
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn changed_paths(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    /// Parse porcelain v1 output. Blank lines are ignored, so output made only of
    /// whitespace counts as a clean tree.
    pub fn parse_porcelain(output: &str) -> Self {
        let entries = output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(parse_status_line)
            .collect();
        Self { entries }
    }
}

fn parse_status_line(line: &str) -> Option<StatusEntry> {
    let mut chars = line.chars();
    let index = chars.next()?;
    let worktree = chars.next()?;
    let rest = line.get(3..).unwrap_or("").trim_end();
    if rest.is_empty() {
        return None;
    }

    let (original_path, path) = match rest.split_once(" -> ") {
        Some((from, to)) if matches!(index, 'R' | 'C') => (Some(unquote(from)), unquote(to)),
        _ => (None, unquote(rest)),
    };

    Some(StatusEntry {
        index,
        worktree,
        path,
        original_path,
    })
}

/// Undo git's C-style path quoting, e.g. `"posts/\303\251.md"` → `posts/é.md`
fn unquote(path: &str) -> String {
    let Some(inner) = path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) else {
        return path.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut rest = inner.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        rest = tail;
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        let Some((&escape, tail)) = rest.split_first() else {
            bytes.push(byte);
            break;
        };
        rest = tail;
        match escape {
            b'a' => bytes.push(0x07),
            b'b' => bytes.push(0x08),
            b't' => bytes.push(b'\t'),
            b'n' => bytes.push(b'\n'),
            b'v' => bytes.push(0x0b),
            b'f' => bytes.push(0x0c),
            b'r' => bytes.push(b'\r'),
            b'0'..=b'3' if rest.len() >= 2 && rest[..2].iter().all(|b| (b'0'..=b'7').contains(b)) => {
                bytes.push(((escape - b'0') << 6) | ((rest[0] - b'0') << 3) | (rest[1] - b'0'));
                rest = &rest[2..];
            }
            other => bytes.push(other),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Where `git push` sends the new commit
///
/// With neither field set the branch's configured upstream is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushTarget {
    pub remote: Option<String>,
    pub branch: Option<String>,
}

impl PushTarget {
    pub fn args(&self) -> Vec<&str> {
        let mut args = vec!["push"];
        if let Some(remote) = &self.remote {
            args.push(remote);
            if let Some(branch) = &self.branch {
                args.push(branch);
            }
        }
        args
    }
}

impl fmt::Display for PushTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.remote, &self.branch) {
            (Some(remote), Some(branch)) => write!(f, "{remote}/{branch}"),
            (Some(remote), None) => write!(f, "{remote}"),
            _ => write!(f, "upstream"),
        }
    }
}

/// Trait for git repository operations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GitRepository: Send + Sync {
    /// `git --version`; fails when git is not installed
    async fn version(&self) -> Result<String, GitError>;

    /// Fail unless the working directory is inside a work tree
    async fn ensure_work_tree(&self) -> Result<(), GitError>;

    /// Absolute path of the `.git` directory
    async fn git_dir(&self) -> Result<PathBuf, GitError>;

    async fn status(&self) -> Result<GitStatus, GitError>;

    /// Stage every change, including deletions and untracked files
    async fn add_all(&self) -> Result<(), GitError>;

    async fn commit(&self, message: &str) -> Result<(), GitError>;

    /// Short hash of HEAD
    async fn head_commit(&self) -> Result<String, GitError>;

    async fn push(&self, target: &PushTarget) -> Result<(), GitError>;

    async fn is_tracked(&self, path: &str) -> Result<bool, GitError>;
}

/// Real git implementation over a command executor
pub struct GitClient {
    executor: Arc<dyn CommandExecutor>,
}

impl GitClient {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        Ok(self.executor.execute("git", args).await?)
    }

    /// Run git and return raw stdout; porcelain output must not be trimmed
    async fn execute_git_command(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(args).await?;

        if !output.success() {
            return Err(classify_git_error(&output, args));
        }

        Ok(output.stdout)
    }
}

fn classify_git_error(output: &CommandOutput, args: &[&str]) -> GitError {
    if output.stderr.contains("not a git repository") {
        GitError::NotARepository
    } else {
        GitError::CommandFailed {
            command: format!("git {}", args.join(" ")),
            status_code: output.status_code,
            stderr: output.stderr.trim().to_string(),
        }
    }
}

#[async_trait]
impl GitRepository for GitClient {
    async fn version(&self) -> Result<String, GitError> {
        let out = self.execute_git_command(&["--version"]).await?;
        Ok(out.trim().to_string())
    }

    async fn ensure_work_tree(&self) -> Result<(), GitError> {
        let args = ["rev-parse", "--is-inside-work-tree"];
        let out = self.execute_git_command(&args).await?;
        match out.trim() {
            "true" => Ok(()),
            // inside .git or a bare repository
            "false" => Err(GitError::NotARepository),
            other => Err(GitError::UnexpectedOutput {
                command: format!("git {}", args.join(" ")),
                output: other.to_string(),
            }),
        }
    }

    async fn git_dir(&self) -> Result<PathBuf, GitError> {
        let out = self
            .execute_git_command(&["rev-parse", "--absolute-git-dir"])
            .await?;
        Ok(PathBuf::from(out.trim()))
    }

    async fn status(&self) -> Result<GitStatus, GitError> {
        let out = self.execute_git_command(&["status", "--porcelain", "--untracked-files=all"]).await?;
        Ok(GitStatus::parse_porcelain(&out))
    }

    async fn add_all(&self) -> Result<(), GitError> {
        self.execute_git_command(&["add", "-A"]).await?;
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<(), GitError> {
        self.execute_git_command(&["commit", "-m", message]).await?;
        Ok(())
    }

    async fn head_commit(&self) -> Result<String, GitError> {
        let out = self
            .execute_git_command(&["rev-parse", "--short", "HEAD"])
            .await?;
        Ok(out.trim().to_string())
    }

    async fn push(&self, target: &PushTarget) -> Result<(), GitError> {
        self.execute_git_command(&target.args()).await?;
        Ok(())
    }

    async fn is_tracked(&self, path: &str) -> Result<bool, GitError> {
        let output = self.run(&["ls-files", "--error-unmatch", "--", path]).await?;

        if output.success() {
            return Ok(true);
        }
        // ls-files exits 1 for an untracked pathspec; anything else is a real failure
        match output.status_code {
            1 => Ok(false),
            _ => Err(classify_git_error(&output, &["ls-files", "--error-unmatch", "--", path])),
        }
    }
}
