//! Generate-then-publish sequence
//!
//! The run is strictly linear: preflight, generator, status, then add, commit
//! and push when the working tree changed. The first failure aborts the run;
//! nothing already done is undone.

use chrono::Local;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::commit_message::{self, CommitMessageError};
use crate::config::PublishConfig;
use crate::external::command::CommandError;
use crate::external::generator::{GeneratorError, GeneratorRunner};
use crate::external::git::{GitError, GitRepository, GitStatus, PushTarget};
use crate::lock::{LockError, RunLock};

/// Git step that failed, for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    Preflight,
    ProtectedFiles,
    Status,
    Stage,
    Commit,
    Push,
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishStep::Preflight => "preflight",
            PublishStep::ProtectedFiles => "protected file check",
            PublishStep::Status => "status",
            PublishStep::Stage => "stage",
            PublishStep::Commit => "commit",
            PublishStep::Push => "push",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("git {step} failed: {source}")]
    Git {
        step: PublishStep,
        #[source]
        source: GitError,
    },
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("Cannot render commit message: {0}")]
    CommitMessage(#[from] CommitMessageError),
    #[error("Refusing to publish: protected file '{path}' is tracked by git; remove it from the index and add it to .gitignore")]
    ProtectedFileTracked { path: String },
    #[error("Refusing to publish: protected file(s) changed in the working tree: {}", paths.join(", "))]
    ProtectedFileChanged { paths: Vec<String> },
}

impl PublishError {
    fn git(step: PublishStep) -> impl FnOnce(GitError) -> PublishError {
        move |source| PublishError::Git { step, source }
    }

    /// Process exit code for this failure
    ///
    /// The failing command's own status is propagated when it fits in 1..=255;
    /// a missing program maps to 127 and everything else to 1.
    pub fn exit_code(&self) -> u8 {
        let code = match self {
            PublishError::Generator(e) => e.status_code(),
            PublishError::Git {
                source:
                    GitError::Command {
                        source: CommandError::CommandNotFound { .. },
                    },
                ..
            } => Some(127),
            PublishError::Git { source, .. } => source.status_code(),
            _ => None,
        };
        code.and_then(|c| u8::try_from(c).ok())
            .filter(|c| *c != 0)
            .unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// The generator left the working tree clean
    NoChanges,
    /// Changes were found but add/commit/push were skipped
    DryRun { changed_files: Vec<String> },
    Published {
        commit: String,
        message: String,
        changed_files: Vec<String>,
        pushed_to: String,
    },
}

impl PublishOutcome {
    pub fn changed_files(&self) -> &[String] {
        match self {
            PublishOutcome::NoChanges => &[],
            PublishOutcome::DryRun { changed_files } => changed_files,
            PublishOutcome::Published { changed_files, .. } => changed_files,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub push_target: PushTarget,
    pub commit_message_template: String,
    pub timestamp_format: String,
    pub protected_files: Vec<String>,
    pub dry_run: bool,
}

impl PublishOptions {
    pub fn from_config(config: &PublishConfig, dry_run: bool) -> Self {
        Self {
            push_target: PushTarget {
                remote: config.git.remote.clone(),
                branch: config.git.branch.clone(),
            },
            commit_message_template: config.git.commit_message_template.clone(),
            timestamp_format: config.git.timestamp_format.clone(),
            protected_files: config.safety.protected_files.clone(),
            dry_run,
        }
    }
}

pub struct Publisher {
    git: Arc<dyn GitRepository>,
    generator: GeneratorRunner,
    options: PublishOptions,
}

impl Publisher {
    pub fn new(git: Arc<dyn GitRepository>, generator: GeneratorRunner, options: PublishOptions) -> Self {
        Self {
            git,
            generator,
            options,
        }
    }

    pub async fn run(&self) -> Result<PublishOutcome, PublishError> {
        let version = self
            .git
            .version()
            .await
            .map_err(PublishError::git(PublishStep::Preflight))?;
        info!(git = %version, "git available");
        self.git
            .ensure_work_tree()
            .await
            .map_err(PublishError::git(PublishStep::Preflight))?;

        let git_dir = self
            .git
            .git_dir()
            .await
            .map_err(PublishError::git(PublishStep::Preflight))?;
        let mut lock = RunLock::open(&git_dir)?;
        let _guard = lock.try_acquire()?;

        self.check_protected_files_untracked().await?;

        self.generator.run().await?;

        let status = self
            .git
            .status()
            .await
            .map_err(PublishError::git(PublishStep::Status))?;
        if status.is_clean() {
            info!("No changes to publish");
            return Ok(PublishOutcome::NoChanges);
        }

        let changed_files = status.changed_paths();
        info!(count = changed_files.len(), "Working tree has changes");
        self.check_protected_files_unchanged(&status)?;

        if self.options.dry_run {
            for path in &changed_files {
                info!(path = %path, "would publish");
            }
            return Ok(PublishOutcome::DryRun { changed_files });
        }

        let message = commit_message::render(
            &self.options.commit_message_template,
            &self.options.timestamp_format,
            &Local::now(),
            changed_files.len(),
        )?;

        self.git
            .add_all()
            .await
            .map_err(PublishError::git(PublishStep::Stage))?;

        self.git
            .commit(&message)
            .await
            .map_err(PublishError::git(PublishStep::Commit))?;

        let commit = self.git.head_commit().await.unwrap_or_else(|e| {
            warn!("Could not read new commit hash: {}", e);
            String::new()
        });
        info!(commit = %commit, message = %message, "Committed changes");

        let target = &self.options.push_target;
        info!(destination = %target, "Pushing");
        if let Err(e) = self.git.push(target).await {
            error!(commit = %commit, "Push failed; the commit is kept locally");
            return Err(PublishError::Git {
                step: PublishStep::Push,
                source: e,
            });
        }
        info!("Publish done");

        Ok(PublishOutcome::Published {
            commit,
            message,
            changed_files,
            pushed_to: target.to_string(),
        })
    }

    async fn check_protected_files_untracked(&self) -> Result<(), PublishError> {
        for path in &self.options.protected_files {
            let tracked = self
                .git
                .is_tracked(path)
                .await
                .map_err(PublishError::git(PublishStep::ProtectedFiles))?;
            if tracked {
                return Err(PublishError::ProtectedFileTracked { path: path.clone() });
            }
        }
        Ok(())
    }

    fn check_protected_files_unchanged(&self, status: &GitStatus) -> Result<(), PublishError> {
        let paths: Vec<String> = status
            .entries
            .iter()
            .filter(|entry| {
                self.options.protected_files.iter().any(|protected| {
                    if protected.contains('/') {
                        entry.path == *protected
                    } else {
                        entry.file_name() == protected
                    }
                })
            })
            .map(|entry| entry.path.clone())
            .collect();

        if paths.is_empty() {
            Ok(())
        } else {
            Err(PublishError::ProtectedFileChanged { paths })
        }
    }
}

/// Final summary of one run, printed by the CLI
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub ok: bool,
    pub correlation_id: String,
    #[serde(flatten)]
    pub outcome: Option<PublishOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub exit_code: u8,
}

impl PublishReport {
    pub fn new(correlation_id: impl Into<String>, result: &Result<PublishOutcome, PublishError>) -> Self {
        let correlation_id = correlation_id.into();
        match result {
            Ok(outcome) => Self {
                ok: true,
                correlation_id,
                outcome: Some(outcome.clone()),
                error: None,
                exit_code: 0,
            },
            Err(e) => Self {
                ok: false,
                correlation_id,
                outcome: None,
                error: Some(e.to_string()),
                exit_code: e.exit_code(),
            },
        }
    }

    pub fn summary(&self) -> String {
        match (&self.outcome, &self.error) {
            (Some(PublishOutcome::NoChanges), _) => "No changes to publish.".to_string(),
            (Some(PublishOutcome::DryRun { changed_files }), _) => {
                let mut text = format!("Dry run: {} changed file(s) would be published:", changed_files.len());
                for path in changed_files {
                    text.push_str("\n  ");
                    text.push_str(path);
                }
                text
            }
            (
                Some(PublishOutcome::Published {
                    commit,
                    message,
                    changed_files,
                    pushed_to,
                }),
                _,
            ) => format!(
                "Published {} changed file(s) as {} \"{}\" to {}.",
                changed_files.len(),
                if commit.is_empty() { "commit" } else { commit.as_str() },
                message,
                pushed_to
            ),
            (None, Some(error)) => format!("Publish failed: {error}"),
            (None, None) => "Publish failed.".to_string(),
        }
    }
}
