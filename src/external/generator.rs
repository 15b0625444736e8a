//! Content generator invocation

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::command::{CommandError, CommandExecutor};
use crate::config::GeneratorConfig;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Generator `{program}` not found on PATH")]
    NotFound { program: String },
    #[error("Generator `{command}` exited with status {status_code}: {stderr}")]
    Failed {
        command: String,
        status_code: i32,
        stderr: String,
    },
    #[error("Generator `{command}` could not run: {source}")]
    Command {
        command: String,
        #[source]
        source: CommandError,
    },
}

impl GeneratorError {
    pub fn status_code(&self) -> Option<i32> {
        match self {
            GeneratorError::Failed { status_code, .. } => Some(*status_code),
            GeneratorError::NotFound { .. } => Some(127),
            GeneratorError::Command { .. } => None,
        }
    }
}

/// Runs the configured generator program in the repository root
pub struct GeneratorRunner {
    executor: Arc<dyn CommandExecutor>,
    program: String,
    args: Vec<String>,
}

impl GeneratorRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: &GeneratorConfig) -> Self {
        Self {
            executor,
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub async fn run(&self) -> Result<(), GeneratorError> {
        let command = self.command_line();
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();

        info!(command = %command, "Running generator");
        let output = self
            .executor
            .execute(&self.program, &args)
            .await
            .map_err(|source| match source {
                CommandError::CommandNotFound { .. } => GeneratorError::NotFound {
                    program: self.program.clone(),
                },
                source => GeneratorError::Command {
                    command: command.clone(),
                    source,
                },
            })?;

        for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
            info!(target: "autopublish::generator", "{line}");
        }
        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            warn!(target: "autopublish::generator", "{line}");
        }

        if !output.success() {
            return Err(GeneratorError::Failed {
                command,
                status_code: output.status_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        info!("Generator finished");
        Ok(())
    }
}
