//! External tool abstractions
//!
//! This module provides trait-based abstractions for the external programs the
//! publisher drives (the content generator and git), enabling testable code
//! through dependency injection and mock implementations.

pub mod command;
pub mod generator;
pub mod git;
#[cfg(test)]
pub mod mocks;

pub use command::{CommandError, CommandExecutor, CommandOutput, ProcessCommandExecutor};
pub use generator::{GeneratorError, GeneratorRunner};
pub use git::{GitClient, GitError, GitRepository, GitStatus, PushTarget, StatusEntry};
