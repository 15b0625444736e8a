// Scripted command executor for tests - no side effects

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::command::{CommandError, CommandExecutor, CommandOutput};

/// Executor that replays scripted responses and records every invocation
///
/// Commands are keyed by `"program arg1 arg2"`. Unscripted commands succeed
/// with empty output, so tests only need to script the calls they care about.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: Mutex<HashMap<String, VecDeque<Result<CommandOutput, CommandError>>>>,
    calls: Mutex<Vec<String>>,
}

fn command_key(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response; repeated calls to the same command consume responses in order,
    /// and the last one keeps being replayed.
    pub fn respond(
        self,
        program: &str,
        args: &[&str],
        response: Result<CommandOutput, CommandError>,
    ) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(command_key(program, args))
            .or_default()
            .push_back(response);
        self
    }

    pub fn succeed_with(self, program: &str, args: &[&str], stdout: &str) -> Self {
        self.respond(
            program,
            args,
            Ok(CommandOutput {
                status_code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            }),
        )
    }

    pub fn fail_with(self, program: &str, args: &[&str], status_code: i32, stderr: &str) -> Self {
        self.respond(
            program,
            args,
            Ok(CommandOutput {
                status_code,
                stdout: String::new(),
                stderr: stderr.to_string(),
            }),
        )
    }

    /// Every command executed so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ran(&self, program: &str, args: &[&str]) -> bool {
        let key = command_key(program, args);
        self.calls.lock().unwrap().iter().any(|c| *c == key)
    }

    /// Whether any recorded command starts with the given prefix, e.g. `"git commit"`
    pub fn ran_prefix(&self, prefix: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c.starts_with(prefix))
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let key = command_key(program, args);
        self.calls.lock().unwrap().push(key.clone());

        let mut responses = self.responses.lock().unwrap();
        if let Some(queue) = responses.get_mut(&key) {
            if queue.len() > 1 {
                if let Some(response) = queue.pop_front() {
                    return response;
                }
            }
            if let Some(response) = queue.front() {
                return response.clone();
            }
        }
        Ok(empty_success())
    }
}

fn empty_success() -> CommandOutput {
    CommandOutput {
        status_code: 0,
        stdout: String::new(),
        stderr: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_executor_replays_in_order() {
        let mock = ScriptedExecutor::new()
            .succeed_with("git", &["status", "--porcelain"], "?? a.txt\n")
            .succeed_with("git", &["status", "--porcelain"], "");

        let first = mock.execute("git", &["status", "--porcelain"]).await.unwrap();
        let second = mock.execute("git", &["status", "--porcelain"]).await.unwrap();
        let third = mock.execute("git", &["status", "--porcelain"]).await.unwrap();

        assert_eq!(first.stdout, "?? a.txt\n");
        assert_eq!(second.stdout, "");
        assert_eq!(third.stdout, "");
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unscripted_commands_succeed() {
        let mock = ScriptedExecutor::new();
        let output = mock.execute("git", &["add", "-A"]).await.unwrap();

        assert!(output.success());
        assert!(mock.ran("git", &["add", "-A"]));
        assert!(mock.ran_prefix("git add"));
    }
}
