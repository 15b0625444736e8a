/// Shared fixtures for integration tests that drive the real binary
pub mod test_harness;

use assert_cmd::Command;
use test_harness::PublishHarness;

/// The autopublish binary pointed at the harness repository and config
pub fn autopublish(harness: &PublishHarness) -> Command {
    let mut cmd = Command::cargo_bin("autopublish").unwrap();
    cmd.arg("-C")
        .arg(harness.path())
        .arg("--config")
        .arg(harness.config_path())
        .env_remove("RUST_LOG");
    cmd
}
