// autopublish - run a content generator and publish its changes with git
// This exposes the core components for testing and integration

pub mod cli;
pub mod commit_message;
pub mod config;
pub mod external;
pub mod lock;
pub mod publish;
pub mod telemetry;

// Re-export key types for easy access
pub use cli::Cli;
pub use config::{ConfigError, PublishConfig};
pub use external::{
    CommandExecutor, GeneratorRunner, GitClient, GitRepository, ProcessCommandExecutor, PushTarget,
};
pub use lock::{LockError, RunLock};
pub use publish::{PublishError, PublishOptions, PublishOutcome, PublishReport, Publisher};
pub use telemetry::{create_publish_span, generate_correlation_id, init_telemetry};
