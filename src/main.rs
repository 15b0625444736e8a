use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use autopublish::{
    create_publish_span, generate_correlation_id, init_telemetry, Cli, CommandExecutor,
    GeneratorRunner, GitClient, ProcessCommandExecutor, PublishConfig, PublishOptions,
    PublishReport, Publisher,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("autopublish: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let repo_dir = cli
        .repo_dir
        .canonicalize()
        .with_context(|| format!("Repository directory {} is not accessible", cli.repo_dir.display()))?;

    PublishConfig::load_env_file(&repo_dir)?;
    let config = PublishConfig::load(&repo_dir, cli.config.as_deref())?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    init_telemetry(&config.observability)?;

    let correlation_id = generate_correlation_id();
    let span = create_publish_span(&repo_dir, &correlation_id, cli.dry_run);

    let git_executor: Arc<dyn CommandExecutor> = Arc::new(ProcessCommandExecutor::in_dir(&repo_dir));
    let generator_executor: Arc<dyn CommandExecutor> = Arc::new(
        ProcessCommandExecutor::in_dir(&repo_dir)
            .with_envs(config.generator.env.clone())
            .with_timeout(config.generator.timeout_seconds.map(Duration::from_secs)),
    );

    let publisher = Publisher::new(
        Arc::new(GitClient::new(git_executor)),
        GeneratorRunner::new(generator_executor, &config.generator),
        PublishOptions::from_config(&config, cli.dry_run),
    );

    let result = tokio::runtime::Runtime::new()?.block_on(publisher.run().instrument(span));

    match &result {
        Ok(outcome) => tracing::info!(changed = outcome.changed_files().len(), "Run finished"),
        Err(e) => tracing::error!("{}", e),
    }

    let report = PublishReport::new(correlation_id, &result);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }

    Ok(ExitCode::from(report.exit_code))
}
