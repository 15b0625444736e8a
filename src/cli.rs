use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "autopublish")]
#[command(version)]
#[command(about = "Run the content generator and publish any changes with git")]
#[command(long_about = "Runs the configured generator in the repository, then stages, commits and pushes \
                       everything it changed. When the generator leaves the working tree untouched nothing \
                       is committed. Any failing step aborts the run with that step's exit status.")]
pub struct Cli {
    /// Additional configuration file layered over autopublish.toml
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Repository root to publish from
    #[arg(short = 'C', long = "repo", value_name = "DIR", default_value = ".")]
    pub repo_dir: PathBuf,

    /// Run the generator and report changes without committing or pushing
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}
