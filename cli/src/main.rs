use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};
use cli::{commands, CliError, FileSettings};
use reporter::config::{
    ENV_API_KEY, ENV_ENVIRONMENT, ENV_GROUP_TITLE, ENV_PROCEED, ENV_RUN, ENV_SHARED_RUN,
    ENV_TITLE, ENV_URL,
};
use reporter::{ReporterConfig, RunStatus};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "testomat")]
#[command(about = "Report test results to Testomat.io")]
struct Cli {
    /// TOML settings file; environment variables and flags take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Base URL of the Testomat.io instance
    #[arg(long, global = true, env = ENV_URL)]
    url: Option<String>,
    /// Project API key
    #[arg(long, global = true, env = ENV_API_KEY, hide_env_values = true)]
    api_key: Option<String>,
    /// Run title
    #[arg(long, global = true, env = ENV_TITLE)]
    title: Option<String>,
    /// Title of the run group
    #[arg(long, global = true, env = ENV_GROUP_TITLE)]
    group_title: Option<String>,
    /// Environment label attached to the run
    #[arg(long = "env", global = true, env = ENV_ENVIRONMENT)]
    environment: Option<String>,
    /// Existing run to report into
    #[arg(long, global = true, env = ENV_RUN)]
    run: Option<String>,
    /// Run is shared between parallel processes
    #[arg(long, global = true, env = ENV_SHARED_RUN, value_parser = FalseyValueParser::new())]
    shared_run: bool,
    /// Keep the run open after reporting
    #[arg(long, global = true, env = ENV_PROCEED, value_parser = FalseyValueParser::new())]
    proceed: bool,
    /// Disable ANSI colors in reported failures
    #[arg(long, global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a run and print its id for later processes
    Start,
    /// Finish an existing run
    Finish {
        /// Final status: passed, failed or finished
        #[arg(short, long, default_value = "finished")]
        status: RunStatus,
        /// Finish only this process's share of a parallel run
        #[arg(long)]
        parallel: bool,
    },
    /// Report JSON result files and finish the run
    Report {
        /// Glob patterns of result files
        #[arg(required = true)]
        patterns: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    match cli.command {
        Commands::Start => {
            println!("{}", commands::start(config).await?);
        }
        Commands::Finish { status, parallel } => {
            commands::finish(config, status, parallel).await?;
        }
        Commands::Report { patterns } => {
            commands::report(config, &patterns).await?;
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<ReporterConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => FileSettings::load(path)?.apply(ReporterConfig::new()),
        None => ReporterConfig::new(),
    };

    if let Some(url) = non_blank(&cli.url) {
        config = config.with_base_url(url);
    }
    if let Some(api_key) = non_blank(&cli.api_key) {
        config = config.with_api_key(api_key);
    }
    if let Some(title) = non_blank(&cli.title) {
        config = config.with_title(title);
    }
    if let Some(group_title) = non_blank(&cli.group_title) {
        config = config.with_group_title(group_title);
    }
    if let Some(environment) = non_blank(&cli.environment) {
        config = config.with_env(environment);
    }
    if let Some(run) = non_blank(&cli.run) {
        config = config.with_run_id(run);
    }
    if cli.shared_run {
        config = config.with_parallel(true);
    }
    if cli.proceed {
        config = config.with_proceed(true);
    }
    if cli.no_color {
        config = config.with_colored_output(false);
    }

    config.validate().map_err(CliError::InvalidConfig)?;
    Ok(config)
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
