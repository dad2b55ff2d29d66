use clap::{Parser, Subcommand};
use duress_load::DuressConfig;
use std::path::PathBuf;

mod run;

use run::{RunArgs, list, run_benchmark, write_output};

#[derive(Parser, Debug)]
#[command(name = "duress", version)]
#[command(about = "Duress - time operations while the system under test is held under load")]
struct Cli {
    /// YAML configuration file (built-in defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List configured scenarios, operations and metrics
    List,
}

#[tokio::main]
async fn main() {
    // JSON logs on stderr; stdout carries the result document
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .json()
        .try_init();

    let cli = Cli::parse();

    let mut config = match DuressConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };
    config.apply_env_overrides();

    match cli.command {
        Some(Commands::List) => print!("{}", list(&config)),
        None => {
            let output = match run_benchmark(&config, &cli.run).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::error!(error = %e, "Benchmark could not be started");
                    std::process::exit(1);
                }
            };

            if let Err(e) = write_output(&output, cli.run.output.as_deref()) {
                tracing::error!(error = %e, "Failed to write result");
                std::process::exit(1);
            }

            if !output.is_success() {
                if let Some(failure) = &output.failure {
                    tracing::error!(error = %failure, samples = output.samples.len(), "Benchmark failed");
                }
                if let Some(error) = &output.teardown_failure {
                    tracing::error!(error = %error, "Scenario teardown failed");
                }
                std::process::exit(1);
            }
        }
    }
}
