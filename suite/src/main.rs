/*!

This is the command line interface for running the NVIDIA GPU Operator
end-to-end suite against an OpenShift cluster.

!*/

mod bundle;
mod burn;
mod catalog;
mod config;
mod context;
mod deploy;
mod nfd;
mod report;
mod run;
mod runner;
mod upgrade;

use anyhow::{Context, Result};
use clap::Parser;
use config::EnvConfig;
use context::TestContext;
use env_logger::Builder;
use log::LevelFilter;
use std::path::PathBuf;

/// The command line interface for validating NVIDIA GPU Operator deployment
/// and upgrade on an OpenShift cluster.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Set logging verbosity [trace|debug|info|warn|error]. If the environment variable `RUST_LOG`
    /// is present, it overrides the default logging behavior. See https://docs.rs/env_logger/latest
    #[clap(long = "log-level", default_value = "info")]
    log_level: LevelFilter,
    /// Path to the kubeconfig file. Also can be passed with the KUBECONFIG environment variable.
    #[clap(long = "kubeconfig")]
    kubeconfig: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Run the test cases.
    Run(run::Run),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.log_level);
    if let Err(e) = run(args).await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config =
        EnvConfig::from_env().context("Unable to read NVIDIAGPU_* environment variables")?;
    let context = TestContext::new(config, args.kubeconfig.as_deref())
        .await
        .context("Unable to create the cluster client")?;
    match args.command {
        Command::Run(run) => run.run(context).await,
    }
}

/// Initialize the logger with the value passed by `--log-level` (or its default) when the
/// `RUST_LOG` environment variable is not present. If present, the `RUST_LOG` environment variable
/// overrides `--log-level`/`level`.
fn init_logger(level: LevelFilter) {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            // RUST_LOG does not exist; set the log level for the suite's crates only.
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), level)
                .filter(Some("gputest_model"), level)
                .init();
        }
    }
}
