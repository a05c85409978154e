#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]

//! CLI for the profiling examples

mod cli;

use std::io::Write;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use profiling_examples::{DemoConfig, DemoContext, dispatch};

use crate::cli::Cli;

fn main() {
    init_tracing();

    match run() {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DemoConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => DemoConfig::default(),
    };
    let config = cli
        .disable
        .iter()
        .copied()
        .fold(config, DemoConfig::with_disabled_facility);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut ctx = DemoContext::new(&mut out, &config);

    let outcome = dispatch(cli.func.as_deref(), &mut ctx);
    out.flush().context("flushing stdout")?;

    let outcome = outcome.with_context(|| {
        format!(
            "example '{}' aborted",
            cli.func.as_deref().unwrap_or_default()
        )
    })?;
    tracing::debug!(?outcome, "dispatch complete");
    Ok(())
}

/// Initialize tracing subscriber with environment filter, logging to stderr.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
