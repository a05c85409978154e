//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;

use profiling_examples::Facility;

/// Run one of the timing and profiling examples by name
#[derive(Parser, Debug)]
#[command(name = "profiling-examples")]
#[command(version)]
#[command(about = "Runs defensive-programming, timing and profiling examples")]
#[command(
    long_about = "Runs one example routine by name. Without --func the available names are listed; an unknown name prints a message and the list."
)]
pub struct Cli {
    /// Name of the example to run
    #[arg(long)]
    pub func: Option<String>,

    /// TOML file overriding workload sizes and report lengths
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Treat an optional facility as unavailable (repeatable)
    #[arg(long, value_enum)]
    pub disable: Vec<Facility>,
}
