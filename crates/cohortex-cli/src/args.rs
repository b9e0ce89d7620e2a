use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "cohortex",
    version,
    about = "Extract patient cohorts and labeled prediction points from event-stream records"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evaluate a task specification against a predicate table
    Extract(ExtractArgs),
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Task specification YAML
    #[arg(long)]
    pub config: PathBuf,

    /// Predicate table CSV (subject_id, timestamp, one column per declared
    /// plain predicate)
    #[arg(long)]
    pub data: PathBuf,

    /// Output path; stdout when omitted
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per cohort row, window summaries nested
    Json,
    /// Flat MEDS label rows as CSV
    MedsCsv,
}
