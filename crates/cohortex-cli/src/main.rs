mod args;
mod loader;
mod output;

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cohortex_engine::{query, to_meds_labels};
use cohortex_task::TaskConfig;

use crate::args::{Cli, Command, ExtractArgs, OutputFormat};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Extract(args) => extract(args),
    }
}

fn extract(args: ExtractArgs) -> Result<()> {
    let cfg = TaskConfig::load(&args.config)?;
    let frame = loader::load_predicate_csv(&args.data, &cfg)?;
    let result = query(&cfg, &frame)?;

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(
            || format!("cannot create output file '{}'", path.display()),
        )?)),
        None => Box::new(io::stdout().lock()),
    };

    match args.format {
        OutputFormat::Json => output::write_json(&result, out)?,
        OutputFormat::MedsCsv => {
            let rows = to_meds_labels(&result)?;
            output::write_meds_csv(&rows, out)?;
        }
    }
    Ok(())
}
