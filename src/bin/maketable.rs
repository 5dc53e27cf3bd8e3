use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::Context as _;
use clap::Parser;
use vebot::args::LogArgs;
use vebot::books::Table;

/// Tool to create random tables in json: one entry per line of FILENAME.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[arg(value_name = "FILENAME")]
    filename: PathBuf,

    #[command(flatten)]
    log: LogArgs,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    args.log.init()?;

    if !args.filename.is_file() {
        tracing::error!("File {:?} not found", args.filename);
        process::exit(-1);
    }

    let contents = fs::read_to_string(&args.filename)
        .with_context(|| format!("reading {:?}", args.filename))?;
    let table = Table::from_lines(contents.lines());
    if table.entries.is_empty() {
        anyhow::bail!("{:?} has no entries", args.filename);
    }
    tracing::debug!("{} entries", table.entries.len());

    println!("{}", serde_json::to_string_pretty(&table)?);
    Ok(())
}
