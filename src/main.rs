use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ddr_checker::{analyze_to_file, AnalyzeOptions};

#[derive(Parser)]
#[command(name = "ddr-checker")]
#[command(author, version, about = "Catalog and reference analysis for FileMaker DDR exports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a DDR XML export and write a JSON usage report
    Analyze {
        /// Path to the DDR XML export
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the JSON report (defaults to <input>_report.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print diagnostics about unclassified references
        #[arg(short, long)]
        debug: bool,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            output,
            debug,
            verbose,
        } => {
            let options = AnalyzeOptions {
                input_path: input,
                output_path: output,
                debug,
                verbose,
            };

            let output_path = analyze_to_file(&options)?;
            println!("Report written: {}", output_path.display());
        }
    }

    Ok(())
}
