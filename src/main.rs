use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

mod archive;
mod balance;
mod config;
mod error;
mod export;
mod features;
mod models;
mod pipeline;
mod reduce;
mod report;
mod stream;
#[cfg(test)]
mod test_support;
mod validate;

use config::SamplingConfig;

#[derive(Parser)]
#[command(name = "attendance-sampler")]
#[command(about = "Class-balanced, memory-bounded sampling of archived attendance data", long_about = None)]
struct Cli {
    /// Log debug detail for every batch
    #[arg(long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Only log warnings and errors
    #[arg(long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream the archive and write the model-ready feature table
    Sample {
        #[command(flatten)]
        sampling: SamplingArgs,
        #[arg(long, default_value = "features.csv")]
        out: PathBuf,
        /// Also write run statistics as JSON
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Count data rows of the archive's tabular member
    Count {
        #[arg(long)]
        archive: PathBuf,
        #[arg(long, default_value = "csv")]
        extension: String,
    },
    /// Generate a markdown report of a sampling run
    Report {
        #[command(flatten)]
        sampling: SamplingArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct SamplingArgs {
    /// Zip archive holding the attendance CSV
    #[arg(long)]
    archive: PathBuf,
    /// JSON file with sampling options; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    chunk_size: Option<usize>,
    #[arg(long)]
    majority_ratio: Option<usize>,
    #[arg(long)]
    sample_size: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Read ambiguous dates as day/month/year
    #[arg(long)]
    day_first: bool,
    /// Count rows before streaming to report progress
    #[arg(long)]
    count_rows: bool,
    /// Decode this many batches ahead on a worker thread
    #[arg(long)]
    prefetch: Option<usize>,
}

impl SamplingArgs {
    fn resolve(&self) -> anyhow::Result<SamplingConfig> {
        let mut config = match &self.config {
            Some(path) => SamplingConfig::from_json_file(path)?,
            None => SamplingConfig::default(),
        };
        if let Some(value) = self.chunk_size {
            config.chunk_size = value;
        }
        if let Some(value) = self.majority_ratio {
            config.majority_ratio = value;
        }
        if let Some(value) = self.sample_size {
            config.sample_size = value;
        }
        if let Some(value) = self.seed {
            config.random_seed = value;
        }
        if let Some(value) = self.prefetch {
            config.prefetch_batches = value;
        }
        config.day_first |= self.day_first;
        config.count_rows |= self.count_rows;
        config.validate()?;
        Ok(config)
    }

    fn run(&self) -> anyhow::Result<pipeline::PipelineOutput> {
        let config = self.resolve()?;
        pipeline::run(&self.archive, &config)
            .with_context(|| format!("sampling {} failed", self.archive.display()))
    }
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn write_report(out: &Path, report: &str) -> anyhow::Result<()> {
    std::fs::write(out, report).with_context(|| format!("failed to write {}", out.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Commands::Sample {
            sampling,
            out,
            summary,
        } => {
            let output = sampling.run()?;
            export::write_features_csv(&out, &output.features)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "Wrote {} rows ({} absent pool, {} present pool) to {}.",
                output.features.len(),
                output.stats.minority_pool,
                output.stats.majority_pool,
                out.display()
            );
            if let Some(path) = summary {
                export::write_summary_json(&path, &output.stats)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Summary written to {}.", path.display());
            }
        }
        Commands::Count { archive, extension } => {
            let mut opened = archive::AttendanceArchive::open(&archive, &extension)?;
            let rows = opened
                .count_rows()
                .with_context(|| format!("failed to count rows in {}", archive.display()))?;
            println!("{} data rows in {}.", rows, opened.member_name());
        }
        Commands::Report { sampling, out } => {
            let output = sampling.run()?;
            let report = report::build_report(&output.stats, &output.features);
            write_report(&out, &report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
