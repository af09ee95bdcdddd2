//! Abnormal accruals CLI binary.
//!
//! Builds the monthly abnormal accruals panel from an accounting extract and
//! a security master, and summarizes existing panels.

use accruals::output::{read_signal_file, summarize, write_signal_file, write_signal_files};
use accruals::signal::WinsorMode;
use accruals::{Pipeline, PipelineConfig};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "accruals")]
#[command(about = "Abnormal accruals signal construction", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the signal panel from the two inputs
    Run {
        /// Annual accounting extract
        #[arg(long)]
        accounting: PathBuf,

        /// Monthly security master
        #[arg(long)]
        master: PathBuf,

        /// Output panel path
        #[arg(long)]
        output: PathBuf,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Input field delimiter
        #[arg(long)]
        delimiter: Option<char>,

        /// Also write one permno,yyyymm,<signal> file per signal here
        #[arg(long)]
        signal_dir: Option<PathBuf>,

        /// Write a JSON run report here
        #[arg(long)]
        report: Option<PathBuf>,

        /// Tail treatment for the winsorized ratios
        #[arg(long, value_enum)]
        winsor_mode: Option<WinsorArg>,

        /// Only log warnings and skip the summary table
        #[arg(long)]
        quiet: bool,
    },

    /// Print summary statistics of an existing panel
    Summary {
        /// Panel written by `run`
        path: PathBuf,

        /// Render as Markdown
        #[arg(long)]
        markdown: bool,
    },

    /// Print the default configuration as JSON
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WinsorArg {
    Clamp,
    PassThrough,
}

impl From<WinsorArg> for WinsorMode {
    fn from(arg: WinsorArg) -> Self {
        match arg {
            WinsorArg::Clamp => Self::Clamp,
            WinsorArg::PassThrough => Self::PassThrough,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let quiet = matches!(cli.command, Commands::Run { quiet: true, .. });
    init_logging(quiet);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Log to stderr, filtered by `RUST_LOG` when set.
fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run {
            accounting,
            master,
            output,
            config,
            delimiter,
            signal_dir,
            report,
            winsor_mode,
            quiet,
        } => {
            let config = resolve_config(config.as_deref(), delimiter, winsor_mode)?;
            let paths = RunPaths {
                accounting,
                master,
                output,
                signal_dir,
                report,
            };
            run_pipeline(config, &paths, quiet)?;
        }
        Commands::Summary { path, markdown } => {
            let summary = summarize(&read_signal_file(&path)?)?;
            if markdown {
                print!("{}", summary.to_markdown());
            } else {
                print!("{}", summary.to_ascii_table());
            }
        }
        Commands::Config => {
            println!("{}", PipelineConfig::default().to_json()?);
        }
    }

    Ok(())
}

/// File locations of one `run` invocation.
struct RunPaths {
    accounting: PathBuf,
    master: PathBuf,
    output: PathBuf,
    signal_dir: Option<PathBuf>,
    report: Option<PathBuf>,
}

/// Configuration file (or defaults) with command-line overrides applied.
fn resolve_config(
    path: Option<&Path>,
    delimiter: Option<char>,
    winsor_mode: Option<WinsorArg>,
) -> Result<PipelineConfig, accruals::PipelineError> {
    let mut config = match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            PipelineConfig::from_file(path)?
        }
        None => PipelineConfig::default(),
    };
    if let Some(delimiter) = delimiter {
        config.delimiter = delimiter;
    }
    if let Some(mode) = winsor_mode {
        config.signal.winsor_mode = mode.into();
    }
    config.validate()?;
    Ok(config)
}

fn run_pipeline(
    config: PipelineConfig,
    paths: &RunPaths,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::new(config)?;

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));

    let output = match pipeline.run_files(&paths.accounting, &paths.master, |stage| {
        pb.set_message(format!("Running {stage} stage..."));
    }) {
        Ok(output) => {
            pb.finish_with_message(format!(
                "Built {} security-months for {} fitted groups",
                output.rows.len(),
                output.stats.regress.fitted
            ));
            output
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(e.into());
        }
    };

    let records = output.records();
    write_signal_file(&paths.output, &records)?;
    if let Some(dir) = &paths.signal_dir {
        write_signal_files(dir, &records)?;
    }

    let summary = summarize(&records)?;
    if !quiet {
        print!("{}", summary.to_ascii_table());
    }

    if let Some(report_path) = &paths.report {
        output
            .report(pipeline.config())?
            .path("accounting", &paths.accounting)
            .path("master", &paths.master)
            .path("output", &paths.output)
            .summary(summary)
            .build()
            .write_to(report_path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "accruals",
            "run",
            "--accounting",
            "a.csv",
            "--master",
            "m.csv",
            "--output",
            "out.csv",
            "--winsor-mode",
            "pass-through",
            "--delimiter",
            "|",
        ])
        .unwrap();
        let Commands::Run {
            accounting,
            winsor_mode,
            delimiter,
            quiet,
            signal_dir,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(accounting, PathBuf::from("a.csv"));
        assert_eq!(winsor_mode, Some(WinsorArg::PassThrough));
        assert_eq!(delimiter, Some('|'));
        assert!(!quiet);
        assert!(signal_dir.is_none());
    }

    #[test]
    fn test_run_requires_inputs() {
        assert!(Cli::try_parse_from(["accruals", "run", "--accounting", "a.csv"]).is_err());
    }

    #[test]
    fn test_overrides_apply_to_defaults() {
        let config = resolve_config(None, Some(';'), Some(WinsorArg::PassThrough)).unwrap();
        assert_eq!(config.delimiter, ';');
        assert_eq!(config.signal.winsor_mode, WinsorMode::PassThrough);
        assert_eq!(config.signal.min_group_size, 6);
    }

    #[test]
    fn test_bad_delimiter_override_rejected() {
        assert!(resolve_config(None, Some('"'), None).is_err());
    }
}
