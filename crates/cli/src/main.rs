//! Circulation-statistics command-line interface.
//!
//! Reads a TOML analysis configuration, runs the slice pipeline and
//! writes the hierarchical result container.

use std::fs::File;
use std::path::{Path, PathBuf};

use clap::Parser;
use env_logger::Builder;

use circ2d_pipeline::{driver, PipelineConfig};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "circ2d", about = "Circulation statistics of GP fields")]
struct Cli {
    /// Path to a TOML analysis configuration
    config: PathBuf,

    /// Override the output container path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the worker-thread count (0 = all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Suppress progress logs (stderr)
    #[arg(long)]
    quiet: bool,

    /// Write logs to a file instead of stderr
    ///
    /// Creates a timestamped log file with all log output. The log level
    /// is controlled by the RUST_LOG environment variable.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

// ============================================================================
// Logging Setup
// ============================================================================

/// Initialize logging to stderr or to a timestamped file.
fn initialize_logging(log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    use std::io::Write;

    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            let file = std::sync::Mutex::new(file);

            Builder::new()
                .format(move |buf, record| {
                    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    {
                        let mut file = file.lock().unwrap();
                        let _ = writeln!(
                            file,
                            "[{} {:5} {}] {}",
                            timestamp,
                            record.level(),
                            record.target(),
                            record.args()
                        );
                    }
                    writeln!(
                        buf,
                        "[{} {:5} {}] {}",
                        timestamp,
                        record.level(),
                        record.target(),
                        record.args()
                    )
                })
                .filter_level(log::LevelFilter::Debug)
                .parse_default_env()
                .init();

            eprintln!("[cli] logging to file: {}", path.display());
        }
        None => {
            Builder::from_default_env()
                .format(|buf, record| {
                    let level = record.level();
                    let (color_start, color_end) = match level {
                        log::Level::Error => ("\x1b[1;31m", "\x1b[0m"),
                        log::Level::Warn => ("\x1b[1;33m", "\x1b[0m"),
                        log::Level::Info => ("\x1b[32m", "\x1b[0m"),
                        log::Level::Debug => ("\x1b[36m", "\x1b[0m"),
                        log::Level::Trace => ("\x1b[35m", "\x1b[0m"),
                    };
                    writeln!(buf, "{}{:5}{} {}", color_start, level, color_end, record.args())
                })
                .init();
        }
    }

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    initialize_logging(cli.log_file.as_deref())?;

    if !cli.quiet {
        eprintln!("[cli] loading config {}", cli.config.display());
    }
    let mut config = PipelineConfig::from_file(&cli.config)?;

    if let Some(output) = cli.output {
        if !cli.quiet {
            eprintln!("[cli] overriding output path -> {}", output.display());
        }
        config.output.path = output;
    }
    if let Some(threads) = cli.threads {
        if !cli.quiet {
            eprintln!("[cli] overriding worker threads -> {threads}");
        }
        config.pipeline.threads = Some(threads);
    }

    let report = driver::run(&config)?;

    if !cli.quiet {
        eprintln!(
            "[cli] processed {} slices, results in {}",
            report.slices,
            report.output_path.display()
        );
    }

    Ok(())
}
