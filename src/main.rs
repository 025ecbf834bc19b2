//! FastPng CLI - Parallel Batch PNG Optimizer
//!
//! Runs an external lossless optimizer over every PNG image found in the
//! given directories and reports how much each file shrank.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use fastpng::config::{LEVEL_LOWER_BOUND, LEVEL_UPPER_BOUND};
use fastpng::parallel::ProgressUpdate;
use fastpng::processing::PreflightValidator;
use fastpng::{BatchOrchestrator, BatchReport, Config, FastPngError, OptimizerTool, ProgressTracker};

/// FastPng - Parallel Batch PNG Optimizer
#[derive(Parser)]
#[command(
    name = "fastpng",
    version,
    about = "Parallel batch PNG optimizer driving optipng",
    long_about = "FastPng discovers PNG images in a set of directories (non-recursively) and \
                  runs an external lossless optimizer on each of them in parallel. The whole \
                  batch is bounded by a timeout that grows with the image count and the \
                  compression level."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory containing PNG images (repeatable)
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    directories: Vec<PathBuf>,

    /// Compression level (0-7, default: 2)
    #[arg(short, long, value_name = "LEVEL", allow_negative_numbers = true)]
    level: Option<i32>,

    /// Optimizer program name or path (default: optipng)
    #[arg(short, long, value_name = "PROGRAM", env = "FASTPNG_TOOL")]
    tool: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// List the images that would be optimized without running the optimizer
    #[arg(long)]
    dry_run: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    Config {
        /// Configuration file to validate
        file: PathBuf,
    },
    /// Generate example configuration file
    ExampleConfig {
        /// Output file path
        #[arg(short, long, default_value = "fastpng.toml")]
        output: PathBuf,
        /// Use YAML format instead of TOML
        #[arg(long)]
        yaml: bool,
    },
    /// Show system information and check the optimizer
    Info {
        /// Optimizer program to check (default: optipng)
        #[arg(short, long, value_name = "PROGRAM")]
        tool: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Handle subcommands
    if let Some(command) = cli.command {
        if let Err(e) = handle_subcommand(command).await {
            eprintln!("{}: {:#}", style("Error").red().bold(), e);
            process::exit(1);
        }
        return;
    }

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };

    if let Err(e) = fastpng::init_with_config(&config.logging) {
        fail(&e);
    }

    if config.optimize.directories.is_empty() {
        eprintln!("{}: At least one directory is required (--dir or a config file)",
                 style("Error").red().bold());
        eprintln!("Run with --help for usage information");
        process::exit(1);
    }

    if cli.dry_run {
        if let Err(e) = run_dry(&config) {
            fail(&e);
        }
        return;
    }

    let tracker = Arc::new(ProgressTracker::new());
    let progress = if cli.json || cli.quiet {
        None
    } else {
        Some(spawn_progress_bar(&tracker))
    };

    let mut orchestrator = BatchOrchestrator::with_sink(config.optimize.clone(), tracker.clone())
        .timeout_config(config.timeout);
    let result = orchestrator.run_until(interrupted()).await;

    if let Some((bar, handle)) = progress {
        handle.abort();
        bar.finish_and_clear();
    }

    match result {
        Ok(report) => print_summary(&report, cli.json),
        Err(e) => fail(&e),
    }
}

/// Print a fatal error and exit; running optimizer processes are left alone
fn fail(error: &FastPngError) -> ! {
    eprintln!("{}: {}", style("Error").red().bold(), error.user_message());
    debug!("Fatal error: {:?}", error);
    process::exit(1);
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    info!("Interrupt received, abandoning the wait");
}

/// Load the config file (if any) and apply command line overrides
fn build_config(cli: &Cli) -> Result<Config, FastPngError> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    config.optimize.directories.extend(cli.directories.iter().cloned());

    if let Some(level) = cli.level {
        config.optimize.level = level;
    }
    if let Some(tool) = &cli.tool {
        config.optimize.tool = tool.clone();
    }

    if cli.quiet {
        config.logging.level = "error".to_string();
    } else if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    Ok(config)
}

/// List candidates without spawning the optimizer
fn run_dry(config: &Config) -> Result<(), FastPngError> {
    let orchestrator = BatchOrchestrator::new(config.optimize.clone());
    let candidates = orchestrator.discover()?;

    println!("{} files would be optimized:", style(candidates.len()).bold());
    for candidate in &candidates {
        println!("  {}", candidate.path().display());
    }

    Ok(())
}

/// Drive an indicatif bar from the tracker's progress events
fn spawn_progress_bar(tracker: &ProgressTracker) -> (ProgressBar, JoinHandle<()>) {
    let mut updates = tracker.subscribe();
    let bar = ProgressBar::new(0);
    if let Ok(bar_style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(bar_style.progress_chars("#>-"));
    }

    let handle_bar = bar.clone();
    let handle = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(ProgressUpdate::Started { total_files }) => handle_bar.set_length(total_files),
                Ok(ProgressUpdate::FileOptimized { path, .. }) => {
                    handle_bar.set_message(file_name(&path));
                    handle_bar.inc(1);
                }
                Ok(ProgressUpdate::FileFailed { path, .. }) => {
                    if let Some(path) = path {
                        handle_bar.set_message(file_name(&path));
                    }
                    handle_bar.inc(1);
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    (bar, handle)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Handle subcommands
async fn handle_subcommand(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Config { file } => {
            validate_config_file(&file)?;
        }
        Commands::ExampleConfig { output, yaml } => {
            generate_example_config(&output, yaml)?;
        }
        Commands::Info { tool } => {
            show_system_info(tool).await;
        }
    }
    Ok(())
}

/// Validate configuration file
fn validate_config_file(file_path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(file_path)
        .with_context(|| format!("loading {}", file_path.display()))?;
    config.validate()
        .with_context(|| format!("validating {}", file_path.display()))?;

    println!("{}: Configuration file is valid", style("Success").green().bold());
    println!("Directories: {}", config.optimize.directories.len());
    println!("Level: {}", config.optimize.level);
    println!("Optimizer: {}", config.optimize.tool.display());

    Ok(())
}

/// Generate example configuration file
fn generate_example_config(output_path: &Path, use_yaml: bool) -> anyhow::Result<()> {
    let mut output_path = output_path.to_path_buf();
    if use_yaml && !matches!(output_path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")) {
        output_path.set_extension("yaml");
    }

    let mut config = Config::default();
    config.optimize.directories = vec![PathBuf::from("images")];
    config.to_file(&output_path)?;

    let format = if use_yaml { "YAML" } else { "TOML" };
    println!("{}: Generated example {} configuration: {}",
             style("Success").green().bold(),
             format,
             output_path.display());

    Ok(())
}

/// Report the host resources a batch will draw on and probe the optimizer
async fn show_system_info(tool: Option<PathBuf>) {
    use sysinfo::{CpuExt, System, SystemExt};

    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    let mut system = System::new();
    system.refresh_cpu();
    system.refresh_memory();

    println!("{} {}", style("fastpng").bold(), fastpng::VERSION);
    println!();

    println!("{}", style("Host:").bold());
    let os = [system.long_os_version(), system.kernel_version()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", kernel ");
    if !os.is_empty() {
        println!("  OS: {}", os);
    }
    let brand = system.cpus().first().map(|cpu| cpu.brand().trim().to_string());
    println!(
        "  CPUs: {} logical / {} physical{}",
        num_cpus::get(),
        num_cpus::get_physical(),
        brand.map(|b| format!(" ({})", b)).unwrap_or_default()
    );
    println!(
        "  Memory: {:.1} of {:.1} GiB free",
        system.available_memory() as f64 / GIB,
        system.total_memory() as f64 / GIB
    );
    println!("  Workers: one optimizer process per image, no queueing");
    println!();

    let tool = tool.map(OptimizerTool::new).unwrap_or_default();
    println!("{}", style("Optimizer:").bold());
    match PreflightValidator::new(&tool).verify_tool_installation().await {
        Ok(()) => println!(
            "  {} {} (levels {}-{})",
            style("✓").green(),
            tool.name(),
            LEVEL_LOWER_BOUND,
            LEVEL_UPPER_BOUND
        ),
        Err(e) => println!("  {} {}", style("✗").red(), e.user_message()),
    }
}

/// Print processing summary
fn print_summary(report: &BatchReport, json_output: bool) {
    if json_output {
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{}: Failed to serialize summary: {}", style("Error").red().bold(), e),
        }
        return;
    }

    println!();
    println!("{}", style("Optimization Summary:").bold());
    println!("  {}: {}", style("Submitted").blue(), report.submitted);
    println!("  {}: {}", style("Optimized").green(), report.optimized);
    if report.failed > 0 {
        println!("  {}: {}", style("Failed").red(), report.failed);
    }
    println!("  {}: {:.2}s (budget {}s)",
             style("Duration").blue(),
             report.processing_time.as_secs_f64(),
             report.timeout_budget.as_secs());

    if report.optimized > 0 {
        println!("  {}: {:.2}KB → {:.2}KB ({:.1}% reduction)",
                 style("Size").cyan(),
                 report.total_input_size as f64 / 1024.0,
                 report.total_output_size as f64 / 1024.0,
                 report.size_reduction());
    }

    if !report.failures.is_empty() {
        println!("\nErrors:");
        for (i, failure) in report.failures.iter().enumerate() {
            println!("  {}: {}", i + 1, failure.error);
        }
    }
}
