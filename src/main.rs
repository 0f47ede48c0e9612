/*!
 * forest-bounds CLI - Command Line Interface
 *
 * Each pipeline stage is its own subcommand; `all` runs fetch, export,
 * chunk and index back to back.
 */

use clap::{Parser, Subcommand, ValueEnum};
use forest_bounds::{
    cli_style::{
        format_duration, print_error, print_success, print_warning, section_header, stage_icon,
        stage_table, Icons,
    },
    config::{LogLevel, Settings},
    error::{ErrorCategory, PipelineError, Result, EXIT_SUCCESS},
    logging,
    paths::RepoPaths,
    pipeline,
    report::StageReport,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "forest-bounds")]
#[command(version, about = "Fetch, convert, chunk and index US Forest Service boundary layers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Repository root (must contain data-config/); discovered when omitted
    #[arg(long, value_name = "DIR", global = true)]
    root: Option<PathBuf>,

    /// Pipeline settings file (TOML)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stderr
    #[arg(long, value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable the download progress bar
    #[arg(long, global = true)]
    no_progress: bool,

    /// Print the stage report as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and extract every layer archive into data-in/
    Fetch,
    /// Convert shapefiles to GeoJSON in data-in-geojson/
    Export,
    /// Chunk or copy GeoJSON into data-out/
    Chunk,
    /// Write data-out/index.json
    Index,
    /// Remove raw downloads and intermediate GeoJSON
    Cleanup,
    /// Run fetch, export, chunk and index in order
    All,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!(category = %e.category(), "{}", e);
            print_error(&e.to_string(), suggestion(&e));
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn suggestion(e: &PipelineError) -> Option<&'static str> {
    match e {
        PipelineError::RepoRootNotFound { .. } => {
            Some("Run from inside the repository or pass --root <DIR>")
        }
        _ => match e.category() {
            ErrorCategory::Configuration => Some("Check the layer files under data-config/"),
            ErrorCategory::Network => {
                Some("Check the layer URL; completed downloads are kept and skipped on re-run")
            }
            _ => None,
        },
    }
}

fn load_settings(cli: &Cli) -> Settings {
    let mut settings = match cli.config {
        Some(ref path) => Settings::from_file(path).unwrap_or_else(|e| {
            print_warning(&format!("Failed to load config file: {}", e));
            Settings::default()
        }),
        None => Settings::default(),
    };

    if let Some(level) = cli.log_level {
        settings.log_level = level.into();
    }
    if cli.log.is_some() {
        settings.log_file = cli.log.clone();
    }
    settings.verbose |= cli.verbose;
    settings.show_progress &= !cli.no_progress;
    settings
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli);

    if let Err(e) = logging::init_logging(&settings) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let paths = RepoPaths::discover(cli.root.as_deref())?;
    info!("Repository root: {}", paths.root().display());

    let started = Instant::now();
    match cli.command {
        Commands::Fetch => {
            let report = pipeline::fetch::run(&paths, &settings)?;
            print_report(&report, cli.json, started)
        }
        Commands::Export => {
            let report = pipeline::export::run(&paths)?;
            print_report(&report, cli.json, started)
        }
        Commands::Chunk => {
            let report = pipeline::chunk::run(&paths)?;
            print_report(&report, cli.json, started)
        }
        Commands::Index => {
            let report = pipeline::index::build_index(&paths)?;
            print_report(&report, cli.json, started)
        }
        Commands::Cleanup => {
            let report = pipeline::cleanup::run(&paths)?;
            print_report(&report, cli.json, started)
        }
        Commands::All => {
            let report = pipeline::run_all(&paths, &settings)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            let stages: [&dyn StageReport; 4] =
                [&report.fetch, &report.export, &report.chunk, &report.index];
            for stage in stages {
                print_stage_table(stage);
            }
            print_outcome(stages.iter().any(|s| s.has_failures()), "pipeline", started);
            Ok(())
        }
    }
}

fn print_stage_table(report: &dyn StageReport) {
    section_header(&format!("{} {}", stage_icon(report.stage()), report.stage()));
    println!("{}", stage_table(report));
}

fn print_outcome(had_failures: bool, stage: &str, started: Instant) {
    println!();
    if had_failures {
        print_warning("Some inputs could not be read; see the log for details");
    } else {
        print_success(&format!(
            "{} {} finished in {}",
            Icons::TREE,
            stage,
            format_duration(started.elapsed().as_secs_f64())
        ));
    }
}

fn print_report<R: StageReport + Serialize>(report: &R, json: bool, started: Instant) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    print_stage_table(report);
    print_outcome(report.has_failures(), report.stage(), started);
    Ok(())
}
