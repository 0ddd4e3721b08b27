use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use sheetunlock_core::{
    BatchReport, Mode, PartMapping, PatchMode, Session, UnlockConfig, UnlockRequest, Unlocker,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod formatter;

#[derive(Parser)]
#[command(name = "sheetunlock")]
#[command(about = "Remove sheet protection flags from XLSX workbooks", long_about = None)]
#[command(version)]
struct Cli {
    /// Workbooks to unlock, or a single directory to walk
    #[arg(value_name = "PATH", required = true, num_args = 1..)]
    paths: Vec<PathBuf>,

    /// Sheets to unlock, e.g. 1,3,5-8 (default: all sheets)
    #[arg(short, long, value_name = "RANGE")]
    range: Option<String>,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Only rewrite the sheet attribute of <sheetProtection>
    #[arg(long)]
    structural: bool,

    /// Map sheet numbers through xl/workbook.xml instead of part file names
    #[arg(long)]
    map_by_workbook: bool,

    /// Show what would be done without making changes
    #[arg(long)]
    dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON output for scripting
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(report) if report.all_succeeded() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // The fmt subscriber also installs the log -> tracing bridge
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<BatchReport> {
    let config = load_config(&cli)?;

    let mut session = Session::new();
    let mode = if cli.paths.len() == 1 && cli.paths[0].is_dir() {
        Mode::Directory
    } else {
        Mode::SingleFile
    };
    session.choose_mode(mode)?;
    session.set_target(cli.paths[0].clone())?;
    if let Some(range) = &cli.range {
        session.set_range(range.clone())?;
    }
    session.confirm()?;
    let request = session.start()?;

    let unlocker = Unlocker::with_config(config);
    let report = execute(&unlocker, &request, &cli);
    session.finish()?;
    let report = report?;

    match cli.format {
        OutputFormat::Human => formatter::print_human(&report, cli.dry_run),
        OutputFormat::Json => formatter::print_json(&report, cli.dry_run)?,
    }

    Ok(report)
}

fn execute(unlocker: &Unlocker, request: &UnlockRequest, cli: &Cli) -> Result<BatchReport> {
    let range = request.range.as_deref();
    let report = match (request.mode, cli.dry_run) {
        (Mode::Directory, false) => unlocker
            .unlock_directory(&request.target, range)
            .with_context(|| format!("Failed to walk {}", request.target.display()))?,
        (Mode::Directory, true) => unlocker
            .plan_directory(&request.target, range)
            .with_context(|| format!("Failed to walk {}", request.target.display()))?,
        (Mode::SingleFile, false) => unlocker.unlock_files(&cli.paths, range),
        (Mode::SingleFile, true) => unlocker.plan_files(&cli.paths, range),
    };
    Ok(report)
}

fn load_config(cli: &Cli) -> Result<UnlockConfig> {
    let mut config = if let Some(config_path) = &cli.config {
        UnlockConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        // Try to load default config from current directory if it exists
        let default_config_path = PathBuf::from("sheetunlock.toml");
        if default_config_path.exists() {
            UnlockConfig::from_file(&default_config_path).with_context(|| {
                format!(
                    "Failed to load config from {}",
                    default_config_path.display()
                )
            })?
        } else {
            UnlockConfig::default()
        }
    };

    if cli.structural {
        config.patch_mode = PatchMode::Structural;
    }
    if cli.map_by_workbook {
        config.part_mapping = PartMapping::WorkbookOrder;
    }
    config.validate().context("Invalid configuration")?;

    Ok(config)
}
