use clap::{Parser, Subcommand};
use colored::control;
use gitvision::{CancelToken, Config, GitReader, ScanReport, Walker};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

mod status;
mod watch;

/// Ceiling for the whole discovery walk
const SCAN_CEILING: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "gv")]
#[command(version)]
#[command(about = "Keep an eye on every git repository and worktree under your code directories")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/gv/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory to scan instead of the configured scan_paths (repeatable)
    #[arg(short, long = "scan", global = true, value_name = "PATH")]
    scan: Vec<PathBuf>,

    /// Log git invocations and scan decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered repositories and worktrees
    Scan {
        #[arg(long, help = "Output results as JSON")]
        json: bool,
    },
    /// Show branch, changes, ahead/behind and in-progress operations (default)
    Status {
        #[arg(long, help = "Output results as JSON")]
        json: bool,
    },
    /// Show line diffs and the last seven days of commit activity
    Diff {
        #[arg(long, help = "Output results as JSON")]
        json: bool,
        /// Most-touched files to list per repository (0 = all)
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
    /// Fetch every repository, then show fresh status
    Fetch {
        #[arg(long, help = "Output results as JSON")]
        json: bool,
    },
    /// Poll for changes and print a line whenever a repository changes
    Watch,
    /// Print the effective configuration
    Config {
        /// Persist the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    control::set_override(std::io::stdout().is_terminal());

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if !cli.scan.is_empty() {
        config.scan_paths = cli.scan.clone();
    }

    let command = cli.command.unwrap_or(Commands::Status { json: false });

    if let Commands::Config { write } = command {
        status::run_config(&config, &config_path, write);
        return;
    }

    if config.scan_paths.is_empty() {
        eprintln!(
            "Error: no scan paths configured. Add scan_paths to {} or pass --scan <PATH>.",
            config_path.display()
        );
        std::process::exit(1);
    }

    let report = match discover(&config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let reader = GitReader::new();

    match command {
        Commands::Scan { json } => status::run_scan(&report, json),
        Commands::Status { json } => status::run_status(report.repos, &reader, &config, json),
        Commands::Diff { json, top } => status::run_diff(report.repos, &reader, json, top),
        Commands::Fetch { json } => status::run_fetch(report.repos, &reader, json),
        Commands::Watch => {
            if let Err(e) = watch::run_watch_mode(report.repos, &reader, &config) {
                eprintln!("Error running watch mode: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Config { .. } => {}
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

/// Walk the configured roots, reporting unreadable roots as warnings
fn discover(config: &Config) -> Result<ScanReport, String> {
    let walker = Walker::from_config(config).map_err(|e| e.to_string())?;
    let token = CancelToken::background().with_timeout(SCAN_CEILING);
    let report = walker.scan(&token).map_err(|e| e.to_string())?;

    for err in &report.errors {
        eprintln!("Warning: {}", err);
    }

    Ok(report)
}
