use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use humansize::{format_size, BINARY};
use retention_sweep::{clean_all_folders, Config, FileLog, LogSink, RunSummary, SweepOptions};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Delete all but the newest files of selected extensions in every directory of configured trees",
    long_about = None
)]
struct Args {
    /// Show what would be deleted, but don't delete anything
    #[arg(long, short)]
    simulate: bool,

    /// Policy file listing the folders to clean
    #[arg(long, short, default_value = "retention.toml")]
    config: PathBuf,

    /// Append-only log file for this and previous runs
    #[arg(long, default_value = "logs/app.log")]
    log_file: PathBuf,

    /// Also list kept and skipped files
    #[arg(long, short)]
    verbose: bool,
}

/// Open the log and load the policy file, logging each step
fn startup(args: &Args) -> Result<(FileLog, Option<Config>)> {
    let (mut log, setup) = FileLog::open(&args.log_file)?;

    if setup.created_dir {
        if let Some(dir) = args.log_file.parent() {
            log.info(&format!("Created log directory: {}", dir.display()));
        }
    }
    if setup.created_file {
        log.info(&format!("Created log file: {}", args.log_file.display()));
    } else {
        log.info("Log file already exists.");
    }

    log.info("Program starting...");
    log.info(&format!(
        "Checking configuration file {}...",
        args.config.display()
    ));

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            log.error(&format!("{:#}", err));
            return Ok((log, None));
        }
    };

    log.info(&format!(
        "Configuration is valid: {} folder(s) to clean.",
        config.folders.len()
    ));
    log.info("Program started successfully.");

    Ok((log, Some(config)))
}

fn print_summary(summary: &RunSummary, simulate: bool) {
    let stats = &summary.stats;

    println!();
    println!("========================================");
    println!(
        "Folders cleaned: {}  missing: {}  failed: {}",
        summary.completed, summary.missing, summary.failed
    );
    println!(
        "Directories visited: {}  matching files: {}  kept: {}",
        stats.directories, stats.eligible, stats.kept
    );

    if simulate {
        println!(
            "Would delete {} file(s): {}",
            stats.simulated,
            format_size(stats.reclaimed_bytes, BINARY).bold()
        );
        println!("{}", "Simulation mode: no files were deleted.".yellow());
    } else {
        println!(
            "Deleted {} file(s): {}",
            stats.deleted,
            format_size(stats.reclaimed_bytes, BINARY).bold().red()
        );
        if stats.failed > 0 {
            println!(
                "{}",
                format!("{} file(s) could not be deleted.", stats.failed).red()
            );
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    println!("Simulation mode: {}", args.simulate);

    let (mut log, config) = startup(args)?;
    let Some(config) = config else {
        return Ok(ExitCode::FAILURE);
    };

    let options = SweepOptions {
        simulate: args.simulate,
        verbose: args.verbose,
    };
    let summary = clean_all_folders(&config.folders, options, &mut log);

    log.info("Cleaning operations finished.");
    print_summary(&summary, args.simulate);

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
