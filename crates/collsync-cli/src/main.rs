mod commands;
mod logging;
mod progress;
mod prompt;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use collsync_core::config::{self, AppConfig};
use collsync_core::{
    scanner, CopyEngine, CopyReport, RenamePropagator, RenameReport, ScanOptions, Session,
    UndoReport,
};
use commands::{Cli, Commands, CopyArgs, RenameArgs, RootArgs};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let guard = logging::init_logger();

    let config = match config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            drop(guard);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Rename(args)) => run_rename(&config, args),
        Some(Commands::Copy(args)) => run_copy(&config, args),
        Some(Commands::Scan { root }) => run_scan(&config, &root),
        Some(Commands::PrintConfig) => print_config(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(true)
        }
    };

    let code = match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            error!("Error: {:#}", err);
            1
        }
    };

    drop(guard);
    process::exit(code);
}

/// CLI arguments win over configured roots; both roots must exist and differ.
fn resolve_roots(config: &AppConfig, roots: &RootArgs) -> anyhow::Result<(PathBuf, PathBuf)> {
    let primary = match (&roots.primary, &config.primary_root) {
        (Some(path), _) => path.clone(),
        (None, Some(path)) => PathBuf::from(path),
        (None, None) => bail!("Primary root path not provided"),
    };
    let backup = match (&roots.backup, &config.backup_root) {
        (Some(path), _) => path.clone(),
        (None, Some(path)) => PathBuf::from(path),
        (None, None) => bail!("Backup root path not provided"),
    };

    let (primary, backup) = config::validate_roots(&primary, &backup)?;
    info!("Primary root: {}", primary.display());
    info!("Backup root: {}", backup.display());
    Ok((primary, backup))
}

/// Ctrl-C finishes the current file and ends the pass, so the summary and the
/// undo prompt still run.
fn stop_on_interrupt(session: &Session) -> anyhow::Result<()> {
    ctrlc::set_handler(interrupt_handler(session.cancel_token()))
        .context("Failed to set signal handler")
}

fn interrupt_handler(token: Arc<AtomicBool>) -> impl FnMut() + Send + 'static {
    move || {
        eprintln!("\nReceived interrupt, stopping after the current file...");
        token.store(true, Ordering::SeqCst);
    }
}

fn run_rename(config: &AppConfig, args: RenameArgs) -> anyhow::Result<bool> {
    let (primary, backup) = resolve_roots(config, &args.roots)?;
    let options = ScanOptions::from_config(config)?;
    let mut session = Session::from_config(config);
    stop_on_interrupt(&session)?;
    let reporter = CliReporter::new();

    let report = RenamePropagator::new(options)
        .propagate(&mut session, &primary, &backup, &reporter)
        .context("Rename pass failed")?;
    print_rename_report(&report);

    let mut clean = report.errors.is_empty();
    if !session.renames().is_empty() && !args.keep {
        let undo = prompt::prompt_confirm(
            &format!("Undo the {} renames from this run?", session.renames().len()),
            Some(false),
        )?;
        if undo {
            let undo_report = session.undo();
            print_undo_report(&undo_report);
            clean &= undo_report.failures.is_empty();
        }
    }

    Ok(clean)
}

fn run_copy(config: &AppConfig, args: CopyArgs) -> anyhow::Result<bool> {
    let (primary, backup) = resolve_roots(config, &args.roots)?;
    let mode = match args.mode.or(config.comparison_mode) {
        Some(mode) => mode,
        None => prompt::prompt_comparison_mode()?,
    };
    info!("Comparison mode: {}", mode);

    let options = ScanOptions::from_config(config)?;
    let session = Session::from_config(config);
    stop_on_interrupt(&session)?;
    let reporter = CliReporter::new();
    let engine = CopyEngine::new()
        .with_collision_suffix(&config.collision_suffix)
        .with_parallel_hashing(config.parallel_hashing);

    let report = engine
        .copy_collection(&session, &options, &primary, &backup, mode, &reporter)
        .context("Copy pass failed")?;
    print_copy_report(&report, &mode.to_string());

    Ok(report.errors.is_empty())
}

fn run_scan(config: &AppConfig, root: &Path) -> anyhow::Result<bool> {
    let root = config::validate_root(root)?;
    let options = ScanOptions::from_config(config)?;
    let outcome = scanner::scan(&root, &options)?;

    for record in &outcome.records {
        println!("{}\t{}", record.size, record.relative.display());
    }
    info!(
        "{} collection files under {}",
        format!("{}", outcome.records.len()).green(),
        root.display()
    );
    for failure in &outcome.failures {
        warn!("Unreadable: {}: {}", failure.path.display(), failure.message);
    }

    Ok(outcome.failures.is_empty())
}

fn print_config(config: &AppConfig) -> anyhow::Result<bool> {
    let rendered = toml::to_string_pretty(config).context("Could not render configuration")?;
    println!("{}", rendered);
    Ok(true)
}

fn print_rename_report(report: &RenameReport) {
    println!();
    info!(
        "{} checked, {} same, {} undetermined, {} renamed, {} no match, {} ambiguous, {} errors",
        report.checked,
        format!("{}", report.identical_already).cyan(),
        format!("{}", report.undetermined).yellow(),
        format!("{}", report.renamed).green(),
        format!("{}", report.no_match).yellow(),
        format!("{}", report.ambiguous).yellow(),
        format!("{}", report.errors.len()).red(),
    );
    if report.cancelled {
        warn!("Rename pass was cancelled before all files were checked");
    }
    print_list("Unmatched", &report.diagnostics);
    print_list("Errors", &report.errors);
}

fn print_copy_report(report: &CopyReport, mode: &str) {
    println!();
    info!(
        "{} checked, {} copied, {} dest-renamed, {} same-{}, {} errors",
        report.checked,
        format!("{}", report.copied).green(),
        format!("{}", report.renamed_existing).yellow(),
        format!("{}", report.skipped).cyan(),
        mode,
        format!("{}", report.errors.len()).red(),
    );
    if report.halted_on_disk_full {
        error!("Backup volume is full; remaining files were not copied");
    }
    if report.cancelled {
        warn!("Copy pass was cancelled before all files were checked");
    }
    print_list("Errors", &report.errors);
}

fn print_undo_report(report: &UndoReport) {
    info!("{} renames undone", format!("{}", report.restored).green());
    print_list("Undo errors", &report.failures);
}

fn print_list(title: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    println!("\n  {}:", title.bold());
    for line in lines {
        println!("{}", line);
    }
}
