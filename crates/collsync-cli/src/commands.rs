use clap::{Args, Parser, Subcommand};
use collsync_core::Tier;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "collsync")]
#[command(about = "Keep a backup collection in step with its primary", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rename backup files after their renamed primary counterparts
    Rename(RenameArgs),
    /// Copy primary files into the backup, verifying every copy
    Copy(CopyArgs),
    /// List the collection files found under a root
    Scan {
        /// Collection root to scan
        root: PathBuf,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct RootArgs {
    /// Primary collection root (falls back to `primary_root` in the configuration)
    pub primary: Option<PathBuf>,
    /// Backup collection root (falls back to `backup_root` in the configuration)
    pub backup: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RenameArgs {
    #[command(flatten)]
    pub roots: RootArgs,
    /// Keep the renames without asking whether to undo them
    #[arg(long)]
    pub keep: bool,
}

#[derive(Debug, Args)]
pub struct CopyArgs {
    #[command(flatten)]
    pub roots: RootArgs,
    /// How to decide that an existing backup file is the same: size, fast or strong
    #[arg(long)]
    pub mode: Option<Tier>,
}
