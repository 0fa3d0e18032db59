//! Configuration sourced from the CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "routectl", version, about = "Merge or remove a configuration overlay against the live router configuration")]
pub struct Cli {
    /// The live configuration directory.
    #[arg(long, global = true, default_value = "/etc/config")]
    pub live_dir: PathBuf,

    /// Directory backup archives are written to and restored from.
    #[arg(long, global = true, default_value = "/etc/routectl/backups")]
    pub backup_dir: PathBuf,

    /// How many seconds to wait for the live directory's advisory lock
    /// before failing with KindBusy.
    #[arg(long, global = true, default_value_t = 5)]
    pub lock_timeout_secs: u64,

    /// How many backup archives to retain per operation name.
    #[arg(long, global = true, default_value_t = 10)]
    pub backup_retention: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Merge an overlay directory into the live configuration.
    Merge(MergeArgs),

    /// Remove, from the live configuration, every section an overlay
    /// section matches.
    Remove(MergeArgs),

    /// Capture a standalone backup of the live configuration directory.
    Backup {
        /// Name used for the archive file and its retention group.
        name: String,
    },

    /// Parse every file in the live configuration directory and report
    /// any invariant violations.
    Validate,
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    /// Directory of overlay configuration fragments.
    pub overlay_dir: PathBuf,

    /// Produce the journal without touching any file or service.
    #[arg(long)]
    pub dry_run: bool,

    /// Disable the network-safety guard on the `network`/`firewall`
    /// configs. Off by default, only pass this if you
    /// know what you're doing.
    #[arg(long)]
    pub no_preserve_network: bool,

    /// On a scalar conflict, take the overlay's value instead of
    /// keeping the live one.
    #[arg(long)]
    pub prefer_overlay: bool,

    /// Don't restart any service after committing.
    #[arg(long)]
    pub no_restart: bool,

    /// Don't roll back configuration files if a service restart fails.
    #[arg(long)]
    pub no_rollback: bool,
}
