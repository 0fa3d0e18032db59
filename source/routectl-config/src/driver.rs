//! The thin driver composing backup, merge or
//! remove, commit, and service restart into the single operation a
//! caller (the `routectl` CLI, or the integration test crate) invokes.
//!
//! The core never writes to stdout/stderr and never calls
//! `process::exit`; callers map [`OperationSummary`] and
//! [`crate::error::RouterConfigError`] onto their own UI or exit codes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::backup::{self, BackupHandle};
use crate::cancel::CancellationToken;
use crate::dedupe::Strategy;
use crate::error::{Result, RouterConfigError};
use crate::journal::Journal;
use crate::lock::{DirLock, LockTimeout};
use crate::merge::{self, MergeOptions};
use crate::remove;
use crate::service::{InitScriptController, RestartOptions, RestartReport, ServiceController, ServiceTables};

/// The option set shared by `merge` and `remove`.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub dry_run: bool,
    pub preserve_network: bool,
    pub preserve_existing: bool,
    /// Per-list-name dedupe [`Strategy`] overrides ("DedupeLists" in
    /// an override); unset list names fall back to auto-selection.
    pub list_strategy_overrides: HashMap<String, Strategy>,
    pub no_restart: bool,
    pub rollback_on_failure: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            preserve_network: true,
            preserve_existing: true,
            list_strategy_overrides: HashMap::new(),
            no_restart: false,
            rollback_on_failure: true,
        }
    }
}

impl DriverOptions {
    fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            dry_run: self.dry_run,
            preserve_network: self.preserve_network,
            preserve_existing: self.preserve_existing,
            list_strategy_overrides: self.list_strategy_overrides.clone(),
        }
    }

    fn restart_options(&self) -> RestartOptions {
        RestartOptions {
            dry_run: self.dry_run,
            rollback_on_failure: self.rollback_on_failure,
        }
    }
}

/// Per-operation report: the journal plus what the driver did with it.
/// This is what a CLI front-end renders to the user.
#[derive(Debug, Clone)]
pub struct OperationSummary {
    pub journal: Journal,
    pub modified_configs: Vec<String>,
    pub restart_report: Option<RestartReport>,
    /// The pre-operation snapshot taken at the start of this operation,
    /// so the caller can report "restored from backup `<path>`" if one
    /// was used for rollback.
    pub backup: BackupHandle,
    pub restored_from_backup: bool,
    pub ok: bool,
}

/// Per-config validation outcome.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub results: IndexMap<String, std::result::Result<(), RouterConfigError>>,
    pub ok: bool,
}

/// Composes [`crate::lock`], [`crate::backup`], [`crate::merge`] /
/// [`crate::remove`], and [`crate::service`] into a single operation.
/// Holds no process-wide state; every field is plain data passed in
/// at construction.
pub struct Driver {
    live_dir: PathBuf,
    backup_dir: PathBuf,
    tables: ServiceTables,
    controller: Box<dyn ServiceController>,
    lock_timeout: LockTimeout,
    backup_retention: usize,
}

impl Driver {
    /// A driver talking to real init scripts under `/etc/init.d`.
    pub fn new(live_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            live_dir: live_dir.into(),
            backup_dir: backup_dir.into(),
            tables: ServiceTables::default(),
            controller: Box::new(InitScriptController::default()),
            lock_timeout: LockTimeout::default(),
            backup_retention: 10,
        }
    }

    pub fn with_controller(mut self, controller: Box<dyn ServiceController>) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_tables(mut self, tables: ServiceTables) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: LockTimeout) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Number of backups kept per name under `backup_dir` (default 10).
    pub fn with_backup_retention(mut self, keep: usize) -> Self {
        self.backup_retention = keep;
        self
    }

    pub fn live_dir(&self) -> &Path {
        &self.live_dir
    }

    /// Merges `overlay_dir` into the live configuration directory,
    /// restarting affected services unless `opts.no_restart`. See
    /// [`Self::merge_with_cancellation`] for a cancellable variant.
    pub fn merge(&self, overlay_dir: &Path, opts: &DriverOptions) -> Result<OperationSummary> {
        self.merge_with_cancellation(overlay_dir, opts, &CancellationToken::new())
    }

    pub fn merge_with_cancellation(
        &self,
        overlay_dir: &Path,
        opts: &DriverOptions,
        cancel: &CancellationToken,
    ) -> Result<OperationSummary> {
        cancel.check()?;
        let _lock = DirLock::acquire(&self.live_dir, self.lock_timeout)?;
        cancel.check()?;

        let handle = self.take_backup("pre-merge")?;

        let merge_opts = opts.merge_options();
        let dir_result = merge::merge_directory(overlay_dir, &self.live_dir, &merge_opts, cancel)?;

        let mut journal = Journal::new();
        let mut modified_configs = Vec::new();
        let mut first_error: Option<RouterConfigError> = None;

        for (name, result) in &dir_result.results {
            match result {
                Ok(r) => {
                    journal.extend(r.journal.clone());
                    if r.modified {
                        modified_configs.push(name.clone());
                    }
                }
                Err(e) => {
                    warn!(config = %name, error = %e, "merge failed for config");
                    if first_error.is_none() {
                        first_error = Some(clone_error(e));
                    }
                }
            }
        }

        if !dir_result.ok {
            if !opts.dry_run {
                self.restore_backup(&handle);
            }
            return Err(first_error.unwrap_or(RouterConfigError::Validation {
                message: "merge failed for one or more configs".to_string(),
            }));
        }

        let restart_report = self.maybe_restart(&modified_configs, opts, &handle, cancel)?;

        if !opts.dry_run {
            self.evict_old_backups("pre-merge");
        }

        Ok(OperationSummary {
            journal,
            modified_configs,
            ok: true,
            restored_from_backup: false,
            restart_report,
            backup: handle,
        })
    }

    /// Removes, from the live configuration directory, every section an
    /// overlay section in `overlay_dir` matches, restarting
    /// affected services unless `opts.no_restart`.
    pub fn remove(&self, overlay_dir: &Path, opts: &DriverOptions) -> Result<OperationSummary> {
        self.remove_with_cancellation(overlay_dir, opts, &CancellationToken::new())
    }

    pub fn remove_with_cancellation(
        &self,
        overlay_dir: &Path,
        opts: &DriverOptions,
        cancel: &CancellationToken,
    ) -> Result<OperationSummary> {
        cancel.check()?;
        let _lock = DirLock::acquire(&self.live_dir, self.lock_timeout)?;
        cancel.check()?;

        let handle = self.take_backup("pre-remove")?;

        let merge_opts = opts.merge_options();
        let dir_result = remove::remove_directory(overlay_dir, &self.live_dir, &merge_opts, cancel)?;

        let mut journal = Journal::new();
        let mut modified_configs = Vec::new();
        let mut first_error: Option<RouterConfigError> = None;

        for (name, result) in &dir_result.results {
            match result {
                Ok(r) => {
                    journal.extend(r.journal.clone());
                    if r.modified {
                        modified_configs.push(name.clone());
                    }
                }
                Err(e) => {
                    warn!(config = %name, error = %e, "remove failed for config");
                    if first_error.is_none() {
                        first_error = Some(clone_error(e));
                    }
                }
            }
        }

        if !dir_result.ok {
            if !opts.dry_run {
                self.restore_backup(&handle);
            }
            return Err(first_error.unwrap_or(RouterConfigError::Validation {
                message: "remove failed for one or more configs".to_string(),
            }));
        }

        let restart_report = self.maybe_restart(&modified_configs, opts, &handle, cancel)?;

        if !opts.dry_run {
            self.evict_old_backups("pre-remove");
        }

        Ok(OperationSummary {
            journal,
            modified_configs,
            ok: true,
            restored_from_backup: false,
            restart_report,
            backup: handle,
        })
    }

    /// Captures a standalone snapshot of the live directory under
    /// `name`, independent of any
    /// merge/remove cycle.
    pub fn backup(&self, name: &str) -> Result<BackupHandle> {
        let _lock = DirLock::acquire(&self.live_dir, self.lock_timeout)?;
        self.take_backup(name)
    }

    /// Parses every regular file in the live directory and checks the
    /// invariants the codec doesn't already enforce structurally.
    pub fn validate(&self) -> Result<ValidationReport> {
        let mut report = ValidationReport {
            results: IndexMap::new(),
            ok: true,
        };

        if !self.live_dir.exists() {
            return Ok(report);
        }

        let mut names: Vec<String> = fs::read_dir(&self.live_dir)
            .map_err(|e| RouterConfigError::io(&self.live_dir, e))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();

        for name in names {
            let path = self.live_dir.join(&name);
            let result = fs::read_to_string(&path)
                .map_err(|e| RouterConfigError::io(&path, e))
                .and_then(|text| crate::codec::parse(&text, &path))
                .map(|_| ());
            if result.is_err() {
                report.ok = false;
            }
            report.results.insert(name, result);
        }

        Ok(report)
    }

    fn take_backup(&self, name: &str) -> Result<BackupHandle> {
        info!(name, live_dir = %self.live_dir.display(), "capturing backup");
        backup::backup(&self.live_dir, &self.backup_dir, name, SystemTime::now())
    }

    fn restore_backup(&self, handle: &BackupHandle) {
        info!(archive = %handle.archive_path.display(), "restoring configuration from backup");
        if let Err(e) = backup::restore(handle, &self.live_dir) {
            warn!(error = %e, "restore from backup failed");
        }
    }

    fn evict_old_backups(&self, name: &str) {
        if let Err(e) = backup::evict(&self.backup_dir, name, self.backup_retention) {
            warn!(error = %e, "backup eviction failed");
        }
    }

    /// Restarts the services implied by `modified_configs` unless
    /// `opts.no_restart`. On restart failure with `rollback_on_failure`,
    /// also restores the configuration files from `handle`, returning
    /// them to their pre-merge state, in addition to the orchestrator's
    /// own per-service rollback.
    fn maybe_restart(
        &self,
        modified_configs: &[String],
        opts: &DriverOptions,
        handle: &BackupHandle,
        cancel: &CancellationToken,
    ) -> Result<Option<RestartReport>> {
        if opts.no_restart || modified_configs.is_empty() {
            return Ok(None);
        }
        cancel.check()?;

        let restart_opts = opts.restart_options();
        let report = crate::service::restart_for(
            modified_configs,
            &self.tables,
            self.controller.as_ref(),
            &restart_opts,
            cancel,
        )?;

        if !report.ok {
            let (failed, attempted) = count_restart_outcomes(&report);
            if opts.rollback_on_failure && !opts.dry_run {
                self.restore_backup(handle);
            }
            return Err(RouterConfigError::ServiceFailed { failed, attempted });
        }

        Ok(Some(report))
    }
}

fn count_restart_outcomes(report: &RestartReport) -> (usize, usize) {
    let attempted = report
        .results
        .iter()
        .filter(|(_, r)| !r.unavailable)
        .count();
    let failed = report
        .results
        .iter()
        .filter(|(_, r)| !r.unavailable && r.outcome.as_ref().map(|o| !o.succeeded).unwrap_or(false))
        .count();
    (failed, attempted)
}

/// `RouterConfigError` doesn't derive `Clone` (it wraps `std::io::Error`,
/// which isn't `Clone`); this rebuilds an equivalent value for the cases
/// the driver needs to hold onto past the loop that produced it.
fn clone_error(e: &RouterConfigError) -> RouterConfigError {
    match e {
        RouterConfigError::Syntax { path, message } => RouterConfigError::Syntax {
            path: path.clone(),
            message: message.clone(),
        },
        RouterConfigError::TypeConflict { config, section, option } => RouterConfigError::TypeConflict {
            config: config.clone(),
            section: section.clone(),
            option: option.clone(),
        },
        RouterConfigError::FileNotFound { path } => RouterConfigError::FileNotFound { path: path.clone() },
        RouterConfigError::Io { path, source } => RouterConfigError::Io {
            path: path.clone(),
            source: std::io::Error::new(source.kind(), source.to_string()),
        },
        RouterConfigError::NetworkSafety { config, message } => RouterConfigError::NetworkSafety {
            config: config.clone(),
            message: message.clone(),
        },
        RouterConfigError::ServiceFailed { failed, attempted } => RouterConfigError::ServiceFailed {
            failed: *failed,
            attempted: *attempted,
        },
        RouterConfigError::Busy { path, timeout_ms } => RouterConfigError::Busy {
            path: path.clone(),
            timeout_ms: *timeout_ms,
        },
        RouterConfigError::Validation { message } => RouterConfigError::Validation {
            message: message.clone(),
        },
        RouterConfigError::Cancelled => RouterConfigError::Cancelled,
    }
}
