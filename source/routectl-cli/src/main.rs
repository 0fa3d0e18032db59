mod cli;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use routectl_config::driver::{Driver, DriverOptions, OperationSummary, ValidationReport};
use routectl_config::lock::LockTimeout;
use routectl_config::RouterConfigError;

use cli::{Cli, Command, MergeArgs};

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    let driver = Driver::new(cli.live_dir.clone(), cli.backup_dir.clone())
        .with_lock_timeout(LockTimeout(Duration::from_secs(cli.lock_timeout_secs)))
        .with_backup_retention(cli.backup_retention);

    let result = match &cli.command {
        Command::Merge(args) => driver.merge(&args.overlay_dir, &driver_options(args)).map(Report::Operation),
        Command::Remove(args) => driver.remove(&args.overlay_dir, &driver_options(args)).map(Report::Operation),
        Command::Backup { name } => driver.backup(name).map(|handle| {
            println!("backup written to {}", handle.archive_path.display());
            Report::Done
        }),
        Command::Validate => driver.validate().map(Report::Validation),
    };

    match result {
        Ok(Report::Operation(summary)) => {
            print_operation_summary(&summary);
            ExitCode::from(0)
        }
        Ok(Report::Validation(report)) => {
            print_validation_report(&report);
            ExitCode::from(if report.ok { 0 } else { 7 })
        }
        Ok(Report::Done) => ExitCode::from(0),
        Err(e) => {
            let code = e.exit_code() as u8;
            let service_failed = matches!(e, RouterConfigError::ServiceFailed { .. });
            eprintln!("{:?}", miette::Report::new(e));
            if service_failed {
                eprintln!("configuration has been restored from the pre-operation backup");
            }
            ExitCode::from(code)
        }
    }
}

enum Report {
    Operation(OperationSummary),
    Validation(ValidationReport),
    Done,
}

fn driver_options(args: &MergeArgs) -> DriverOptions {
    DriverOptions {
        dry_run: args.dry_run,
        preserve_network: !args.no_preserve_network,
        preserve_existing: !args.prefer_overlay,
        no_restart: args.no_restart,
        rollback_on_failure: !args.no_rollback,
        ..DriverOptions::default()
    }
}

fn print_operation_summary(summary: &OperationSummary) {
    println!(
        "{} config(s) modified: {}",
        summary.modified_configs.len(),
        summary.modified_configs.join(", ")
    );
    for record in summary.journal.records() {
        println!("  {record:?}");
    }
    if let Some(report) = &summary.restart_report {
        for (service, result) in &report.results {
            let state = if result.unavailable {
                "unavailable".to_string()
            } else {
                match &result.outcome {
                    Some(o) if o.succeeded => "restarted".to_string(),
                    Some(_) => "failed".to_string(),
                    None => "skipped".to_string(),
                }
            };
            println!("  service {service}: {state}");
        }
    }
}

fn print_validation_report(report: &ValidationReport) {
    for (name, result) in &report.results {
        match result {
            Ok(()) => println!("{name}: ok"),
            Err(e) => println!("{name}: {e}"),
        }
    }
}
