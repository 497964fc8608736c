//! Kill command - terminate matching processes.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use reallystop_core::{
    ConfigStore, FilterConfiguration, OperationOutcome, OutcomeCode, TerminationFailure,
};
use serde::Serialize;
use tracing::{debug, warn};

use super::clean::{self, CleanReport};
use super::{resolve_filter, FilterArgs};

/// Machine-readable result of a kill run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KillReport<'a> {
    code: OutcomeCode,
    exit_code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<&'a TerminationFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cleaned: Option<&'a CleanReport>,
}

/// Kill with the given overrides, optionally cleaning `force_clean` afterwards.
pub async fn run(
    store: &ConfigStore,
    args: &FilterArgs,
    force_clean: Option<PathBuf>,
    json: bool,
) -> Result<u8> {
    let filter = resolve_filter(store, args).await?;
    execute(filter, force_clean, json).await
}

/// Kill with the persisted settings only.
///
/// When `forceClean` is set, the current directory is cleaned if it holds a
/// solution file.
pub async fn run_with_settings(store: &ConfigStore, json: bool) -> Result<u8> {
    let settings = store.load().await?;

    let clean_dir = if settings.force_clean {
        let cwd = std::env::current_dir()?;
        if clean::is_solution_dir(&cwd) {
            Some(cwd)
        } else {
            debug!(dir = %cwd.display(), "No solution file here, skipping force clean");
            None
        }
    } else {
        None
    };

    let filter = FilterArgs::default().apply(settings.to_filter());
    execute(filter, clean_dir, json).await
}

async fn execute(filter: FilterConfiguration, clean_dir: Option<PathBuf>, json: bool) -> Result<u8> {
    debug!(names = ?filter.names, "Resolved filter");
    let outcome = terminate_with_progress(filter).await?;

    // Cleanup runs whatever the kill outcome was.
    let cleaned = match clean_dir {
        Some(dir) => Some(tokio::task::spawn_blocking(move || clean::clean(&dir)).await?),
        None => None,
    };

    if json {
        let report = KillReport {
            code: outcome.code(),
            exit_code: outcome.exit_code(),
            message: outcome.to_string(),
            failure: outcome.failure(),
            cleaned: cleaned.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_outcome(&outcome);
        if let Some(report) = &cleaned {
            clean::print_report(report);
        }
    }

    Ok(outcome.exit_code() as u8)
}

/// Run the blocking engine off the runtime thread.
///
/// A spinner is drawn on stderr while it runs, but only when stderr is a
/// terminal.
async fn terminate_with_progress(filter: FilterConfiguration) -> Result<OperationOutcome> {
    let mut task = tokio::task::spawn_blocking(move || reallystop_core::terminate(&filter));

    if !atty::is(atty::Stream::Stderr) {
        return Ok(task.await?);
    }

    const FRAMES: [char; 4] = ['|', '/', '-', '\\'];
    let mut ticker = tokio::time::interval(Duration::from_millis(120));
    let mut frame = 0usize;

    let outcome = loop {
        tokio::select! {
            joined = &mut task => break joined?,
            _ = ticker.tick() => {
                eprint!("\r{} Looking for processes...", FRAMES[frame % FRAMES.len()]);
                frame += 1;
            }
        }
    };
    eprint!("\r{:width$}\r", "", width = 40);

    Ok(outcome)
}

fn print_outcome(outcome: &OperationOutcome) {
    match outcome {
        OperationOutcome::Success => println!("✓ {}", outcome),
        OperationOutcome::NotFound => println!("{}", outcome),
        OperationOutcome::Error(failure) => {
            warn!(pid = failure.pid, "Kill stopped at first failure");
            eprintln!("✗ {}", failure);
        }
    }
}
