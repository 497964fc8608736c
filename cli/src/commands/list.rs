//! List command - preview the processes a kill would target.

use anyhow::Result;
use reallystop_core::domain::group_by_name;
use reallystop_core::{ConfigStore, ProcessRecord};

use super::{resolve_filter, truncate, FilterArgs};

pub async fn run(store: &ConfigStore, args: &FilterArgs, grouped: bool, json: bool) -> Result<()> {
    let filter = resolve_filter(store, args).await?;
    let matches = tokio::task::spawn_blocking(move || reallystop_core::preview(&filter)).await?;

    if grouped {
        let groups = group_by_name(&matches);
        if json {
            println!("{}", serde_json::to_string_pretty(&groups)?);
            return Ok(());
        }
        if groups.is_empty() {
            println!("No matching processes.");
            return Ok(());
        }

        println!("{:<24} {:<6} PATH", "PROCESS", "COUNT");
        println!("{}", "-".repeat(80));
        for group in &groups {
            println!(
                "{:<24} {:<6} {}",
                truncate(&group.name, 24),
                group.count,
                group.executable_path
            );
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("No matching processes.");
        return Ok(());
    }

    // Table header
    println!(
        "{:<8} {:<8} {:<24} {:<16} PATH",
        "PID", "PARENT", "PROCESS", "OWNER"
    );
    println!("{}", "-".repeat(80));

    for process in &matches {
        print_row(process);
    }

    println!("\nTotal: {} processes", matches.len());
    Ok(())
}

fn print_row(process: &ProcessRecord) {
    let parent = process
        .parent_pid
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    let owner = process.owner_sid.as_deref().unwrap_or("-");

    println!(
        "{:<8} {:<8} {:<24} {:<16} {}",
        process.pid,
        parent,
        truncate(&process.name, 24),
        truncate(owner, 16),
        process.executable_path
    );
}
