use quire_core::models::SyncConflict;
use quire_core::storage::StorageUsage;
use quire_core::sync::{ConflictDetails, DrainOutcome, SyncReport, SyncStatus};
use quire_core::HybridStorage;
use serde::Serialize;

use crate::commands::common::{
    format_conflict_lines, format_resolved_conflict_lines, format_sync_timestamp,
};
use crate::error::CliError;

const RECENT_CONFLICT_LIMIT: usize = 20;

#[derive(Debug, Serialize)]
pub struct ConflictReport {
    pub pending: Vec<ConflictDetails>,
    pub resolved: Vec<SyncConflict>,
}

pub async fn run_sync(as_json: bool, storage: &HybridStorage) -> Result<(), CliError> {
    let report = storage.sync_now().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_sync_report(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn run_status(as_json: bool, storage: &HybridStorage) -> Result<(), CliError> {
    let status = storage.status();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        for line in format_status(&status) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_conflicts(as_json: bool, storage: &HybridStorage) -> Result<(), CliError> {
    let report = ConflictReport {
        pending: storage.pending_conflicts().await,
        resolved: storage.recent_conflicts(RECENT_CONFLICT_LIMIT),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.pending.is_empty() && report.resolved.is_empty() {
        println!("No sync conflicts.");
        return Ok(());
    }

    if !report.pending.is_empty() {
        println!("Unresolved:");
        for line in format_conflict_lines(&report.pending) {
            println!("  {line}");
        }
    }
    if !report.resolved.is_empty() {
        println!("Resolved this session:");
        for line in format_resolved_conflict_lines(&report.resolved) {
            println!("  {line}");
        }
    }
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    let mut lines = Vec::new();
    match report.drain {
        DrainOutcome::Completed(drain) => lines.push(format!(
            "Queue: {} replayed, {} requeued, {} dropped",
            drain.replayed, drain.requeued, drain.dropped
        )),
        DrainOutcome::Skipped => lines.push("Queue: skipped".to_string()),
    }
    lines.push(format!(
        "Reconcile: {} downloaded, {} uploaded, {} conflicts, {} errors",
        report.stats.downloaded, report.stats.uploaded, report.stats.conflicts, report.stats.errors
    ));
    lines.push(format!(
        "Sync completed at {}",
        format_sync_timestamp(report.completed_at)
    ));
    lines
}

pub fn format_status(status: &SyncStatus) -> Vec<String> {
    let last_sync = status
        .last_sync_at
        .map_or_else(|| "never".to_string(), format_sync_timestamp);
    let remote = if status.remote_configured {
        "configured"
    } else {
        "not configured"
    };

    vec![
        format!("state:            {}", status.state.label()),
        format!("backend:          {}", status.backend.as_str()),
        format!("online:           {}", status.online),
        format!("remote:           {remote}"),
        format!("offline mode:     {}", status.offline_mode),
        format!("pending writes:   {}", status.pending_operations),
        format!("conflict policy:  {}", status.conflict_policy),
        format!("last sync:        {last_sync}"),
        format!("local storage:    {}", format_storage_usage(status.storage)),
    ]
}

pub fn format_storage_usage(usage: Option<StorageUsage>) -> String {
    let Some(usage) = usage else {
        return "unknown".to_string();
    };
    match (usage.quota_bytes, usage.ratio()) {
        (Some(quota), Some(ratio)) => {
            let warning = if usage.is_nearly_full() { " (nearly full)" } else { "" };
            format!(
                "{} of {quota} bytes ({:.0}%){warning}",
                usage.used_bytes,
                ratio * 100.0
            )
        }
        _ => format!("{} bytes", usage.used_bytes),
    }
}
