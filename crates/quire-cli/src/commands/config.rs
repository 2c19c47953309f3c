use std::path::Path;
use std::time::Duration;

use quire_core::SyncSettings;

use crate::cli::ConfigArgs;
use crate::error::CliError;

/// Show the settings file, writing it first when any flag was given.
///
/// Environment overrides are not applied here, so the output is what the
/// file itself holds.
pub fn run_config(args: &ConfigArgs, config_path: &Path) -> Result<(), CliError> {
    let mut settings = SyncSettings::load_from_path(config_path)?;
    if apply_config_changes(&mut settings, args)? {
        settings.save_to_path(config_path)?;
        tracing::info!("Updated sync settings at {}", config_path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        println!("file:             {}", config_path.display());
        for line in format_settings(&settings) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Apply every given flag; returns whether anything changed.
pub fn apply_config_changes(
    settings: &mut SyncSettings,
    args: &ConfigArgs,
) -> Result<bool, CliError> {
    let before = settings.clone();

    if let Some(policy) = args.conflict_policy.as_deref() {
        settings.conflict_policy = policy.parse()?;
    }
    if let Some(auto_sync) = args.auto_sync {
        settings.auto_sync = auto_sync;
    }
    if let Some(offline_mode) = args.offline_mode {
        settings.offline_mode = offline_mode;
    }
    if let Some(secs) = args.sync_interval_secs {
        settings.sync_interval = Duration::from_secs(secs);
    }
    if let Some(max_retries) = args.max_retries {
        settings.max_retries = max_retries;
    }
    if let Some(secs) = args.conflict_window_secs {
        settings.conflict_window = Duration::from_secs(secs);
    }
    if let Some(secs) = args.remote_timeout_secs {
        settings.remote_timeout = Duration::from_secs(secs);
    }
    if let Some(quota) = args.local_quota_bytes {
        settings.local_quota_bytes = quota;
    }

    settings.validate()?;
    Ok(*settings != before)
}

pub fn format_settings(settings: &SyncSettings) -> Vec<String> {
    vec![
        format!("conflict policy:  {}", settings.conflict_policy),
        format!("auto sync:        {}", settings.auto_sync),
        format!("offline mode:     {}", settings.offline_mode),
        format!("sync interval:    {}s", settings.sync_interval.as_secs()),
        format!("max retries:      {}", settings.max_retries),
        format!("conflict window:  {}s", settings.conflict_window.as_secs()),
        format!("remote timeout:   {}s", settings.remote_timeout.as_secs()),
        format!("local quota:      {} bytes", settings.local_quota_bytes),
    ]
}
