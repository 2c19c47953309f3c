//! Synchronizer settings.
//!
//! `SyncSettings` is read from an optional JSON file and then adjusted by
//! `QUIRE_*` environment variables. Every field has a default, so an empty
//! or missing file yields a working configuration.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::ConflictPolicy;
use crate::storage::DEFAULT_QUOTA_BYTES;
use crate::util::normalize_text_option;

const ENV_OFFLINE: &str = "QUIRE_OFFLINE";
const ENV_CONFLICT_POLICY: &str = "QUIRE_CONFLICT_POLICY";
const ENV_CONFLICT_WINDOW_SECS: &str = "QUIRE_CONFLICT_WINDOW_SECS";
const ENV_MAX_RETRIES: &str = "QUIRE_MAX_RETRIES";

/// Shortest accepted background sync period.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Tunables for the hybrid synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Run drain + reconcile at startup and when connectivity returns
    pub auto_sync: bool,
    /// Never contact the remote store
    pub offline_mode: bool,
    /// Period of the background queue drain
    #[serde(rename = "sync_interval_secs", with = "secs")]
    pub sync_interval: Duration,
    /// Failed replays of one queue entry before it is dropped
    pub max_retries: u32,
    /// Two versions edited closer together than this may conflict
    #[serde(rename = "conflict_window_secs", with = "secs")]
    pub conflict_window: Duration,
    #[serde(rename = "remote_timeout_secs", with = "secs")]
    pub remote_timeout: Duration,
    pub conflict_policy: ConflictPolicy,
    pub local_quota_bytes: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync: true,
            offline_mode: false,
            sync_interval: Duration::from_secs(300),
            max_retries: 3,
            conflict_window: Duration::from_secs(300),
            remote_timeout: Duration::from_secs(15),
            conflict_policy: ConflictPolicy::default(),
            local_quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

impl SyncSettings {
    /// Load settings from `path` (when given and present) plus environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read a settings file; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_json::from_str(&raw).map_err(|error| {
            Error::InvalidInput(format!(
                "invalid settings file {}: {error}",
                path.display()
            ))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the synchronizer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sync_interval < MIN_SYNC_INTERVAL {
            return Err(Error::InvalidInput(format!(
                "sync_interval_secs must be at least {}",
                MIN_SYNC_INTERVAL.as_secs()
            )));
        }
        if self.remote_timeout.is_zero() {
            return Err(Error::InvalidInput(
                "remote_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.local_quota_bytes == 0 {
            return Err(Error::InvalidInput(
                "local_quota_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Write settings as pretty JSON, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = normalize_text_option(lookup(ENV_OFFLINE)) {
            self.offline_mode = parse_bool(ENV_OFFLINE, &raw)?;
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_CONFLICT_POLICY)) {
            self.conflict_policy = raw.parse()?;
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_CONFLICT_WINDOW_SECS)) {
            self.conflict_window = Duration::from_secs(parse_number(ENV_CONFLICT_WINDOW_SECS, &raw)?);
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_MAX_RETRIES)) {
            self.max_retries = parse_number(ENV_MAX_RETRIES, &raw)?;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{key} must be a boolean (got '{raw}')"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::InvalidInput(format!("{key} must be a number (got '{raw}')")))
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<HashMap<_, _>>();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SyncSettings::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.conflict_window, Duration::from_secs(300));
        assert_eq!(settings.remote_timeout, Duration::from_secs(15));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"conflict_policy": "merge", "conflict_window_secs": 60}"#,
        )
        .unwrap();

        let settings = SyncSettings::load_from_path(&path).unwrap();
        assert_eq!(settings.conflict_policy, ConflictPolicy::Merge);
        assert_eq!(settings.conflict_window, Duration::from_secs(60));
        assert_eq!(settings.max_retries, 3);
        assert!(settings.auto_sync);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"conflict_windw_secs": 60}"#).unwrap();

        let error = SyncSettings::load_from_path(&path).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = SyncSettings {
            offline_mode: true,
            max_retries: 5,
            ..SyncSettings::default()
        };
        settings.save_to_path(&path).unwrap();
        assert_eq!(SyncSettings::load_from_path(&path).unwrap(), settings);
    }

    #[test]
    fn zero_sync_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"sync_interval_secs": 0}"#).unwrap();

        let error = SyncSettings::load(Some(path.as_path())).unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert!(error.to_string().contains("sync_interval_secs"));

        let settings = SyncSettings {
            sync_interval: Duration::ZERO,
            ..SyncSettings::default()
        };
        assert!(settings.save_to_path(&path).is_err());
    }

    #[test]
    fn zero_remote_timeout_is_rejected() {
        let settings = SyncSettings {
            remote_timeout: Duration::ZERO,
            ..SyncSettings::default()
        };
        assert!(settings.validate().is_err());
        assert!(SyncSettings::default().validate().is_ok());
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = SyncSettings::default();
        settings
            .apply_overrides(lookup(&[
                (ENV_OFFLINE, "yes"),
                (ENV_CONFLICT_POLICY, "cloud_wins"),
                (ENV_CONFLICT_WINDOW_SECS, "30"),
                (ENV_MAX_RETRIES, "7"),
            ]))
            .unwrap();
        assert!(settings.offline_mode);
        assert_eq!(settings.conflict_policy, ConflictPolicy::CloudWins);
        assert_eq!(settings.conflict_window, Duration::from_secs(30));
        assert_eq!(settings.max_retries, 7);
    }

    #[test]
    fn invalid_env_override_is_an_error() {
        let mut settings = SyncSettings::default();
        let error = settings
            .apply_overrides(lookup(&[(ENV_MAX_RETRIES, "many")]))
            .unwrap_err();
        assert!(error.to_string().contains(ENV_MAX_RETRIES));
    }
}
