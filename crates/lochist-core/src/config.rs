//! History settings.
//!
//! Read from `<project>/.history/config.toml`:
//!
//! ```toml
//! [backup]
//! enabled = true
//! limit_total_size = 104857600   # bytes; 0 or negative disables the limit
//!
//! [system]
//! local_history_debounce = 300   # seconds; 0 disables autosave
//!
//! [status]
//! sync_interval_secs = 300
//! refresh_delay_ms = 500
//! ```

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};
use crate::repository::HISTORY_DIR_NAME;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub backup: BackupConfig,
    pub system: SystemConfig,
    pub status: StatusConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,
    /// Byte ceiling for stored history. Values `<= 0` disable retention.
    pub limit_total_size: i64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit_total_size: 100 * 1024 * 1024,
        }
    }
}

impl BackupConfig {
    /// Whether a retention pass should run at all.
    pub fn retention_active(&self) -> bool {
        self.enabled && self.limit_total_size > 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Seconds of quiet after an edit before an autosave commit.
    pub local_history_debounce: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            local_history_debounce: 300,
        }
    }
}

impl SystemConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.local_history_debounce)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub sync_interval_secs: u64,
    pub refresh_delay_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: 300,
            refresh_delay_ms: 500,
        }
    }
}

impl StatusConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }
}

impl HistoryConfig {
    /// Load from an explicit file. A missing file yields defaults.
    pub fn load(path: &Path) -> HistoryResult<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Self::from_toml(&raw)
            .map_err(|e| HistoryError::Config(format!("{}: {e}", path.display())))
    }

    /// Load the config stored in a project's history directory.
    pub fn load_for_project(project: &Path) -> HistoryResult<Self> {
        Self::load(&Self::project_config_path(project))
    }

    pub fn project_config_path(project: &Path) -> std::path::PathBuf {
        project.join(HISTORY_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn to_toml(&self) -> HistoryResult<String> {
        toml::to_string_pretty(self).map_err(|e| HistoryError::Config(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> HistoryResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let c = HistoryConfig::default();
        assert!(c.backup.enabled);
        assert_eq!(c.backup.limit_total_size, 100 * 1024 * 1024);
        assert_eq!(c.system.local_history_debounce, 300);
        assert_eq!(c.status.refresh_delay(), Duration::from_millis(500));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let c = HistoryConfig::from_toml("[backup]\nlimit_total_size = 1024\n").unwrap();
        assert_eq!(c.backup.limit_total_size, 1024);
        assert!(c.backup.enabled);
        assert_eq!(c.status, StatusConfig::default());
    }

    #[test]
    fn retention_gate_uses_explicit_comparison() {
        let mut b = BackupConfig::default();
        b.limit_total_size = 0;
        assert!(!b.retention_active());
        b.limit_total_size = -5;
        assert!(!b.retention_active());
        b.limit_total_size = 1;
        assert!(b.retention_active());
        b.enabled = false;
        assert!(!b.retention_active());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let c = HistoryConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(c, HistoryConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[backup\nenabled = ").unwrap();
        assert!(matches!(HistoryConfig::load(&path), Err(HistoryError::Config(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut c = HistoryConfig::default();
        c.system.local_history_debounce = 0;
        c.save(&HistoryConfig::project_config_path(dir.path())).unwrap();
        assert_eq!(HistoryConfig::load_for_project(dir.path()).unwrap(), c);
    }
}
