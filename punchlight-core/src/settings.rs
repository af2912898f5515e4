//! Key-value settings persisted as YAML.
//!
//! # Storage layout
//!
//! ```text
//! ~/.punchlight/
//!   settings.yaml      (mode 0600)
//!   light-cache.json   (last discovered bulb address, owned by the host)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::paths::{punchlight_root, settings_path};
use crate::types::{AlertTime, PunchReport};

/// Everything the background side remembers between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub alert_time: AlertTime,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Most recent report; older ones are not kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub punch_data: Option<PunchReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visit_time: Option<DateTime<Utc>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alert_time: AlertTime::default(),
            enabled: default_enabled(),
            punch_data: None,
            last_update: None,
            last_visit_time: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load settings from `<home>/.punchlight/settings.yaml`. A missing file
/// yields defaults.
pub fn load_at(home: &Path) -> Result<Settings, CoreError> {
    let path = settings_path(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, CoreError> {
    load_at(&home()?)
}

/// Atomically save settings.
///
/// Write flow: serialize → `settings.yaml.tmp` → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, settings: &Settings) -> Result<(), CoreError> {
    ensure_root(home)?;
    let path = settings_path(home);
    let tmp_path = path.with_file_name("settings.yaml.tmp");

    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(settings: &Settings) -> Result<(), CoreError> {
    save_at(&home()?, settings)
}

/// Store a freshly scraped report. Replaces the previous report and stamps
/// both `lastUpdate` and `lastVisitTime` with `now`.
pub fn record_report_at(
    home: &Path,
    report: PunchReport,
    now: DateTime<Utc>,
) -> Result<Settings, CoreError> {
    let mut settings = load_at(home)?;
    settings.punch_data = Some(report);
    settings.last_update = Some(now);
    settings.last_visit_time = Some(now);
    save_at(home, &settings)?;
    Ok(settings)
}

/// `record_report_at` convenience wrapper.
pub fn record_report(report: PunchReport, now: DateTime<Utc>) -> Result<Settings, CoreError> {
    record_report_at(&home()?, report, now)
}

/// Create `<home>/.punchlight/` (mode `0700`) if absent.
pub fn ensure_root(home: &Path) -> Result<PathBuf, CoreError> {
    let dir = punchlight_root(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
