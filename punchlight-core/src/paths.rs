use std::path::{Path, PathBuf};

/// Endpoint identifier the browser registers the native host under.
pub const NATIVE_APP_NAME: &str = "com.punchup.light";

pub const SETTINGS_FILE: &str = "settings.yaml";
pub const LIGHT_CACHE_FILE: &str = "light-cache.json";

pub fn punchlight_root(home: &Path) -> PathBuf {
    home.join(".punchlight")
}

pub fn settings_path(home: &Path) -> PathBuf {
    punchlight_root(home).join(SETTINGS_FILE)
}

pub fn light_cache_path(home: &Path) -> PathBuf {
    punchlight_root(home).join(LIGHT_CACHE_FILE)
}
