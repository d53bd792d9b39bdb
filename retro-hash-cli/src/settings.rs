//! Shared application settings (scan directory, config file location).
//!
//! The settings file is always `~/.config/retro-hash/settings.toml` and
//! scan-root resolution follows the same priority chain everywhere.

use std::io;
use std::path::{Path, PathBuf};

/// Canonical path to the settings file: `~/.config/retro-hash/settings.toml`.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("retro-hash").join("settings.toml")
}

/// Resolve the directory scanned for disc images using a priority chain:
///
/// 1. CLI override (if `Some`)
/// 2. Saved `scan.root` in `settings.toml`
/// 3. Current working directory
pub fn resolve_scan_root(cli_override: Option<PathBuf>) -> PathBuf {
    if let Some(p) = cli_override {
        return p;
    }
    if let Some(p) = load_scan_root() {
        return p;
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Read `scan.root` from `settings.toml`, if set.
fn load_scan_root() -> Option<PathBuf> {
    let contents = std::fs::read_to_string(settings_path()).ok()?;
    let doc: toml::Value = contents.parse().ok()?;
    let root = doc.get("scan")?.get("root")?.as_str()?;
    if root.is_empty() {
        None
    } else {
        Some(PathBuf::from(root))
    }
}

/// Save the scan root in `settings.toml`.
///
/// Uses `toml::Value` for a surgical update so unrelated fields in the
/// file are preserved.
pub fn save_scan_root(path: &Path) -> io::Result<()> {
    let settings = settings_path();
    let mut doc: toml::Value = if let Ok(contents) = std::fs::read_to_string(&settings) {
        contents
            .parse()
            .unwrap_or_else(|_| toml::Value::Table(Default::default()))
    } else {
        toml::Value::Table(Default::default())
    };

    let table = doc
        .as_table_mut()
        .ok_or_else(|| io::Error::other("settings.toml root is not a table"))?;
    let scan = table
        .entry("scan")
        .or_insert_with(|| toml::Value::Table(Default::default()));
    let scan_table = scan
        .as_table_mut()
        .ok_or_else(|| io::Error::other("[scan] is not a table"))?;
    scan_table.insert(
        "root".to_string(),
        toml::Value::String(path.to_string_lossy().into_owned()),
    );

    if let Some(parent) = settings.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let rendered = toml::to_string_pretty(&doc).map_err(io::Error::other)?;

    // Write atomically: temp file in the same directory, then rename
    let tmp = settings.with_extension("toml.tmp");
    std::fs::write(&tmp, rendered)?;
    std::fs::rename(&tmp, &settings)?;
    Ok(())
}
