// src/infra/paths.rs — Config and output locations
//
// All paths respect the CONSULTANT_HOME environment variable for isolation.
// When unset, everything lives under ~/.consultant/.

use std::path::PathBuf;

/// Returns the CONSULTANT_HOME override, if set.
fn consultant_home() -> Option<PathBuf> {
    std::env::var_os("CONSULTANT_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Configuration directory: $CONSULTANT_HOME/ or ~/.consultant/
///
/// Falls back to a relative `.consultant` when no home directory can be
/// determined (containers without a passwd entry).
pub fn config_dir() -> PathBuf {
    if let Some(home) = consultant_home() {
        return home;
    }
    match directories::BaseDirs::new() {
        Some(base) => base.home_dir().join(".consultant"),
        None => PathBuf::from(".consultant"),
    }
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Directory where `consult --save` writes report JSON files.
pub fn reports_dir() -> PathBuf {
    config_dir().join("reports")
}
