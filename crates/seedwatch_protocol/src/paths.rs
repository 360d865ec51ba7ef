//! Where seedwatch keeps its files: `$SEEDWATCH_HOME`, else `~/.seedwatch`.

use std::path::{Path, PathBuf};
use std::sync::Once;

const HOME_ENV: &str = "SEEDWATCH_HOME";
const HOME_DIR_NAME: &str = ".seedwatch";

static MKDIR_FAILURE_REPORTED: Once = Once::new();

/// The seedwatch home directory, from the process environment.
pub fn seedwatch_home() -> PathBuf {
    home_from(|key| std::env::var(key).ok())
}

/// Resolve the home directory with `lookup` standing in for the environment.
/// `SEEDWATCH_HOME` wins, then `HOME`, then `USERPROFILE`, then the working
/// directory.
pub fn home_from(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(explicit) = lookup(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(explicit);
    }
    let user_home = lookup("HOME")
        .filter(|v| !v.is_empty())
        .or_else(|| lookup("USERPROFILE").filter(|v| !v.is_empty()));
    match user_home {
        Some(home) => Path::new(&home).join(HOME_DIR_NAME),
        None => Path::new(".").join(HOME_DIR_NAME),
    }
}

/// `~/.seedwatch/config.toml`. Reading it is optional, so nothing is created.
pub fn default_config_path() -> PathBuf {
    seedwatch_home().join("config.toml")
}

/// `~/.seedwatch/logs`. Creates the home directory, warning once on failure.
pub fn default_logs_dir() -> PathBuf {
    let home = seedwatch_home();
    if let Err(err) = std::fs::create_dir_all(&home) {
        MKDIR_FAILURE_REPORTED.call_once(|| {
            eprintln!(
                "Warning: cannot create {} ({}); set {} to a writable directory",
                home.display(),
                err,
                HOME_ENV
            );
        });
    }
    home.join("logs")
}
