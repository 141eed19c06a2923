use std::path::{Path, PathBuf};

use anyhow::bail;

pub const APP_NAME: &str = "gpa-tracker";
pub const DATABASE_ENV: &str = "GPA_TRACKER_DATABASE";
pub const DATABASE_FILE: &str = "database.sqlite3";

/// Picks the database file: explicit flag, then environment, then the user data directory.
pub fn resolve_database_path(
    explicit: Option<&Path>,
    env_value: Option<&str>,
    data_dir: Option<&Path>,
) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Some(value) = env_value.map(str::trim).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(value));
    }

    match data_dir {
        Some(dir) => Ok(dir.join(APP_NAME).join(DATABASE_FILE)),
        None => bail!(
            "could not determine a data directory; pass --database or set {DATABASE_ENV}"
        ),
    }
}

pub fn database_path_from_env(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    let env_value = std::env::var(DATABASE_ENV).ok();
    resolve_database_path(explicit, env_value.as_deref(), dirs::data_dir().as_deref())
}
