mod sqlite;

pub use sqlite::SqliteStorage;

use crate::config::ParritaConfig;
use crate::error::{ParritaError, Result};

/// Open the SQLite store at the configured path, creating parent
/// directories as needed.
pub fn open_from_config(config: &ParritaConfig) -> Result<SqliteStorage> {
    let path = match &config.storage.path {
        Some(p) => std::path::PathBuf::from(p),
        None => default_db_path()?,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ParritaError::Storage(format!("failed to create {parent:?}: {e}")))?;
    }
    SqliteStorage::open(&path)
}

/// Default SQLite path: `~/.config/parrita/parrita.db`
fn default_db_path() -> Result<std::path::PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("parrita").join("parrita.db"))
        .ok_or_else(|| ParritaError::Config("cannot determine config directory".to_string()))
}
