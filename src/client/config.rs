//! Config file persistence
//!
//! Configs are stored as pretty JSON and written atomically via a temp file
//! and rename.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use super::ClientConfig;
use super::error::{ConfigError, ConfigResult};

/// Load and validate a config file.
pub fn load_config(path: &Path) -> ConfigResult<ClientConfig> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let data = fs::read(path)?;
    let config: ClientConfig = serde_json::from_slice(&data)?;
    config.validate()?;
    Ok(config)
}

/// Validate and write `config` to `path`, creating parent directories.
pub fn write_config(path: &Path, config: &ClientConfig) -> ConfigResult<()> {
    config.validate()?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_vec_pretty(config)?;
    write_atomic(path, &json)
}

/// Write data atomically: temp file, sync, rename, sync parent.
pub fn write_atomic(path: &Path, data: &[u8]) -> ConfigResult<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = OpenOptions::new().read(true).open(parent)?;
            dir.sync_all()?;
        }
    }

    Ok(())
}
