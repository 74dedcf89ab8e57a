use std::path::PathBuf;

use crate::APP_DATA_DIR;

pub async fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Root of cached statements, exports and configs.
pub fn data_dir() -> PathBuf {
    APP_DATA_DIR.clone()
}
