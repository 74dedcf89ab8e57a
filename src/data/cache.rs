use std::path::{Path, PathBuf};

use log::debug;
use serde_json::Value;

use crate::{error::FinvalResult, utils::fs::write_atomic};

pub fn cache_path(dir: &Path, symbol: &str) -> PathBuf {
    dir.join(format!("{symbol}_financials.json"))
}

/// Cached document, or `None` when nothing is cached yet.
pub async fn read(path: &Path) -> FinvalResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            debug!("[Cache] Hit {}", path.display());
            Ok(Some(content))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Replaces the cached document as a whole.
pub async fn write(path: &Path, document: &Value) -> FinvalResult<()> {
    let content = serde_json::to_vec_pretty(document)?;
    write_atomic(path, &content).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_cache_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = cache_path(dir.path(), "MSFT");
        assert!(path.ends_with("MSFT_financials.json"));

        assert_eq!(read(&path).await.unwrap(), None);

        write(&path, &json!({"Basic Info": {"symbol": "MSFT"}}))
            .await
            .unwrap();
        let content = read(&path).await.unwrap().unwrap();
        let json: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["Basic Info"]["symbol"], "MSFT");
    }
}
