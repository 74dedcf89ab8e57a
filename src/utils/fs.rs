use std::{
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
};

use log::debug;

use crate::error::{FinvalError, FinvalResult};

/// Writes `contents` to a sibling temp file and renames it over `path`, so
/// readers see either the previous file or the complete new one.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> FinvalResult<()> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or(FinvalError::Invalid(
            "INVALID_FILE_PATH",
            format!("Path '{}' has no file name", path.display()),
        ))?;

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(dir).await?;
        }
    }

    // Unique per call, concurrent writers of one path must not share a temp file
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp_path = path.with_file_name(format!(".{file_name}.{}.{seq}.tmp", std::process::id()));
    tokio::fs::write(&tmp_path, contents).await?;

    if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }
    debug!("[Write] {}", path.display());

    Ok(())
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("result.json");

        write_atomic(&path, b"old").await.unwrap();
        write_atomic(&path, b"new").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_last_one_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");

        let payloads: Vec<String> = (0..32).map(|i| format!("{i}").repeat(4096)).collect();
        let handles: Vec<_> = payloads
            .iter()
            .cloned()
            .map(|payload| {
                let path = path.clone();
                tokio::spawn(async move { write_atomic(&path, payload.as_bytes()).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(payloads.contains(&content));

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
