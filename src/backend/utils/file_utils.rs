use anyhow::{Context, Result};
use log::debug;
use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::fs;

/// Ensures a directory exists, creating it and all parent directories if necessary.
pub async fn ensure_directory<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !fs::try_exists(path).await.unwrap_or(false) {
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
        debug!("Created directory: {path:?}");
    }
    Ok(())
}

/// Ensures the parent directory of a file exists.
pub async fn ensure_parent_directory<P: AsRef<Path>>(file_path: P) -> Result<()> {
    if let Some(parent) = file_path.as_ref().parent() {
        ensure_directory(parent).await?;
    }
    Ok(())
}

/// Lower-case hex SHA-1 of a byte slice.
pub fn sha1_hex(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Checks if a file exists and optionally verifies its SHA-1 hash.
pub async fn verify_file<P: AsRef<Path>>(path: P, expected_sha1: Option<&str>) -> Result<bool> {
    let path = path.as_ref();

    if !fs::try_exists(path).await.unwrap_or(false) {
        return Ok(false);
    }

    if let Some(expected_sha1) = expected_sha1 {
        let content = fs::read(path).await?;
        let computed_hash = sha1_hex(&content);

        if !computed_hash.eq_ignore_ascii_case(expected_sha1) {
            debug!("SHA1 mismatch for {path:?}: expected {expected_sha1}, got {computed_hash}");
            return Ok(false);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_of_known_input() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[tokio::test]
    async fn verify_file_checks_presence_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");

        assert!(!verify_file(&file, None).await.unwrap());

        tokio::fs::write(&file, b"abc").await.unwrap();
        assert!(verify_file(&file, None).await.unwrap());
        assert!(
            verify_file(&file, Some("A9993E364706816ABA3E25717850C26C9CD0D89D"))
                .await
                .unwrap()
        );
        assert!(!verify_file(&file, Some("deadbeef")).await.unwrap());
    }

    #[tokio::test]
    async fn ensure_directory_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("mods");

        ensure_directory(&nested).await.unwrap();
        ensure_directory(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}
