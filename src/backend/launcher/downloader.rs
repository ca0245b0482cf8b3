//! HTTP downloading for manifests, profiles, libraries and assets.

use anyhow::{Context, Result, anyhow};
use futures_util::StreamExt;
use futures_util::stream;
use log::debug;
use reqwest::Client;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::backend::utils::file_utils::{ensure_parent_directory, verify_file};

const USER_AGENT: &str = concat!("XasLauncher/", env!("CARGO_PKG_VERSION"));

/// A file to fetch, optionally checked against a SHA-1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub destination: PathBuf,
    pub expected_sha1: Option<String>,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, destination: PathBuf) -> Self {
        Self {
            url: url.into(),
            destination,
            expected_sha1: None,
        }
    }

    pub fn with_sha1(mut self, sha1: Option<String>) -> Self {
        self.expected_sha1 = sha1;
        self
    }
}

#[derive(Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// Fetches and decodes a JSON document. One attempt, no retries.
    pub async fn get_json<T>(&self, url: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        debug!("Fetching JSON from {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Failed to fetch {url}: HTTP {status}"));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Malformed JSON from {url}"))
    }

    /// Downloads a file unless it is already present with the right hash.
    pub async fn download_file(
        &self,
        url: &str,
        destination: &Path,
        expected_sha1: Option<&str>,
    ) -> Result<()> {
        // Without a hash, an existing file is trusted
        if verify_file(destination, expected_sha1).await? {
            debug!("File already up to date: {destination:?}");
            return Ok(());
        }

        ensure_parent_directory(destination).await?;
        debug!("Downloading {url} to {destination:?}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Failed to download {url}: HTTP {}",
                response.status()
            ));
        }

        // Write to a sibling temp file so an interrupted download never
        // looks complete.
        let mut partial = destination.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        let mut file = File::create(&partial)
            .await
            .with_context(|| format!("Failed to create {}", partial.display()))?;
        let mut stream = response.bytes_stream();
        let mut hasher = expected_sha1.map(|_| Sha1::new());

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Download of {url} interrupted"))?;
            file.write_all(&chunk).await?;

            if let Some(ref mut hasher) = hasher {
                hasher.update(&chunk);
            }
        }

        file.flush().await?;
        drop(file);

        if let (Some(expected), Some(hasher)) = (expected_sha1, hasher) {
            let computed_hash = hex::encode(hasher.finalize());
            if !computed_hash.eq_ignore_ascii_case(expected) {
                tokio::fs::remove_file(&partial).await?;
                return Err(anyhow!(
                    "Hash mismatch for {url}: expected {expected}, got {computed_hash}"
                ));
            }
        }

        tokio::fs::rename(&partial, destination)
            .await
            .with_context(|| format!("Failed to move download into {}", destination.display()))?;

        Ok(())
    }

    /// Runs `downloads` with at most `max_concurrent` in flight; the first
    /// failure is returned.
    pub async fn download_multiple(
        &self,
        downloads: Vec<DownloadTask>,
        max_concurrent: usize,
    ) -> Result<()> {
        let total = downloads.len();
        let tasks = downloads.into_iter().map(|task| async move {
            self.download_file(&task.url, &task.destination, task.expected_sha1.as_deref())
                .await
        });

        let mut stream = stream::iter(tasks).buffer_unordered(max_concurrent.max(1));
        while let Some(result) = stream.next().await {
            result?;
        }

        debug!("Finished {total} downloads");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::utils::file_utils::sha1_hex;

    #[tokio::test]
    async fn existing_file_with_matching_hash_is_not_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("client.jar");
        tokio::fs::write(&destination, b"jar bytes").await.unwrap();
        let sha1 = sha1_hex(b"jar bytes");

        // The URL is unreachable; succeeding proves no request was made.
        let downloader = HttpDownloader::new().unwrap();
        downloader
            .download_file("http://127.0.0.1:9/client.jar", &destination, Some(&sha1))
            .await
            .unwrap();
    }

    #[test]
    fn task_builder_sets_hash() {
        let task = DownloadTask::new("https://example.invalid/a", PathBuf::from("a"))
            .with_sha1(Some("abc".into()));
        assert_eq!(task.expected_sha1.as_deref(), Some("abc"));
    }
}
