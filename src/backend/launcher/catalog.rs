//! Version catalog: the list of installable versions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::downloader::HttpDownloader;
use super::models::{VersionDescriptor, VersionInfo, VersionManifest};
use crate::backend::utils::paths::{get_version_json_path, get_versions_dir};
use crate::utils::error::{self, LaunchError};

/// Source of installable versions.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Lists versions in catalog order. One attempt per call.
    async fn fetch_versions(&self) -> error::Result<Vec<VersionDescriptor>>;
}

#[async_trait]
impl<T: CatalogClient + ?Sized> CatalogClient for Arc<T> {
    async fn fetch_versions(&self) -> error::Result<Vec<VersionDescriptor>> {
        (**self).fetch_versions().await
    }
}

/// Catalog backed by Mojang's version manifest, optionally extended with
/// versions that only exist on disk.
pub struct MojangCatalog {
    downloader: HttpDownloader,
    manifest_url: String,
    game_dir: PathBuf,
    include_local: bool,
    manifest: RwLock<Option<Arc<VersionManifest>>>,
}

impl MojangCatalog {
    pub fn new(
        downloader: HttpDownloader,
        manifest_url: impl Into<String>,
        game_dir: PathBuf,
        include_local: bool,
    ) -> Self {
        Self {
            downloader,
            manifest_url: manifest_url.into(),
            game_dir,
            include_local,
            manifest: RwLock::new(None),
        }
    }

    /// Downloads the manifest and caches it for later lookups.
    pub async fn update_manifest(&self) -> Result<Arc<VersionManifest>> {
        info!("Fetching version manifest from {}", self.manifest_url);

        let manifest: VersionManifest = self
            .downloader
            .get_json(&self.manifest_url)
            .await
            .context("Version manifest unavailable")?;
        let manifest = Arc::new(manifest);

        *self.manifest.write().await = Some(manifest.clone());
        info!("Fetched {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    /// Manifest entry for `version_id`, fetching the manifest if not cached yet.
    pub async fn version_info(&self, version_id: &str) -> Result<Option<VersionInfo>> {
        let cached = self.manifest.read().await.clone();
        let manifest = match cached {
            Some(manifest) => manifest,
            None => self.update_manifest().await?,
        };
        Ok(manifest.get_version(version_id).cloned())
    }
}

#[async_trait]
impl CatalogClient for MojangCatalog {
    async fn fetch_versions(&self) -> error::Result<Vec<VersionDescriptor>> {
        let manifest = self
            .update_manifest()
            .await
            .map_err(|e| LaunchError::catalog(&e))?;
        let remote = descriptors_from_manifest(&manifest);

        if !self.include_local {
            return Ok(remote);
        }

        let local = match scan_local_versions(&self.game_dir).await {
            Ok(local) => local,
            Err(e) => {
                warn!("Failed to scan local versions: {e:#}");
                Vec::new()
            }
        };
        Ok(merge_local(remote, local))
    }
}

/// Descriptors in manifest order.
pub fn descriptors_from_manifest(manifest: &VersionManifest) -> Vec<VersionDescriptor> {
    manifest.versions.iter().map(VersionDescriptor::from).collect()
}

/// Marks remote versions that are installed and appends local-only ones.
///
/// Remote order is never changed.
pub fn merge_local(
    mut remote: Vec<VersionDescriptor>,
    local: Vec<String>,
) -> Vec<VersionDescriptor> {
    let local_set: HashSet<&str> = local.iter().map(String::as_str).collect();
    for descriptor in &mut remote {
        descriptor.installed_locally = local_set.contains(descriptor.name.as_str());
    }

    let remote_names: HashSet<String> = remote.iter().map(|d| d.name.clone()).collect();
    remote.extend(
        local
            .into_iter()
            .filter(|name| !remote_names.contains(name))
            .map(|name| VersionDescriptor {
                installed_locally: true,
                ..VersionDescriptor::new(name)
            }),
    );
    remote
}

/// Names of installed versions (`versions/<id>/<id>.json`), sorted.
pub async fn scan_local_versions(game_dir: &Path) -> Result<Vec<String>> {
    let versions_dir = get_versions_dir(game_dir);
    if !tokio::fs::try_exists(&versions_dir).await.unwrap_or(false) {
        return Ok(Vec::new());
    }

    let mut entries = tokio::fs::read_dir(&versions_dir)
        .await
        .with_context(|| format!("Failed to read {}", versions_dir.display()))?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if tokio::fs::try_exists(get_version_json_path(game_dir, &name))
            .await
            .unwrap_or(false)
        {
            names.push(name);
        }
    }

    names.sort();
    debug!("Found {} local versions", names.len());
    Ok(names)
}
