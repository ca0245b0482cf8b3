//! Mod loader installation.
//!
//! Installing a loader produces a new version profile in `versions/` that
//! inherits from the base version. The returned id is what gets launched.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::downloader::HttpDownloader;
use super::models::LoaderKind;
use crate::backend::utils::file_utils::{ensure_directory, ensure_parent_directory};
use crate::backend::utils::paths::get_version_json_path;

const FABRIC_META: &str = "https://meta.fabricmc.net/v2";
const FORGE_PROMOTIONS: &str =
    "https://files.minecraftforge.net/net/minecraftforge/forge/promotions_slim.json";
const FORGE_MAVEN: &str = "https://maven.minecraftforge.net/net/minecraftforge/forge";

/// Installs a loader variant of a base version.
#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    /// Returns the id of the installed loader profile.
    ///
    /// `silent` asks for a headless install that opens no windows.
    async fn install(&self, loader: LoaderKind, version_id: &str, silent: bool) -> Result<String>;
}

/// Dispatches to the installer for the requested loader.
pub struct ModLoaderInstaller {
    fabric: FabricInstaller,
    forge: ForgeInstaller,
}

impl ModLoaderInstaller {
    pub fn new(fabric: FabricInstaller, forge: ForgeInstaller) -> Self {
        Self { fabric, forge }
    }
}

#[async_trait]
impl LoaderInstaller for ModLoaderInstaller {
    async fn install(&self, loader: LoaderKind, version_id: &str, silent: bool) -> Result<String> {
        match loader {
            LoaderKind::None => Ok(version_id.to_string()),
            LoaderKind::Fabric => self.fabric.install(version_id).await,
            LoaderKind::Forge => self.forge.install(version_id, silent).await,
        }
    }
}

// Fabric

#[derive(Debug, Deserialize)]
struct FabricLoaderEntry {
    loader: FabricLoaderVersion,
}

#[derive(Debug, Deserialize)]
struct FabricLoaderVersion {
    version: String,
    #[serde(default)]
    stable: bool,
}

/// Installs Fabric by writing the launcher profile served by Fabric's meta API.
pub struct FabricInstaller {
    downloader: HttpDownloader,
    game_dir: PathBuf,
    meta_url: String,
}

impl FabricInstaller {
    pub fn new(downloader: HttpDownloader, game_dir: PathBuf) -> Self {
        Self {
            downloader,
            game_dir,
            meta_url: FABRIC_META.to_string(),
        }
    }

    pub async fn install(&self, version_id: &str) -> Result<String> {
        info!("Installing Fabric for {version_id}");

        let entries: Vec<FabricLoaderEntry> = self
            .downloader
            .get_json(&format!("{}/versions/loader/{version_id}", self.meta_url))
            .await
            .context("Failed to list Fabric loader versions")?;

        let loader_version = pick_fabric_loader(&entries)
            .ok_or_else(|| anyhow!("Fabric is not available for Minecraft {version_id}"))?;
        debug!("Selected Fabric loader {loader_version}");

        let profile: serde_json::Value = self
            .downloader
            .get_json(&format!(
                "{}/versions/loader/{version_id}/{loader_version}/profile/json",
                self.meta_url
            ))
            .await
            .context("Failed to fetch Fabric profile")?;

        let profile_id = profile
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| anyhow!("Fabric profile has no id"))?
            .to_string();

        let profile_path = get_version_json_path(&self.game_dir, &profile_id);
        ensure_parent_directory(&profile_path).await?;
        tokio::fs::write(&profile_path, serde_json::to_vec_pretty(&profile)?)
            .await
            .with_context(|| format!("Failed to write {}", profile_path.display()))?;

        info!("Fabric installed as {profile_id}");
        Ok(profile_id)
    }
}

/// First stable loader, or the newest one if none is marked stable.
fn pick_fabric_loader(entries: &[FabricLoaderEntry]) -> Option<&str> {
    entries
        .iter()
        .find(|entry| entry.loader.stable)
        .or_else(|| entries.first())
        .map(|entry| entry.loader.version.as_str())
}

// Forge

#[derive(Debug, Deserialize)]
struct ForgePromotions {
    promos: HashMap<String, String>,
}

/// Installs Forge by running its official installer in client mode.
pub struct ForgeInstaller {
    downloader: HttpDownloader,
    game_dir: PathBuf,
    cache_dir: PathBuf,
    java_path: PathBuf,
}

impl ForgeInstaller {
    pub fn new(
        downloader: HttpDownloader,
        game_dir: PathBuf,
        cache_dir: PathBuf,
        java_path: PathBuf,
    ) -> Self {
        Self {
            downloader,
            game_dir,
            cache_dir,
            java_path,
        }
    }

    pub async fn install(&self, version_id: &str, silent: bool) -> Result<String> {
        info!("Installing Forge for {version_id}");

        let promotions: ForgePromotions = self
            .downloader
            .get_json(FORGE_PROMOTIONS)
            .await
            .context("Failed to fetch Forge promotions")?;

        let forge_version = pick_forge_version(&promotions.promos, version_id)
            .ok_or_else(|| anyhow!("Forge is not available for Minecraft {version_id}"))?;
        let profile_id = forge_profile_id(version_id, forge_version);

        if tokio::fs::try_exists(get_version_json_path(&self.game_dir, &profile_id))
            .await
            .unwrap_or(false)
        {
            info!("Forge {forge_version} already installed as {profile_id}");
            return Ok(profile_id);
        }

        let full_version = format!("{version_id}-{forge_version}");
        let installer_url =
            format!("{FORGE_MAVEN}/{full_version}/forge-{full_version}-installer.jar");
        let installer_path = self
            .cache_dir
            .join("forge")
            .join(format!("forge-{full_version}-installer.jar"));

        self.downloader
            .download_file(&installer_url, &installer_path, None)
            .await
            .context("Failed to download Forge installer")?;

        ensure_launcher_profiles(&self.game_dir).await?;
        self.run_installer(&installer_path, silent).await?;

        if !tokio::fs::try_exists(get_version_json_path(&self.game_dir, &profile_id))
            .await
            .unwrap_or(false)
        {
            bail!("Forge installer finished but profile {profile_id} was not created");
        }

        info!("Forge installed as {profile_id}");
        Ok(profile_id)
    }

    async fn run_installer(&self, installer: &Path, silent: bool) -> Result<()> {
        let mut cmd = Command::new(&self.java_path);
        if silent {
            // Keeps the installer and anything it triggers from opening windows
            cmd.arg("-Djava.awt.headless=true");
        }
        cmd.arg("-jar")
            .arg(installer)
            .arg("--installClient")
            .arg(&self.game_dir)
            .current_dir(&self.game_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Running Forge installer: {cmd:?}");
        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to start {}", self.java_path.display()))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!("forge-installer: {line}");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = last_lines(&stderr, 5);
            bail!(
                "Forge installer exited with {}: {tail}",
                output.status.code().unwrap_or(-1)
            );
        }

        Ok(())
    }
}

/// Recommended build for the version, falling back to the latest one.
fn pick_forge_version<'a>(
    promos: &'a HashMap<String, String>,
    version_id: &str,
) -> Option<&'a str> {
    promos
        .get(&format!("{version_id}-recommended"))
        .or_else(|| promos.get(&format!("{version_id}-latest")))
        .map(String::as_str)
}

fn forge_profile_id(version_id: &str, forge_version: &str) -> String {
    format!("{version_id}-forge-{forge_version}")
}

/// The Forge installer refuses to run without a launcher profile file.
async fn ensure_launcher_profiles(game_dir: &Path) -> Result<()> {
    ensure_directory(game_dir).await?;
    let path = game_dir.join("launcher_profiles.json");
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        tokio::fs::write(&path, br#"{ "profiles": {} }"#)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(count)..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fabric_prefers_stable_loader() {
        let entries: Vec<FabricLoaderEntry> = serde_json::from_str(
            r#"[
                { "loader": { "version": "0.16.0-beta.1", "stable": false } },
                { "loader": { "version": "0.15.11", "stable": true } },
                { "loader": { "version": "0.15.10", "stable": true } }
            ]"#,
        )
        .unwrap();
        assert_eq!(pick_fabric_loader(&entries), Some("0.15.11"));
    }

    #[test]
    fn fabric_without_stable_takes_first() {
        let entries: Vec<FabricLoaderEntry> =
            serde_json::from_str(r#"[{ "loader": { "version": "0.1.0" } }]"#).unwrap();
        assert_eq!(pick_fabric_loader(&entries), Some("0.1.0"));
        assert_eq!(pick_fabric_loader(&[]), None);
    }

    #[test]
    fn forge_prefers_recommended() {
        let promos = HashMap::from([
            ("1.20.1-latest".to_string(), "47.3.0".to_string()),
            ("1.20.1-recommended".to_string(), "47.2.0".to_string()),
            ("1.20.4-latest".to_string(), "49.0.30".to_string()),
        ]);
        assert_eq!(pick_forge_version(&promos, "1.20.1"), Some("47.2.0"));
        assert_eq!(pick_forge_version(&promos, "1.20.4"), Some("49.0.30"));
        assert_eq!(pick_forge_version(&promos, "1.5.2"), None);
        assert_eq!(forge_profile_id("1.20.1", "47.2.0"), "1.20.1-forge-47.2.0");
    }

    #[tokio::test]
    async fn launcher_profiles_file_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher_profiles.json");

        ensure_launcher_profiles(dir.path()).await.unwrap();
        assert!(path.exists());

        std::fs::write(&path, "{\"profiles\":{\"x\":{}}}").unwrap();
        ensure_launcher_profiles(dir.path()).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\"profiles\":{\"x\":{}}}"
        );
    }

    #[test]
    fn last_lines_keeps_tail() {
        assert_eq!(last_lines("a\n\nb\nc\nd", 2), "c | d");
        assert_eq!(last_lines("", 3), "");
    }

    #[tokio::test]
    async fn no_loader_returns_base_version() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = HttpDownloader::new().unwrap();
        let installer = ModLoaderInstaller::new(
            FabricInstaller::new(downloader.clone(), dir.path().to_path_buf()),
            ForgeInstaller::new(
                downloader,
                dir.path().to_path_buf(),
                dir.path().join("cache"),
                PathBuf::from("java"),
            ),
        );

        let id = installer
            .install(LoaderKind::None, "1.20.1", true)
            .await
            .unwrap();
        assert_eq!(id, "1.20.1");
    }
}
