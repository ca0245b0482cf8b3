//! Persisted launcher settings.

use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::paths::{get_default_game_dir, get_launcher_dir};

const CONFIG_FILE: &str = "config.json";

/// Official Mojang version manifest.
pub const DEFAULT_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub minecraft: MinecraftConfig,
    pub catalog: CatalogConfig,
    pub download_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinecraftConfig {
    pub game_directory: PathBuf,
    /// Explicit Java executable; resolved from the environment when unset.
    pub java_path: Option<PathBuf>,
    pub java_args: Vec<String>,
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub min_memory: u32, // MB
    pub max_memory: u32, // MB
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub manifest_url: String,
    /// Append versions found only in the local `versions/` directory.
    pub include_local: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            minecraft: MinecraftConfig::default(),
            catalog: CatalogConfig::default(),
            download_concurrency: 16,
        }
    }
}

impl Default for MinecraftConfig {
    fn default() -> Self {
        Self {
            game_directory: get_default_game_dir(),
            java_path: None,
            java_args: vec![
                "-XX:+UnlockExperimentalVMOptions".to_string(),
                "-XX:+UseG1GC".to_string(),
                "-XX:G1NewSizePercent=20".to_string(),
                "-XX:G1ReservePercent=20".to_string(),
                "-XX:MaxGCPauseMillis=50".to_string(),
                "-XX:G1HeapRegionSize=32M".to_string(),
            ],
            memory: MemoryConfig::default(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            min_memory: 512,
            max_memory: 2048,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            include_local: true,
        }
    }
}

/// Loads and saves [`AppConfig`] as pretty JSON.
pub struct ConfigManager {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigManager {
    /// Opens the config in the default launcher directory.
    pub fn new() -> Result<Self> {
        Self::open(get_launcher_dir().join(CONFIG_FILE))
    }

    /// Opens the config at `config_path`, writing defaults if it does not exist yet.
    pub fn open(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            let default_config = AppConfig::default();
            Self::save_config(&config_path, &default_config)?;
            info!("Created default config at {}", config_path.display());
            default_config
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn set_java_path(&mut self, path: Option<PathBuf>) {
        self.get_config_mut().minecraft.java_path = path;
    }

    /// Updates either heap limit in MB. The minimum may not exceed the maximum.
    pub fn set_memory_allocation(&mut self, min: Option<u32>, max: Option<u32>) -> Result<()> {
        let memory = &mut self.get_config_mut().minecraft.memory;
        let min = min.unwrap_or(memory.min_memory);
        let max = max.unwrap_or(memory.max_memory);
        if max == 0 || min > max {
            bail!("Invalid memory allocation: min {min} MB, max {max} MB");
        }

        memory.min_memory = min;
        memory.max_memory = max;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        Self::save_config(&self.config_path, &self.config)
    }

    fn load_config(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_open_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let manager = ConfigManager::open(path.clone()).unwrap();
        assert!(path.exists());
        assert_eq!(manager.get_config(), &AppConfig::default());
    }

    #[test]
    fn saved_changes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut manager = ConfigManager::open(path.clone()).unwrap();
        manager.get_config_mut().minecraft.memory.max_memory = 6144;
        manager.get_config_mut().minecraft.java_path = Some(PathBuf::from("/opt/jdk/bin/java"));
        manager.save().unwrap();

        let reopened = ConfigManager::open(path).unwrap();
        assert_eq!(reopened.get_config().minecraft.memory.max_memory, 6144);
        assert_eq!(
            reopened.get_config().minecraft.java_path,
            Some(PathBuf::from("/opt/jdk/bin/java"))
        );
    }

    #[test]
    fn memory_allocation_keeps_min_below_max() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ConfigManager::open(dir.path().join(CONFIG_FILE)).unwrap();

        manager.set_memory_allocation(None, Some(8192)).unwrap();
        manager.set_memory_allocation(Some(2048), None).unwrap();
        assert_eq!(manager.get_config().minecraft.memory.min_memory, 2048);
        assert_eq!(manager.get_config().minecraft.memory.max_memory, 8192);

        let err = manager
            .set_memory_allocation(Some(4096), Some(1024))
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid memory allocation"));
        assert!(manager.set_memory_allocation(None, Some(0)).is_err());
        assert_eq!(manager.get_config().minecraft.memory.max_memory, 8192);
    }

    #[test]
    fn cleared_java_path_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut manager = ConfigManager::open(path.clone()).unwrap();
        manager.set_java_path(Some(PathBuf::from("/opt/jdk/bin/java")));
        manager.save().unwrap();
        manager.set_java_path(None);
        manager.save().unwrap();

        let reopened = ConfigManager::open(path).unwrap();
        assert_eq!(reopened.get_config().minecraft.java_path, None);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "download_concurrency": 4 }"#).unwrap();

        let manager = ConfigManager::open(path).unwrap();
        assert_eq!(manager.get_config().download_concurrency, 4);
        assert_eq!(manager.get_config().catalog, CatalogConfig::default());
    }
}
