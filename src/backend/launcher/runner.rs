//! Game file validation and process supervision.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;

use super::catalog::MojangCatalog;
use super::command::{CommandConfig, MinecraftCommand};
use super::downloader::{DownloadTask, HttpDownloader};
use super::models::{AssetManifest, LaunchConfig, Library, VersionProfile};
use crate::backend::utils::file_utils::{ensure_directory, ensure_parent_directory};
use crate::backend::utils::os::{get_minecraft_arch, get_minecraft_os_name, get_os_features};
use crate::backend::utils::paths::{
    get_asset_index_path, get_asset_object_path, get_assets_dir, get_libraries_dir,
    get_natives_dir, get_resources_dir, get_version_jar_path, get_version_json_path,
    get_virtual_assets_dir, maven_path,
};
use crate::utils::which;

const RESOURCES_URL: &str = "https://resources.download.minecraft.net";
const MAX_INHERITANCE_DEPTH: usize = 8;

/// Prepares and runs game processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    type Handle: Send;

    /// Makes sure every file `version_id` needs is present, fetching what is missing.
    async fn validate_files(&self, version_id: &str) -> Result<()>;

    async fn spawn(&self, config: &LaunchConfig) -> Result<Self::Handle>;

    /// Waits for the process to exit and returns its exit code.
    async fn await_exit(&self, handle: Self::Handle) -> Result<i32>;
}

/// A running game.
#[derive(Debug)]
pub struct GameProcess {
    pub child: Child,
    pub pid: Option<u32>,
}

/// Picks the Java executable: explicit setting, then `JAVA_HOME`, then
/// `PATH`, then the bare name so the OS resolves it at spawn time.
pub fn resolve_java_path(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }

    let binary = if cfg!(windows) { "java.exe" } else { "java" };

    if let Some(java_home) = std::env::var_os("JAVA_HOME") {
        let candidate = PathBuf::from(java_home).join("bin").join(binary);
        if candidate.is_file() {
            return candidate;
        }
    }

    which("java").unwrap_or_else(|| PathBuf::from("java"))
}

pub struct JavaProcessRunner {
    downloader: HttpDownloader,
    catalog: Arc<MojangCatalog>,
    game_dir: PathBuf,
    download_concurrency: usize,
}

impl JavaProcessRunner {
    pub fn new(
        downloader: HttpDownloader,
        catalog: Arc<MojangCatalog>,
        game_dir: PathBuf,
        download_concurrency: usize,
    ) -> Self {
        Self {
            downloader,
            catalog,
            game_dir,
            download_concurrency,
        }
    }

    /// Loads a profile and folds in everything it inherits from.
    async fn resolve_profile(
        &self,
        version_id: &str,
        allow_download: bool,
    ) -> Result<VersionProfile> {
        let mut chain = Vec::new();
        let mut current = version_id.to_string();

        loop {
            if chain.len() >= MAX_INHERITANCE_DEPTH {
                bail!("Version {version_id} has an inheritance chain that is too deep");
            }

            let profile = self.load_profile(&current, allow_download).await?;
            let parent = profile.inherits_from.clone();
            chain.push(profile);

            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        let mut resolved = chain
            .pop()
            .ok_or_else(|| anyhow!("Version {version_id} could not be loaded"))?;
        while let Some(child) = chain.pop() {
            resolved = child.merge_parent(resolved);
        }
        Ok(resolved)
    }

    async fn load_profile(
        &self,
        version_id: &str,
        allow_download: bool,
    ) -> Result<VersionProfile> {
        let path = get_version_json_path(&self.game_dir, version_id);

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            if !allow_download {
                bail!("Version {version_id} is not installed");
            }

            let info = self
                .catalog
                .version_info(version_id)
                .await?
                .ok_or_else(|| {
                    anyhow!("Version {version_id} not found locally or in the catalog")
                })?;

            info!("Downloading profile for {version_id}");
            self.downloader
                .download_file(&info.url, &path, info.sha1.as_deref())
                .await
                .with_context(|| format!("Failed to download profile for {version_id}"))?;
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Malformed profile {}", path.display()))
    }

    fn client_jar_task(&self, profile: &VersionProfile) -> Option<DownloadTask> {
        let client = profile.downloads.as_ref()?.client.as_ref()?;
        let jar_id = profile.jar_id();
        Some(
            DownloadTask::new(&client.url, get_version_jar_path(&self.game_dir, jar_id))
                .with_sha1(client.sha1.clone()),
        )
    }

    /// Downloads (if needed) and parses the profile's asset index.
    async fn load_asset_index(
        &self,
        profile: &VersionProfile,
    ) -> Result<Option<(String, AssetManifest)>> {
        let Some(index) = &profile.asset_index else {
            debug!("Version {} has no asset index", profile.id);
            return Ok(None);
        };

        let index_path = get_asset_index_path(&self.game_dir, &index.id);
        self.downloader
            .download_file(&index.url, &index_path, index.sha1.as_deref())
            .await
            .context("Failed to download asset index")?;

        let content = tokio::fs::read_to_string(&index_path).await?;
        let manifest = serde_json::from_str(&content).context("Malformed asset index")?;
        Ok(Some((index.id.clone(), manifest)))
    }

    /// Classpath entries in profile order, without duplicates.
    fn classpath_libraries(&self, profile: &VersionProfile) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        resolve_libraries(&self.game_dir, &profile.libraries)
            .into_iter()
            .map(|(path, _)| path)
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }
}

/// Downloads for every object of an asset index, one per hash.
pub fn asset_tasks(game_dir: &Path, manifest: &AssetManifest) -> Vec<DownloadTask> {
    // Many names share one object
    let mut seen = HashSet::new();
    manifest
        .objects
        .values()
        .filter(|object| seen.insert(object.hash.as_str()))
        .map(|object| {
            let prefix = object.hash.get(..2).unwrap_or(&object.hash);
            DownloadTask::new(
                format!("{RESOURCES_URL}/{prefix}/{}", object.hash),
                get_asset_object_path(game_dir, &object.hash),
            )
            .with_sha1(Some(object.hash.clone()))
        })
        .collect()
}

/// Copies objects to their named locations for indexes that old versions
/// read by name. Returns the number of files copied.
pub async fn populate_virtual_assets(
    game_dir: &Path,
    index_id: &str,
    manifest: &AssetManifest,
) -> Result<usize> {
    let mut targets = Vec::new();
    if manifest.is_virtual || matches!(index_id, "legacy" | "pre-1.6") {
        targets.push(get_virtual_assets_dir(game_dir, index_id));
    }
    if manifest.map_to_resources {
        targets.push(get_resources_dir(game_dir));
    }
    if targets.is_empty() {
        return Ok(0);
    }

    let mut copied = 0;
    for (name, object) in &manifest.objects {
        if !Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            warn!("Skipping asset with unsafe name {name}");
            continue;
        }

        let source = get_asset_object_path(game_dir, &object.hash);
        for dir in &targets {
            let target = dir.join(name);
            if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                continue;
            }
            ensure_parent_directory(&target).await?;
            tokio::fs::copy(&source, &target)
                .await
                .with_context(|| format!("Failed to copy asset {name}"))?;
            copied += 1;
        }
    }

    debug!("Copied {copied} named assets for index {index_id}");
    Ok(copied)
}

fn allowed_libraries(libraries: &[Library]) -> impl Iterator<Item = &Library> {
    let os_name = get_minecraft_os_name();
    let os_arch = get_minecraft_arch();
    let features = get_os_features();
    libraries
        .iter()
        .filter(move |library| library.should_use(os_name, os_arch, &features))
}

/// Classpath path and optional download for every library allowed on this OS.
pub fn resolve_libraries(
    game_dir: &Path,
    libraries: &[Library],
) -> Vec<(PathBuf, Option<DownloadTask>)> {
    let libraries_dir = get_libraries_dir(game_dir);

    allowed_libraries(libraries)
        .filter_map(|library| {
            let artifact = library
                .downloads
                .as_ref()
                .and_then(|downloads| downloads.artifact.as_ref());

            match artifact {
                Some(artifact) => {
                    let relative = artifact
                        .path
                        .as_ref()
                        .map(PathBuf::from)
                        .or_else(|| maven_path(&library.name))?;
                    let path = libraries_dir.join(relative);
                    // Installer-generated libraries have an empty URL
                    let task = (!artifact.url.is_empty()).then(|| {
                        DownloadTask::new(&artifact.url, path.clone())
                            .with_sha1(artifact.sha1.clone())
                    });
                    Some((path, task))
                }
                // Classifier-only entries such as lwjgl-platform
                None if library.natives.is_some() => None,
                None => {
                    let relative = maven_path(&library.name)?;
                    let path = libraries_dir.join(&relative);
                    let task = library.url.as_ref().map(|base| {
                        let url_path = relative
                            .iter()
                            .map(|segment| segment.to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        DownloadTask::new(
                            format!("{}/{url_path}", base.trim_end_matches('/')),
                            path.clone(),
                        )
                    });
                    Some((path, task))
                }
            }
        })
        .collect()
}

/// A platform jar whose contents go into the natives directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeArchive {
    pub path: PathBuf,
    pub task: Option<DownloadTask>,
    /// Entry name prefixes left out of the extraction.
    pub exclude: Vec<String>,
}

/// Native jars for this OS, picked through each library's `natives` map.
pub fn resolve_natives(game_dir: &Path, libraries: &[Library]) -> Vec<NativeArchive> {
    let os_name = get_minecraft_os_name();
    let arch_bits = if get_minecraft_arch() == "x86" { "32" } else { "64" };
    let libraries_dir = get_libraries_dir(game_dir);

    allowed_libraries(libraries)
        .filter_map(|library| {
            let classifier = library
                .natives
                .as_ref()?
                .get(os_name)?
                .replace("${arch}", arch_bits);

            let artifact = library
                .downloads
                .as_ref()
                .and_then(|downloads| downloads.classifiers.as_ref())
                .and_then(|classifiers| classifiers.get(&classifier));

            let relative = artifact
                .and_then(|artifact| artifact.path.as_ref().map(PathBuf::from))
                .or_else(|| maven_path(&format!("{}:{classifier}", library.name)))?;
            let path = libraries_dir.join(relative);

            let task = artifact
                .filter(|artifact| !artifact.url.is_empty())
                .map(|artifact| {
                    DownloadTask::new(&artifact.url, path.clone())
                        .with_sha1(artifact.sha1.clone())
                });

            let exclude = library
                .extract
                .as_ref()
                .map(|rules| rules.exclude.clone())
                .unwrap_or_default();

            Some(NativeArchive {
                path,
                task,
                exclude,
            })
        })
        .collect()
}

/// Unpacks a native jar into `natives_dir`, skipping excluded entries.
/// Returns the number of files written.
pub fn extract_native_archive(
    archive_path: &Path,
    natives_dir: &Path,
    exclude: &[String],
) -> Result<usize> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive {}", archive_path.display()))?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read entry {i} of {}", archive_path.display()))?;
        if entry.is_dir() || exclude.iter().any(|prefix| entry.name().starts_with(prefix.as_str()))
        {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe entry {} in {}", entry.name(), archive_path.display());
            continue;
        };

        let target = natives_dir.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        std::io::copy(&mut entry, &mut out)?;
        extracted += 1;
    }

    Ok(extracted)
}

/// Major version from `java -version` output: `1.8.0_392` is 8, `17.0.2` is 17.
pub fn parse_java_major(output: &str) -> Option<u32> {
    let start = output.find('"')? + 1;
    let rest = &output[start..];
    let version = &rest[..rest.find('"')?];

    let mut parts = version.split(['.', '_', '-', '+']);
    let first: u32 = parts.next()?.parse().ok()?;
    if first == 1 {
        parts.next()?.parse().ok()
    } else {
        Some(first)
    }
}

async fn detect_java_major(java: &Path) -> Option<u32> {
    let output = tokio::process::Command::new(java)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;
    // The banner goes to stderr
    parse_java_major(&String::from_utf8_lossy(&output.stderr))
}

#[async_trait]
impl ProcessRunner for JavaProcessRunner {
    type Handle = GameProcess;

    async fn validate_files(&self, version_id: &str) -> Result<()> {
        info!("Validating files for {version_id}");
        let profile = self.resolve_profile(version_id, true).await?;
        let natives = resolve_natives(&self.game_dir, &profile.libraries);
        let asset_index = self.load_asset_index(&profile).await?;

        let mut tasks = Vec::new();
        tasks.extend(self.client_jar_task(&profile));
        tasks.extend(
            resolve_libraries(&self.game_dir, &profile.libraries)
                .into_iter()
                .filter_map(|(_, task)| task),
        );
        tasks.extend(natives.iter().filter_map(|native| native.task.clone()));
        if let Some((_, manifest)) = &asset_index {
            tasks.extend(asset_tasks(&self.game_dir, manifest));
        }

        info!("Checking {} files", tasks.len());
        self.downloader
            .download_multiple(tasks, self.download_concurrency)
            .await?;

        let main_jar = get_version_jar_path(&self.game_dir, profile.jar_id());
        if !tokio::fs::try_exists(&main_jar).await.unwrap_or(false) {
            bail!("Main jar file missing: {}", main_jar.display());
        }

        let missing: Vec<PathBuf> = self
            .classpath_libraries(&profile)
            .into_iter()
            .chain(natives.iter().map(|native| native.path.clone()))
            .filter(|path| !path.exists())
            .collect();
        if let Some(first) = missing.first() {
            for path in &missing {
                error!("Missing library: {}", path.display());
            }
            bail!(
                "Missing {} libraries (first: {}). Please reinstall the version",
                missing.len(),
                first.display()
            );
        }

        let natives_dir = get_natives_dir(&self.game_dir, &profile.id);
        ensure_directory(&natives_dir).await?;
        if !natives.is_empty() {
            let extracted = tokio::task::spawn_blocking(move || -> Result<usize> {
                natives.iter().try_fold(0, |count, native| {
                    let written =
                        extract_native_archive(&native.path, &natives_dir, &native.exclude)?;
                    Ok(count + written)
                })
            })
            .await
            .context("Native extraction was interrupted")??;
            info!("Extracted {extracted} native files");
        }

        if let Some((index_id, manifest)) = &asset_index {
            populate_virtual_assets(&self.game_dir, index_id, manifest).await?;
        }

        info!("Files for {version_id} are complete");
        Ok(())
    }

    async fn spawn(&self, config: &LaunchConfig) -> Result<GameProcess> {
        let profile = self.resolve_profile(&config.version_id, false).await?;

        if let Some(required) = &profile.java_version {
            match detect_java_major(&config.java_path).await {
                Some(found) if found < u32::from(required.major_version) => warn!(
                    "{} needs Java {} but {} is Java {found}",
                    profile.id,
                    required.major_version,
                    config.java_path.display()
                ),
                None => debug!("Could not detect the Java version"),
                _ => {}
            }
        }

        let natives_dir = get_natives_dir(&self.game_dir, &profile.id);
        ensure_directory(&natives_dir).await?;

        let paths = CommandConfig {
            game_dir: self.game_dir.clone(),
            assets_dir: get_assets_dir(&self.game_dir),
            libraries_dir: get_libraries_dir(&self.game_dir),
            natives_dir,
            libraries: self.classpath_libraries(&profile),
            main_jar: get_version_jar_path(&self.game_dir, profile.jar_id()),
        };

        let mut cmd = MinecraftCommand::new(config, &profile, paths).build()?;
        debug!("Full command: {cmd:?}");

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .with_context(|| format!("Failed to start {}", config.java_path.display()))?;

        let pid = child.id();
        info!("Minecraft process started with PID: {pid:?}");

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, true));
        }

        Ok(GameProcess { child, pid })
    }

    async fn await_exit(&self, mut handle: GameProcess) -> Result<i32> {
        let status = handle
            .child
            .wait()
            .await
            .context("Failed to wait for the game process")?;

        // No code means the process was killed by a signal
        let code = status.code().unwrap_or(-1);
        info!("Minecraft (PID {:?}) exited with code {code}", handle.pid);
        Ok(code)
    }
}

/// Relays game output into the log.
async fn forward_output<R>(stream: R, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.contains("ERROR") || line.contains("FATAL") {
            error!("MC: {line}");
        } else if line.contains("WARN") || is_stderr {
            warn!("MC: {line}");
        } else {
            debug!("MC: {line}");
        }
    }
}
