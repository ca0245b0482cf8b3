use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use xas_launcher::backend::launcher::runner::resolve_java_path;
use xas_launcher::backend::launcher::{
    FabricInstaller, ForgeInstaller, HttpDownloader, JavaProcessRunner, LaunchOutcome,
    LaunchRequest, LaunchSettings, LaunchState, LoaderKind, ModLoaderInstaller, MojangCatalog,
    Orchestrator, Status, StatusListener,
};
use xas_launcher::backend::utils::config::{AppConfig, ConfigManager};
use xas_launcher::backend::utils::file_utils::ensure_directory;
use xas_launcher::backend::utils::os::get_minecraft_os_name;
use xas_launcher::backend::utils::paths::{get_cache_dir, get_launcher_dir, get_mods_dir};
use xas_launcher::utils::{ErrorKind, logging};

#[derive(Parser)]
#[command(name = "xas-launcher", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Custom game directory
    #[arg(short, long, global = true)]
    game_dir: Option<PathBuf>,

    /// Log launcher activity to stderr
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List installable versions
    List {
        /// Only show releases
        #[arg(long)]
        releases: bool,
    },
    /// Launch a version
    Launch {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        version: String,
        /// none, forge or fabric
        #[arg(short, long, default_value = "none")]
        loader: LoaderKind,
        /// Maximum RAM in MB, defaults to the configured value
        #[arg(short, long)]
        ram: Option<u32>,
    },
    /// Create the mods folder and open it
    Mods,
    /// Show the configuration, optionally changing and saving it
    Config {
        /// Java executable to launch with
        #[arg(long, conflicts_with = "auto_java")]
        java: Option<PathBuf>,
        /// Forget the configured Java and detect it again
        #[arg(long)]
        auto_java: bool,
        /// Minimum RAM in MB
        #[arg(long)]
        min_ram: Option<u32>,
        /// Maximum RAM in MB
        #[arg(long)]
        max_ram: Option<u32>,
    },
}

/// Prints status lines for the user.
struct ConsoleListener;

impl StatusListener for ConsoleListener {
    fn on_status(&self, status: Status) {
        println!("[{status}]");
    }

    fn on_state(&self, state: LaunchState) {
        if state == LaunchState::Running {
            println!("Game is running, waiting for it to exit...");
        }
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        eprintln!("Error ({kind}): {message}");
    }
}

type Launcher = Orchestrator<Arc<MojangCatalog>, ModLoaderInstaller, JavaProcessRunner>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut manager = ConfigManager::new()?;
    let mut config = manager.get_config().clone();
    if let Some(game_dir) = cli.game_dir {
        config.minecraft.game_directory = game_dir;
    }

    match cli.command {
        Commands::List { releases } => list_versions(&config, releases).await,
        Commands::Launch {
            username,
            version,
            loader,
            ram,
        } => {
            let request = LaunchRequest {
                username,
                version_id: version,
                loader,
                max_ram_mb: ram.unwrap_or(config.minecraft.memory.max_memory),
            };
            launch(&config, request).await
        }
        Commands::Mods => {
            open_mods_folder(&config.minecraft.game_directory).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config {
            java,
            auto_java,
            min_ram,
            max_ram,
        } => {
            let mut changed = false;
            if java.is_some() || auto_java {
                manager.set_java_path(java);
                changed = true;
            }
            if min_ram.is_some() || max_ram.is_some() {
                manager.set_memory_allocation(min_ram, max_ram)?;
                changed = true;
            }
            if changed {
                manager.save()?;
                info!("Saved config to {}", manager.path().display());
            }

            println!("{}", manager.path().display());
            println!("{}", serde_json::to_string_pretty(manager.get_config())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_launcher(config: &AppConfig) -> Result<Launcher> {
    let game_dir = config.minecraft.game_directory.clone();
    let downloader = HttpDownloader::new()?;

    let catalog = Arc::new(MojangCatalog::new(
        downloader.clone(),
        config.catalog.manifest_url.clone(),
        game_dir.clone(),
        config.catalog.include_local,
    ));

    let installer = ModLoaderInstaller::new(
        FabricInstaller::new(downloader.clone(), game_dir.clone()),
        ForgeInstaller::new(
            downloader.clone(),
            game_dir.clone(),
            get_cache_dir(&get_launcher_dir()),
            resolve_java_path(config.minecraft.java_path.as_deref()),
        ),
    );

    let runner = JavaProcessRunner::new(
        downloader,
        catalog.clone(),
        game_dir,
        config.download_concurrency.max(1),
    );

    let settings = LaunchSettings {
        java_path: config.minecraft.java_path.clone(),
        min_ram_mb: config.minecraft.memory.min_memory,
        jvm_args: config.minecraft.java_args.clone(),
    };

    Ok(Orchestrator::new(catalog, installer, runner)
        .with_settings(settings)
        .with_listener(Arc::new(ConsoleListener)))
}

async fn list_versions(config: &AppConfig, releases_only: bool) -> Result<ExitCode> {
    let launcher = build_launcher(config)?;
    let Ok(versions) = launcher.fetch_versions().await else {
        return Ok(ExitCode::FAILURE);
    };

    for version in versions
        .iter()
        .filter(|v| !releases_only || v.is_release() || v.installed_locally)
    {
        let kind = version.version_type.as_deref().unwrap_or("local");
        let marker = if version.installed_locally { " *" } else { "" };
        println!("{} [{kind}]{marker}", version.name);
    }

    Ok(ExitCode::SUCCESS)
}

async fn launch(config: &AppConfig, request: LaunchRequest) -> Result<ExitCode> {
    let launcher = build_launcher(config)?;

    // Installed versions stay launchable without a catalog
    if launcher.fetch_versions().await.is_err() {
        warn!("Launching without the version catalog");
    }

    match launcher.launch(request).await {
        LaunchOutcome::Success(report) => {
            println!(
                "{} exited with code {}",
                report.resolved_version, report.exit_code
            );
            Ok(ExitCode::SUCCESS)
        }
        LaunchOutcome::Failure { .. } => Ok(ExitCode::FAILURE),
    }
}

async fn open_mods_folder(game_dir: &Path) -> Result<()> {
    let mods_dir = get_mods_dir(game_dir);
    ensure_directory(&mods_dir).await?;

    let opener = match get_minecraft_os_name() {
        "windows" => "explorer",
        "osx" => "open",
        _ => "xdg-open",
    };

    let status = tokio::process::Command::new(opener)
        .arg(&mods_dir)
        .status()
        .await
        .with_context(|| format!("Failed to run {opener}"))?;

    // explorer.exe reports 1 even when it opened the folder
    if !status.success() && opener != "explorer" {
        warn!("{opener} exited with {status}");
    }

    info!("Opened mods folder: {}", mods_dir.display());
    println!("{}", mods_dir.display());
    Ok(())
}
