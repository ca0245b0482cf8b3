//! Launch orchestration.
//!
//! Drives one launch through `Validating → InstallingLoader → BuildingConfig
//! → Spawning → Running` and back to `Idle`. At most one launch runs per
//! [`Orchestrator`]; a concurrent call is answered with
//! [`LaunchError::AlreadyRunning`] without touching any collaborator.

use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

use super::catalog::CatalogClient;
use super::loader::LoaderInstaller;
use super::models::{
    LaunchConfig, LaunchOutcome, LaunchReport, LaunchRequest, LaunchState, LoaderKind, Session,
    VersionDescriptor,
};
use super::progress::{Status, StatusListener, StatusReporter};
use super::runner::{ProcessRunner, resolve_java_path};
use crate::invalid_input;
use crate::utils::error::{self, LaunchError};

/// Launch settings that do not come from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    /// Explicit Java executable; resolved from the environment when unset.
    pub java_path: Option<PathBuf>,
    pub min_ram_mb: u32,
    pub jvm_args: Vec<String>,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            java_path: None,
            min_ram_mb: 512,
            jvm_args: Vec::new(),
        }
    }
}

pub struct Orchestrator<C, I, R> {
    catalog: C,
    installer: I,
    runner: R,
    settings: LaunchSettings,
    busy: AtomicBool,
    state: watch::Sender<LaunchState>,
    reporter: StatusReporter,
    versions: RwLock<Option<Arc<[VersionDescriptor]>>>,
}

impl<C, I, R> Orchestrator<C, I, R>
where
    C: CatalogClient,
    I: LoaderInstaller,
    R: ProcessRunner,
{
    pub fn new(catalog: C, installer: I, runner: R) -> Self {
        let (state, _) = watch::channel(LaunchState::Idle);
        Self {
            catalog,
            installer,
            runner,
            settings: LaunchSettings::default(),
            busy: AtomicBool::new(false),
            state,
            reporter: StatusReporter::silent(),
            versions: RwLock::new(None),
        }
    }

    pub fn with_settings(mut self, settings: LaunchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn StatusListener>) -> Self {
        self.reporter = StatusReporter::new(Some(listener));
        self
    }

    /// Fetches the catalog and publishes it as the list launches are
    /// validated against.
    pub async fn fetch_versions(&self) -> error::Result<Arc<[VersionDescriptor]>> {
        self.reporter.status(Status::Scanning);

        match self.catalog.fetch_versions().await {
            Ok(versions) => {
                info!("Catalog lists {} versions", versions.len());
                let versions: Arc<[VersionDescriptor]> = versions.into();
                *self
                    .versions
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(versions.clone());
                self.reporter.status(Status::Ready);
                Ok(versions)
            }
            Err(err) => {
                error!("Failed to load versions: {err}");
                self.reporter.status(Status::Error);
                self.reporter.error(err.kind(), &err.to_string());
                Err(err)
            }
        }
    }

    /// Last fetched version list, if any.
    pub fn versions(&self) -> Option<Arc<[VersionDescriptor]>> {
        self.versions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> LaunchState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LaunchState> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Runs one launch to completion: the future resolves when the game exits
    /// or a step fails.
    pub async fn launch(&self, request: LaunchRequest) -> LaunchOutcome {
        let Some(mut guard) = BusyGuard::acquire(self) else {
            warn!("Launch of {} rejected: already running", request.version_id);
            return LaunchError::AlreadyRunning.into();
        };

        match self.run(&request).await {
            Ok(report) => {
                info!(
                    "{} exited with code {}",
                    report.resolved_version, report.exit_code
                );
                guard.ready = true;
                LaunchOutcome::Success(report)
            }
            Err(err) => {
                error!("Launch failed ({}): {err}", err.kind());
                self.set_state(LaunchState::Failed);
                self.reporter.status(Status::Error);
                self.reporter.error(err.kind(), &err.to_string());
                err.into()
            }
        }
    }

    async fn run(&self, request: &LaunchRequest) -> error::Result<LaunchReport> {
        self.set_state(LaunchState::Validating);
        self.validate(request)?;

        let username = request.username.trim();
        let version_id = request.version_id.trim();

        let resolved = match request.loader {
            LoaderKind::None => version_id.to_string(),
            loader => {
                self.set_state(LaunchState::InstallingLoader);
                self.reporter.status(Status::InstallingLoader);
                info!("Installing {loader} for {version_id}");

                let resolved = self
                    .installer
                    .install(loader, version_id, true)
                    .await
                    .map_err(|e| LaunchError::loader(&e))?;
                if resolved.trim().is_empty() {
                    return Err(LaunchError::LoaderInstallFailed(format!(
                        "{loader} installer returned no version id"
                    )));
                }
                resolved
            }
        };

        self.set_state(LaunchState::BuildingConfig);
        let config = self.build_config(&resolved, username, request.max_ram_mb);

        self.set_state(LaunchState::Spawning);
        self.reporter.status(Status::ValidatingFiles);
        self.runner
            .validate_files(&resolved)
            .await
            .map_err(|e| LaunchError::launch(&e))?;

        self.reporter.status(Status::Launching);
        let handle = self
            .runner
            .spawn(&config)
            .await
            .map_err(|e| LaunchError::launch(&e))?;

        self.set_state(LaunchState::Running);
        let exit_code = self
            .runner
            .await_exit(handle)
            .await
            .map_err(|e| LaunchError::launch(&e))?;

        Ok(LaunchReport {
            resolved_version: resolved,
            exit_code,
        })
    }

    fn validate(&self, request: &LaunchRequest) -> error::Result<()> {
        if request.username.trim().is_empty() {
            return Err(invalid_input!("Username is required"));
        }

        let version_id = request.version_id.trim();
        if version_id.is_empty() {
            return Err(invalid_input!("No version selected"));
        }

        if request.max_ram_mb == 0 {
            return Err(invalid_input!("Maximum RAM must be greater than 0 MB"));
        }

        if let Some(versions) = self.versions() {
            if !versions.iter().any(|v| v.name == version_id) {
                return Err(invalid_input!("Unknown version {}", version_id));
            }
        }

        Ok(())
    }

    fn build_config(&self, version_id: &str, username: &str, max_ram_mb: u32) -> LaunchConfig {
        let config = LaunchConfig {
            version_id: version_id.to_string(),
            session: Session::offline(username),
            max_ram_mb,
            min_ram_mb: self.settings.min_ram_mb,
            java_path: resolve_java_path(self.settings.java_path.as_deref()),
            jvm_args: self.settings.jvm_args.clone(),
        };
        debug_assert!(!config.session.username.is_empty());
        config
    }

    fn set_state(&self, state: LaunchState) {
        self.state.send_replace(state);
        self.reporter.state(state);
    }
}

/// Holds the busy flag for one launch. Dropping it returns to `Idle`, also
/// when the launch future itself is dropped.
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
    state: &'a watch::Sender<LaunchState>,
    reporter: &'a StatusReporter,
    /// Report `Ready` once back in `Idle`.
    ready: bool,
}

impl<'a> BusyGuard<'a> {
    fn acquire<C, I, R>(orchestrator: &'a Orchestrator<C, I, R>) -> Option<Self> {
        orchestrator
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        Some(Self {
            busy: &orchestrator.busy,
            state: &orchestrator.state,
            reporter: &orchestrator.reporter,
            ready: false,
        })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(LaunchState::Idle);
        self.reporter.state(LaunchState::Idle);
        if self.ready {
            self.reporter.status(Status::Ready);
        }
        self.busy.store(false, Ordering::Release);
    }
}
