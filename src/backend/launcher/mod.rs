//! Launcher core: catalog, loader installation, file validation and the
//! launch state machine tying them together.

pub mod catalog;
pub mod command;
pub mod downloader;
pub mod loader;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod runner;

pub use catalog::{CatalogClient, MojangCatalog};
pub use downloader::HttpDownloader;
pub use loader::{FabricInstaller, ForgeInstaller, LoaderInstaller, ModLoaderInstaller};
pub use models::{
    LaunchConfig, LaunchOutcome, LaunchReport, LaunchRequest, LaunchState, LoaderKind, Session,
    VersionDescriptor,
};
pub use orchestrator::{LaunchSettings, Orchestrator};
pub use progress::{Status, StatusListener, StatusReporter};
pub use runner::{GameProcess, JavaProcessRunner, ProcessRunner};
