//! Xas Launcher: a Minecraft launcher core with Forge and Fabric support.
//!
//! The [`Orchestrator`] runs a launch against three collaborators: a
//! [`CatalogClient`], a [`LoaderInstaller`] and a [`ProcessRunner`]. The
//! production implementations talk to Mojang's servers and spawn a JVM.

pub mod backend;
pub mod utils;

pub use backend::launcher::{
    CatalogClient, LaunchOutcome, LaunchRequest, LaunchState, LoaderInstaller, LoaderKind,
    Orchestrator, ProcessRunner, Status, StatusListener,
};
pub use utils::{ErrorKind, LaunchError};
