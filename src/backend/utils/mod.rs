//! Utility modules for the launcher backend.
//!
//! OS detection, path management, persisted settings and file helpers.

/// Persisted launcher settings.
pub mod config;
/// File system operations and utilities.
pub mod file_utils;
/// OS detection and compatibility.
pub mod os;
/// Path utilities for Minecraft directories.
pub mod paths;
