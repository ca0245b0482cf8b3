//! Custom utilities.

pub mod error;
pub mod logging;
pub mod which;

pub use error::{ErrorKind, LaunchError, Result};
pub use which::which;
