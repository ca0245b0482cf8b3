//! Error handling.

use std::fmt;

/// Which step of the launch flow an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CatalogUnavailable,
    InvalidInput,
    LoaderInstallFailed,
    LaunchFailed,
    AlreadyRunning,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CatalogUnavailable => "catalog unavailable",
            Self::InvalidInput => "invalid input",
            Self::LoaderInstallFailed => "loader install failed",
            Self::LaunchFailed => "launch failed",
            Self::AlreadyRunning => "already running",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced to the caller of the launcher core.
///
/// Every variant keeps the collaborator's message verbatim so the UI can
/// show it as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    #[error("{0}")]
    CatalogUnavailable(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    LoaderInstallFailed(String),
    #[error("{0}")]
    LaunchFailed(String),
    #[error("a launch is already in progress")]
    AlreadyRunning,
}

impl LaunchError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CatalogUnavailable(_) => ErrorKind::CatalogUnavailable,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::LoaderInstallFailed(_) => ErrorKind::LoaderInstallFailed,
            Self::LaunchFailed(_) => ErrorKind::LaunchFailed,
            Self::AlreadyRunning => ErrorKind::AlreadyRunning,
        }
    }

    /// Wraps a collaborator failure, keeping the whole context chain.
    pub fn catalog(err: &anyhow::Error) -> Self {
        Self::CatalogUnavailable(format!("{err:#}"))
    }

    pub fn loader(err: &anyhow::Error) -> Self {
        Self::LoaderInstallFailed(format!("{err:#}"))
    }

    pub fn launch(err: &anyhow::Error) -> Self {
        Self::LaunchFailed(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;

#[macro_export]
macro_rules! invalid_input {
    ($msg:literal) => {
        $crate::utils::error::LaunchError::InvalidInput($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::utils::error::LaunchError::InvalidInput(format!($fmt, $($arg)*))
    };
}
