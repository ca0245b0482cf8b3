//! Executable finder.

use std::path::{Path, PathBuf};

/// Looks up `binary_name` on `PATH`, returning the first executable match.
pub fn which<P: AsRef<Path>>(binary_name: P) -> Option<PathBuf> {
    let path_env = std::env::var_os("PATH")?;
    which_in(binary_name, std::env::split_paths(&path_env))
}

/// Same as [`which`] but searches the given directories.
pub fn which_in<P, I>(binary_name: P, dirs: I) -> Option<PathBuf>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = PathBuf>,
{
    let binary_name = binary_name.as_ref();

    dirs.into_iter()
        .map(|dir| {
            let mut candidate = dir.join(binary_name);
            if cfg!(windows) && candidate.extension().is_none() {
                candidate.set_extension("exe");
            }
            candidate
        })
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.is_file() && (metadata.permissions().mode() & 0o111) != 0
    }

    #[cfg(not(unix))]
    {
        metadata.is_file()
    }
}
