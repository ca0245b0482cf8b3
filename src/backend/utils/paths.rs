//! Path utilities for launcher and game directories.
//!
//! Layout of a game directory:
//!
//! ```text
//! <game_dir>/
//!   versions/<id>/<id>.json
//!   versions/<id>/<id>.jar
//!   versions/<id>/natives/
//!   libraries/<maven path>
//!   assets/indexes/<index>.json
//!   assets/objects/<xx>/<hash>
//!   assets/virtual/<index>/<name>
//!   resources/<name>
//!   mods/
//! ```

use std::path::{Path, PathBuf};

const LAUNCHER_DIR: &str = "XasLauncher";
const GAME_DIR: &str = "minecraft";
const VERSIONS: &str = "versions";
const LIBRARIES: &str = "libraries";
const ASSETS: &str = "assets";
const OBJECTS: &str = "objects";
const INDEXES: &str = "indexes";
const VIRTUAL: &str = "virtual";
const RESOURCES: &str = "resources";
const NATIVES: &str = "natives";
const CACHE: &str = "cache";
const MODS: &str = "mods";

/// Base launcher directory holding the config and caches.
pub fn get_launcher_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(LAUNCHER_DIR)
}

/// Default game directory inside the launcher directory.
pub fn get_default_game_dir() -> PathBuf {
    get_launcher_dir().join(GAME_DIR)
}

#[inline]
pub fn get_cache_dir(launcher_dir: &Path) -> PathBuf {
    launcher_dir.join(CACHE)
}

#[inline]
pub fn get_versions_dir(game_dir: &Path) -> PathBuf {
    game_dir.join(VERSIONS)
}

#[inline]
pub fn get_version_dir(game_dir: &Path, version: &str) -> PathBuf {
    get_versions_dir(game_dir).join(version)
}

#[inline]
pub fn get_version_json_path(game_dir: &Path, version: &str) -> PathBuf {
    get_version_dir(game_dir, version).join(format!("{version}.json"))
}

#[inline]
pub fn get_version_jar_path(game_dir: &Path, version: &str) -> PathBuf {
    get_version_dir(game_dir, version).join(format!("{version}.jar"))
}

#[inline]
pub fn get_natives_dir(game_dir: &Path, version: &str) -> PathBuf {
    get_version_dir(game_dir, version).join(NATIVES)
}

#[inline]
pub fn get_libraries_dir(game_dir: &Path) -> PathBuf {
    game_dir.join(LIBRARIES)
}

#[inline]
pub fn get_assets_dir(game_dir: &Path) -> PathBuf {
    game_dir.join(ASSETS)
}

#[inline]
pub fn get_asset_index_path(game_dir: &Path, index_id: &str) -> PathBuf {
    get_assets_dir(game_dir)
        .join(INDEXES)
        .join(format!("{index_id}.json"))
}

/// Object path for an asset hash (`objects/<first two chars>/<hash>`).
#[inline]
pub fn get_asset_object_path(game_dir: &Path, hash: &str) -> PathBuf {
    let prefix = hash.get(..2).unwrap_or(hash);
    get_assets_dir(game_dir).join(OBJECTS).join(prefix).join(hash)
}

/// Name-addressed copy of an asset index, used by versions before 1.7.
pub fn get_virtual_assets_dir(game_dir: &Path, index_id: &str) -> PathBuf {
    get_assets_dir(game_dir).join(VIRTUAL).join(index_id)
}

/// Legacy `resources/` folder read by pre-1.6 versions.
#[inline]
pub fn get_resources_dir(game_dir: &Path) -> PathBuf {
    game_dir.join(RESOURCES)
}

#[inline]
pub fn get_mods_dir(game_dir: &Path) -> PathBuf {
    game_dir.join(MODS)
}

/// Relative path of a maven coordinate `group:artifact:version[:classifier]`.
///
/// Returns `None` for malformed coordinates.
pub fn maven_path(coordinate: &str) -> Option<PathBuf> {
    let (coordinate, extension) = match coordinate.split_once('@') {
        Some((coordinate, extension)) => (coordinate, extension),
        None => (coordinate, "jar"),
    };

    let parts: Vec<&str> = coordinate.split(':').collect();
    let (group, artifact, version, classifier) = match parts.as_slice() {
        [group, artifact, version] => (*group, *artifact, *version, None),
        [group, artifact, version, classifier] => (*group, *artifact, *version, Some(*classifier)),
        _ => return None,
    };

    let file_name = match classifier {
        Some(classifier) => format!("{artifact}-{version}-{classifier}.{extension}"),
        None => format!("{artifact}-{version}.{extension}"),
    };

    let mut path = PathBuf::new();
    for segment in group.split('.') {
        path.push(segment);
    }
    path.push(artifact);
    path.push(version);
    path.push(file_name);
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maven_path_plain() {
        let path = maven_path("net.fabricmc:fabric-loader:0.15.11").unwrap();
        assert_eq!(
            path,
            PathBuf::from("net/fabricmc/fabric-loader/0.15.11/fabric-loader-0.15.11.jar")
        );
    }

    #[test]
    fn maven_path_with_classifier_and_extension() {
        let path = maven_path("org.lwjgl:lwjgl:3.3.1:natives-linux@zip").unwrap();
        assert_eq!(
            path,
            PathBuf::from("org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.zip")
        );
    }

    #[test]
    fn maven_path_rejects_garbage() {
        assert!(maven_path("not-a-coordinate").is_none());
    }

    #[test]
    fn asset_object_path_uses_hash_prefix() {
        let game_dir = Path::new("/games/mc");
        let path = get_asset_object_path(game_dir, "abcdef0123");
        assert_eq!(path, PathBuf::from("/games/mc/assets/objects/ab/abcdef0123"));
    }
}
