//! OS detection for version-profile rules.

use std::collections::HashMap;

/// Current operating system name as used by Mojang rules.
pub fn get_minecraft_os_name() -> &'static str {
    match std::env::consts::OS {
        "windows" => "windows",
        "macos" => "osx",
        _ => "linux",
    }
}

/// Current architecture as used by Mojang rules.
pub fn get_minecraft_arch() -> &'static str {
    match std::env::consts::ARCH {
        "aarch64" => "arm64",
        "x86" => "x86",
        _ => "x86_64",
    }
}

/// Launcher features checked by conditional arguments.
///
/// Everything is off: no demo mode, no custom resolution, no quick play.
pub fn get_os_features() -> HashMap<String, bool> {
    [
        "is_demo_user",
        "has_custom_resolution",
        "has_quick_plays_support",
        "is_quick_play_singleplayer",
        "is_quick_play_multiplayer",
        "is_quick_play_realms",
    ]
    .into_iter()
    .map(|feature| (feature.to_string(), false))
    .collect()
}

/// Platform classpath separator.
#[inline]
pub const fn get_classpath_separator() -> &'static str {
    if cfg!(windows) { ";" } else { ":" }
}
