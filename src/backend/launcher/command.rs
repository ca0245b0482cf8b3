//! Minecraft command building.
//!
//! Turns a resolved version profile plus a [`LaunchConfig`] into the JVM
//! command line. Handles both the structured `arguments` format (1.13+) and
//! the legacy `minecraftArguments` string.

use anyhow::{Result, anyhow};
use std::path::PathBuf;
use tokio::process::Command;

use super::models::{ArgumentValue, ArgumentValueInner, LaunchConfig, VersionProfile, rules_allow};
use crate::backend::utils::os::{
    get_classpath_separator, get_minecraft_arch, get_minecraft_os_name, get_os_features,
};

const LAUNCHER_NAME: &str = "XasLauncher";
const LAUNCHER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything besides the launch config that the command needs.
pub struct CommandConfig {
    pub game_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub libraries_dir: PathBuf,
    pub natives_dir: PathBuf,
    pub libraries: Vec<PathBuf>,
    pub main_jar: PathBuf,
}

pub struct MinecraftCommand<'a> {
    launch: &'a LaunchConfig,
    profile: &'a VersionProfile,
    paths: CommandConfig,
}

impl<'a> MinecraftCommand<'a> {
    pub fn new(
        launch: &'a LaunchConfig,
        profile: &'a VersionProfile,
        paths: CommandConfig,
    ) -> Self {
        Self {
            launch,
            profile,
            paths,
        }
    }

    /// Builds the process, ready to spawn.
    pub fn build(&self) -> Result<Command> {
        let mut cmd = Command::new(&self.launch.java_path);
        cmd.args(self.arguments()?).current_dir(&self.paths.game_dir);
        Ok(cmd)
    }

    /// Full argument list after the executable.
    pub fn arguments(&self) -> Result<Vec<String>> {
        let main_class = self
            .profile
            .main_class
            .as_deref()
            .ok_or_else(|| anyhow!("Version {} has no main class", self.profile.id))?;

        let mut args = Vec::new();
        self.add_jvm_arguments(&mut args);
        args.push(main_class.to_string());
        self.add_game_arguments(&mut args);
        Ok(args)
    }

    fn add_jvm_arguments(&self, args: &mut Vec<String>) {
        let max = self.launch.max_ram_mb;
        let min = self.launch.min_ram_mb.min(max);
        args.push(format!("-Xms{min}M"));
        args.push(format!("-Xmx{max}M"));
        args.extend(self.launch.jvm_args.iter().cloned());

        match self.profile.arguments.as_ref().filter(|a| !a.jvm.is_empty()) {
            Some(arguments) => {
                for arg in &arguments.jvm {
                    self.process_argument(args, arg);
                }
            }
            None => {
                // Legacy profiles carry no JVM arguments at all
                args.push(format!(
                    "-Djava.library.path={}",
                    self.paths.natives_dir.display()
                ));
                args.push("-cp".to_string());
                args.push(self.build_classpath());
            }
        }

        args.push(format!("-Dminecraft.launcher.brand={LAUNCHER_NAME}"));
        args.push(format!("-Dminecraft.launcher.version={LAUNCHER_VERSION}"));
    }

    fn add_game_arguments(&self, args: &mut Vec<String>) {
        if let Some(arguments) = self.profile.arguments.as_ref().filter(|a| !a.game.is_empty()) {
            for arg in &arguments.game {
                self.process_argument(args, arg);
            }
        } else if let Some(legacy) = &self.profile.minecraft_arguments {
            // Split first so paths with spaces stay single arguments
            args.extend(
                legacy
                    .split_whitespace()
                    .map(|token| self.substitute_variables(token)),
            );
        }
    }

    fn process_argument(&self, args: &mut Vec<String>, arg: &ArgumentValue) {
        match arg {
            ArgumentValue::String(s) => self.push_substituted(args, s),
            ArgumentValue::Conditional { rules, value } => {
                if !rules_allow(
                    rules,
                    get_minecraft_os_name(),
                    get_minecraft_arch(),
                    &get_os_features(),
                ) {
                    return;
                }
                match value {
                    ArgumentValueInner::String(s) => self.push_substituted(args, s),
                    ArgumentValueInner::Array(array) => {
                        for s in array {
                            self.push_substituted(args, s);
                        }
                    }
                }
            }
        }
    }

    fn push_substituted(&self, args: &mut Vec<String>, raw: &str) {
        let substituted = self.substitute_variables(raw);
        if !substituted.trim().is_empty() {
            args.push(substituted);
        }
    }

    /// Replaces `${...}` placeholders. Paths are never quoted.
    fn substitute_variables(&self, input: &str) -> String {
        if !input.contains("${") {
            return input.to_string();
        }

        let session = &self.launch.session;
        let assets_dir = self.paths.assets_dir.display().to_string();
        let assets_name = self.profile.assets_name();
        let game_assets = if matches!(assets_name, "legacy" | "pre-1.6") {
            self.paths
                .assets_dir
                .join("virtual")
                .join(assets_name)
                .display()
                .to_string()
        } else {
            assets_dir.clone()
        };

        let replacements: [(&str, String); 20] = [
            ("${auth_player_name}", session.username.clone()),
            ("${auth_uuid}", session.uuid.clone()),
            ("${auth_access_token}", session.access_token.clone()),
            ("${auth_session}", session.access_token.clone()),
            ("${auth_xuid}", "0".to_string()),
            ("${clientid}", "0".to_string()),
            ("${user_type}", session.user_type.clone()),
            ("${user_properties}", "{}".to_string()),
            ("${version_name}", self.profile.id.clone()),
            (
                "${version_type}",
                self.profile
                    .version_type
                    .clone()
                    .unwrap_or_else(|| "release".to_string()),
            ),
            ("${game_directory}", self.paths.game_dir.display().to_string()),
            ("${assets_root}", assets_dir),
            ("${game_assets}", game_assets),
            ("${assets_index_name}", assets_name.to_string()),
            ("${natives_directory}", self.paths.natives_dir.display().to_string()),
            ("${library_directory}", self.paths.libraries_dir.display().to_string()),
            ("${classpath_separator}", get_classpath_separator().to_string()),
            ("${classpath}", self.build_classpath()),
            ("${launcher_name}", LAUNCHER_NAME.to_string()),
            ("${launcher_version}", LAUNCHER_VERSION.to_string()),
        ];

        replacements
            .iter()
            .fold(input.to_string(), |acc, (key, value)| acc.replace(key, value))
    }

    /// Libraries followed by the main jar, joined by the platform separator.
    fn build_classpath(&self) -> String {
        self.paths
            .libraries
            .iter()
            .chain(std::iter::once(&self.paths.main_jar))
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(get_classpath_separator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::launcher::models::Session;

    fn launch_config() -> LaunchConfig {
        LaunchConfig {
            version_id: "1.20.1".to_string(),
            session: Session::offline("Steve"),
            max_ram_mb: 4096,
            min_ram_mb: 512,
            java_path: PathBuf::from("java"),
            jvm_args: vec!["-XX:+UseG1GC".to_string()],
        }
    }

    fn paths() -> CommandConfig {
        CommandConfig {
            game_dir: PathBuf::from("/mc"),
            assets_dir: PathBuf::from("/mc/assets"),
            libraries_dir: PathBuf::from("/mc/libraries"),
            natives_dir: PathBuf::from("/mc/versions/1.20.1/natives"),
            libraries: vec![PathBuf::from("/mc/libraries/a.jar")],
            main_jar: PathBuf::from("/mc/versions/1.20.1/1.20.1.jar"),
        }
    }

    fn position(args: &[String], needle: &str) -> usize {
        args.iter()
            .position(|a| a == needle)
            .unwrap_or_else(|| panic!("{needle} missing from {args:?}"))
    }

    #[test]
    fn modern_profile_arguments() {
        let profile: VersionProfile = serde_json::from_str(
            r#"{
                "id": "1.20.1",
                "type": "release",
                "mainClass": "net.minecraft.client.main.Main",
                "assets": "5",
                "arguments": {
                    "game": [
                        "--username", "${auth_player_name}",
                        "--gameDir", "${game_directory}",
                        "--assetIndex", "${assets_index_name}",
                        { "rules": [{ "action": "allow",
                                      "features": { "is_demo_user": true } }],
                          "value": "--demo" }
                    ],
                    "jvm": [
                        "-Djava.library.path=${natives_directory}",
                        "-cp", "${classpath}"
                    ]
                }
            }"#,
        )
        .unwrap();

        let launch = launch_config();
        let args = MinecraftCommand::new(&launch, &profile, paths())
            .arguments()
            .unwrap();

        assert_eq!(&args[..3], ["-Xms512M", "-Xmx4096M", "-XX:+UseG1GC"]);
        assert!(args.contains(&"-Djava.library.path=/mc/versions/1.20.1/natives".to_string()));

        let cp = position(&args, "-cp");
        let separator = get_classpath_separator();
        assert_eq!(
            args[cp + 1],
            format!("/mc/libraries/a.jar{separator}/mc/versions/1.20.1/1.20.1.jar")
        );

        let main = position(&args, "net.minecraft.client.main.Main");
        assert!(main > cp);
        assert_eq!(args[position(&args, "--username") + 1], "Steve");
        assert_eq!(args[position(&args, "--gameDir") + 1], "/mc");
        assert_eq!(args[position(&args, "--assetIndex") + 1], "5");
        assert!(!args.contains(&"--demo".to_string()));
    }

    #[test]
    fn legacy_profile_arguments() {
        let profile: VersionProfile = serde_json::from_str(
            r#"{
                "id": "1.8.9",
                "mainClass": "net.minecraft.client.main.Main",
                "assets": "1.8",
                "minecraftArguments": "--username ${auth_player_name} --uuid ${auth_uuid} --userProperties ${user_properties}"
            }"#,
        )
        .unwrap();

        let mut launch = launch_config();
        launch.min_ram_mb = 8192;
        let args = MinecraftCommand::new(&launch, &profile, paths())
            .arguments()
            .unwrap();

        // Min heap never exceeds max heap
        assert_eq!(&args[..2], ["-Xms4096M", "-Xmx4096M"]);
        assert!(args.contains(&"-cp".to_string()));
        assert_eq!(args[position(&args, "--uuid") + 1], launch.session.uuid);
        assert_eq!(args[position(&args, "--userProperties") + 1], "{}");
    }

    #[test]
    fn legacy_assets_point_at_virtual_copy() {
        let profile: VersionProfile = serde_json::from_str(
            r#"{
                "id": "1.5.2",
                "mainClass": "net.minecraft.launchwrapper.Launch",
                "assets": "pre-1.6",
                "minecraftArguments": "${auth_player_name} --assetsDir ${game_assets}"
            }"#,
        )
        .unwrap();

        let launch = launch_config();
        let args = MinecraftCommand::new(&launch, &profile, paths())
            .arguments()
            .unwrap();
        assert_eq!(
            PathBuf::from(&args[position(&args, "--assetsDir") + 1]),
            PathBuf::from("/mc/assets/virtual/pre-1.6")
        );
    }

    #[test]
    fn missing_main_class_is_an_error() {
        let profile = VersionProfile {
            id: "broken".to_string(),
            ..Default::default()
        };
        let launch = launch_config();
        let err = MinecraftCommand::new(&launch, &profile, paths())
            .arguments()
            .unwrap_err();
        assert_eq!(err.to_string(), "Version broken has no main class");
    }
}
