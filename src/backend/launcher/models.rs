//! Data models: launch requests and outcomes, plus the Mojang JSON formats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use md5::{Digest, Md5};
use uuid::Builder;

use crate::utils::error::{ErrorKind, LaunchError};

/// One installable version as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub name: String,
    pub version_type: Option<String>,
    pub release_time: Option<DateTime<Utc>>,
    pub installed_locally: bool,
}

impl VersionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_type: None,
            release_time: None,
            installed_locally: false,
        }
    }

    pub fn is_release(&self) -> bool {
        self.version_type.as_deref() == Some("release")
    }
}

/// Mod loader to install on top of the base version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    #[default]
    None,
    Forge,
    Fabric,
}

impl LoaderKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Forge => "forge",
            Self::Fabric => "fabric",
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoaderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "vanilla" => Ok(Self::None),
            "forge" => Ok(Self::Forge),
            "fabric" => Ok(Self::Fabric),
            other => Err(format!(
                "unknown loader '{other}', expected one of: none, forge, fabric"
            )),
        }
    }
}

/// A single launch attempt, built from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub username: String,
    pub version_id: String,
    pub loader: LoaderKind,
    pub max_ram_mb: u32,
}

/// Offline identity handed to the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    pub user_type: String,
}

impl Session {
    const OFFLINE_ACCESS_TOKEN: &'static str = "0";

    /// Builds a local session. The UUID matches what offline-mode servers
    /// derive: a v3 UUID over the MD5 of `OfflinePlayer:<name>`, no namespace.
    pub fn offline(username: &str) -> Self {
        let username = username.trim();
        let name = format!("OfflinePlayer:{username}");
        let digest: [u8; 16] = Md5::digest(name.as_bytes()).into();
        let uuid = Builder::from_md5_bytes(digest).into_uuid();

        Self {
            username: username.to_string(),
            uuid: uuid.simple().to_string(),
            access_token: Self::OFFLINE_ACCESS_TOKEN.to_string(),
            user_type: "legacy".to_string(),
        }
    }
}

/// Everything the process runner needs to start the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub version_id: String,
    pub session: Session,
    pub max_ram_mb: u32,
    pub min_ram_mb: u32,
    pub java_path: PathBuf,
    pub jvm_args: Vec<String>,
}

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchState {
    #[default]
    Idle,
    Validating,
    InstallingLoader,
    BuildingConfig,
    Spawning,
    Running,
    Failed,
}

/// Details of a finished game session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub resolved_version: String,
    pub exit_code: i32,
}

/// Result of [`crate::backend::launcher::Orchestrator::launch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Success(LaunchReport),
    Failure { kind: ErrorKind, message: String },
}

impl LaunchOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<LaunchError> for LaunchOutcome {
    fn from(err: LaunchError) -> Self {
        Self::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

// Mojang version manifest

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionManifest {
    pub latest: LatestVersions,
    pub versions: Vec<VersionInfo>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    pub url: String,
    #[serde(rename = "releaseTime")]
    pub release_time: Option<DateTime<Utc>>,
    pub sha1: Option<String>,
}

impl VersionManifest {
    pub fn get_version(&self, version_id: &str) -> Option<&VersionInfo> {
        self.versions.iter().find(|v| v.id == version_id)
    }
}

impl From<&VersionInfo> for VersionDescriptor {
    fn from(info: &VersionInfo) -> Self {
        Self {
            name: info.id.clone(),
            version_type: Some(info.version_type.clone()),
            release_time: info.release_time,
            installed_locally: false,
        }
    }
}

// Version profile (`versions/<id>/<id>.json`)

/// A version profile. Loader profiles only carry a subset of the fields and
/// point at their base through `inheritsFrom`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VersionProfile {
    pub id: String,
    #[serde(rename = "inheritsFrom", default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
    #[serde(rename = "type", default)]
    pub version_type: Option<String>,
    #[serde(rename = "mainClass", default)]
    pub main_class: Option<String>,
    #[serde(rename = "minecraftArguments", default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<Downloads>,
    #[serde(rename = "assetIndex", default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar: Option<String>,
    #[serde(rename = "javaVersion", default, skip_serializing_if = "Option::is_none")]
    pub java_version: Option<JavaVersion>,
}

impl VersionProfile {
    /// Folds a resolved parent profile into this one. Child values win;
    /// libraries go child first, arguments parent first.
    pub fn merge_parent(self, parent: VersionProfile) -> VersionProfile {
        let arguments = match (self.arguments, parent.arguments) {
            (Some(child), Some(parent)) => Some(Arguments {
                game: parent.game.into_iter().chain(child.game).collect(),
                jvm: parent.jvm.into_iter().chain(child.jvm).collect(),
            }),
            (child, parent) => child.or(parent),
        };

        let mut libraries = self.libraries;
        libraries.extend(parent.libraries);

        VersionProfile {
            jar: self.jar.or(parent.jar).or_else(|| Some(parent.id.clone())),
            id: self.id,
            inherits_from: parent.inherits_from,
            version_type: self.version_type.or(parent.version_type),
            main_class: self.main_class.or(parent.main_class),
            minecraft_arguments: self.minecraft_arguments.or(parent.minecraft_arguments),
            arguments,
            libraries,
            downloads: self.downloads.or(parent.downloads),
            asset_index: self.asset_index.or(parent.asset_index),
            assets: self.assets.or(parent.assets),
            java_version: self.java_version.or(parent.java_version),
        }
    }

    /// Id of the version whose jar is put on the classpath.
    pub fn jar_id(&self) -> &str {
        self.jar.as_deref().unwrap_or(&self.id)
    }

    /// Asset index name, `legacy` for profiles that predate asset indexes.
    pub fn assets_name(&self) -> &str {
        self.assets
            .as_deref()
            .or(self.asset_index.as_ref().map(|index| index.id.as_str()))
            .unwrap_or("legacy")
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<ArgumentValue>,
    #[serde(default)]
    pub jvm: Vec<ArgumentValue>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    String(String),
    Conditional {
        rules: Vec<Rule>,
        value: ArgumentValueInner,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ArgumentValueInner {
    String(String),
    Array(Vec<String>),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Rule {
    pub action: String,
    pub os: Option<OsRule>,
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OsRule {
    pub name: Option<String>,
    pub version: Option<String>,
    pub arch: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Library {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    /// Maven repository base for libraries without explicit downloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    /// OS name to classifier, `${arch}` standing for 32 or 64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractRules>,
}

/// Entries to leave out when unpacking a native jar.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryDownloads {
    pub artifact: Option<Artifact>,
    pub classifiers: Option<HashMap<String, Artifact>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Artifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Downloads {
    pub client: Option<Artifact>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetIndex {
    pub id: String,
    pub sha1: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JavaVersion {
    pub component: Option<String>,
    #[serde(rename = "majorVersion")]
    pub major_version: u8,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetManifest {
    pub objects: HashMap<String, AssetObject>,
    /// Objects are also laid out by name under `assets/virtual/<index>`.
    #[serde(rename = "virtual", default)]
    pub is_virtual: bool,
    /// Objects are also laid out by name under `<game_dir>/resources`.
    #[serde(default)]
    pub map_to_resources: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl Rule {
    /// Whether the rule's conditions hold on this machine.
    ///
    /// OS version constraints are never matched.
    pub fn applies(&self, os_name: &str, os_arch: &str, features: &HashMap<String, bool>) -> bool {
        if let Some(os) = &self.os {
            if os.name.as_deref().is_some_and(|name| name != os_name) {
                return false;
            }
            if os.arch.as_deref().is_some_and(|arch| arch != os_arch) {
                return false;
            }
            if os.version.is_some() {
                return false;
            }
        }

        if let Some(rule_features) = &self.features {
            for (feature, required) in rule_features {
                let has_feature = features.get(feature).copied().unwrap_or(false);
                if has_feature != *required {
                    return false;
                }
            }
        }

        true
    }
}

/// Evaluates a rule list: no rules means allowed, otherwise the last
/// applicable rule decides and the default is disallowed.
pub fn rules_allow(
    rules: &[Rule],
    os_name: &str,
    os_arch: &str,
    features: &HashMap<String, bool>,
) -> bool {
    if rules.is_empty() {
        return true;
    }

    rules
        .iter()
        .filter(|rule| rule.applies(os_name, os_arch, features))
        .fold(false, |_, rule| rule.action == "allow")
}

impl Library {
    pub fn should_use(
        &self,
        os_name: &str,
        os_arch: &str,
        features: &HashMap<String, bool>,
    ) -> bool {
        self.rules
            .as_deref()
            .is_none_or(|rules| rules_allow(rules, os_name, os_arch, features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_features() -> HashMap<String, bool> {
        HashMap::new()
    }

    fn rule(action: &str, os_name: Option<&str>) -> Rule {
        Rule {
            action: action.to_string(),
            os: os_name.map(|name| OsRule {
                name: Some(name.to_string()),
                version: None,
                arch: None,
            }),
            features: None,
        }
    }

    #[test]
    fn loader_kind_parses_by_name() {
        assert_eq!("Forge".parse::<LoaderKind>(), Ok(LoaderKind::Forge));
        assert_eq!("fabric".parse::<LoaderKind>(), Ok(LoaderKind::Fabric));
        assert_eq!("vanilla".parse::<LoaderKind>(), Ok(LoaderKind::None));
        assert!("1".parse::<LoaderKind>().is_err());
    }

    #[test]
    fn offline_session_is_stable_per_name() {
        let a = Session::offline("Steve");
        let b = Session::offline("  Steve ");
        let c = Session::offline("Alex");

        assert_eq!(a, b);
        assert_eq!(a.username, "Steve");
        assert_ne!(a.uuid, c.uuid);
        assert_eq!(a.uuid, "5627dd98e6be3c21b8a8e92344183641");
        assert_eq!(c.uuid, "36532b5ec4423dbba24cc7e55d0f979a");
        assert_eq!(
            uuid::Uuid::parse_str(&a.uuid).unwrap().get_version_num(),
            3
        );
    }

    #[test]
    fn rules_last_match_wins() {
        // Classic "allow everywhere except osx"
        let rules = vec![rule("allow", None), rule("disallow", Some("osx"))];
        assert!(rules_allow(&rules, "linux", "x86_64", &no_features()));
        assert!(!rules_allow(&rules, "osx", "arm64", &no_features()));

        // Only allowed on windows
        let rules = vec![rule("allow", Some("windows"))];
        assert!(rules_allow(&rules, "windows", "x86_64", &no_features()));
        assert!(!rules_allow(&rules, "linux", "x86_64", &no_features()));
    }

    #[test]
    fn feature_rules_require_feature_values() {
        let rules = vec![Rule {
            action: "allow".to_string(),
            os: None,
            features: Some(HashMap::from([("is_demo_user".to_string(), true)])),
        }];
        assert!(!rules_allow(&rules, "linux", "x86_64", &no_features()));

        let features = HashMap::from([("is_demo_user".to_string(), true)]);
        assert!(rules_allow(&rules, "linux", "x86_64", &features));
    }

    #[test]
    fn loader_profile_merges_over_base() {
        let base: VersionProfile = serde_json::from_str(
            r#"{
                "id": "1.20.1",
                "type": "release",
                "mainClass": "net.minecraft.client.main.Main",
                "arguments": { "game": ["--username", "${auth_player_name}"],
                               "jvm": ["-cp", "${classpath}"] },
                "libraries": [{ "name": "com.mojang:brigadier:1.1.8" }],
                "assetIndex": { "id": "5", "url": "https://example.invalid/5.json" },
                "assets": "5"
            }"#,
        )
        .unwrap();

        let fabric: VersionProfile = serde_json::from_str(
            r#"{
                "id": "fabric-loader-0.15.11-1.20.1",
                "inheritsFrom": "1.20.1",
                "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
                "arguments": { "game": [],
                               "jvm": ["-DFabricMcEmu= net.minecraft.client.main.Main "] },
                "libraries": [{ "name": "net.fabricmc:fabric-loader:0.15.11",
                                "url": "https://maven.fabricmc.net/" }]
            }"#,
        )
        .unwrap();

        let merged = fabric.merge_parent(base);
        assert_eq!(merged.id, "fabric-loader-0.15.11-1.20.1");
        assert_eq!(merged.inherits_from, None);
        assert_eq!(
            merged.main_class.as_deref(),
            Some("net.fabricmc.loader.impl.launch.knot.KnotClient")
        );
        assert_eq!(merged.jar_id(), "1.20.1");
        assert_eq!(merged.assets_name(), "5");
        assert_eq!(merged.version_type.as_deref(), Some("release"));

        let names: Vec<&str> = merged.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            ["net.fabricmc:fabric-loader:0.15.11", "com.mojang:brigadier:1.1.8"]
        );

        let arguments = merged.arguments.unwrap();
        assert_eq!(arguments.game.len(), 2);
        assert_eq!(arguments.jvm.len(), 3);
    }

    #[test]
    fn outcome_from_error_keeps_kind_and_message() {
        let outcome = LaunchOutcome::from(LaunchError::LoaderInstallFailed("boom".into()));
        assert_eq!(
            outcome,
            LaunchOutcome::Failure {
                kind: ErrorKind::LoaderInstallFailed,
                message: "boom".into()
            }
        );
        assert!(!outcome.is_success());
    }
}
