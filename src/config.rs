use crate::cli::CliArgs;
use crate::error::ConsoleError;
use crate::input::{Action, KeySpec, parse_key_spec};
use crate::model::PanelKind;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_REFRESH_SECS: u64 = 5;
const MIN_REFRESH_SECS: u64 = 1;

#[derive(Debug, Clone, Deserialize, Default)]
struct BerthConfigFile {
    #[serde(default, alias = "refresh")]
    refresh_secs: Option<u64>,
    #[serde(default)]
    docker: DockerSpec,
    #[serde(default)]
    log_file: Option<PathBuf>,
    #[serde(default, alias = "keys")]
    bindings: Vec<BindingSpec>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct DockerSpec {
    #[serde(default, alias = "bin")]
    binary: Option<String>,
    #[serde(default)]
    host: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct BindingSpec {
    panel: String,
    key: String,
    action: String,
}

/// A user binding layered over a panel's defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub panel: PanelKind,
    pub key: KeySpec,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source: Option<String>,
    pub refresh: Duration,
    pub docker_binary: String,
    pub docker_host: Option<String>,
    pub log_file: Option<PathBuf>,
    pub bindings: Vec<KeyBinding>,
}

impl Settings {
    /// Finds and reads the config file, then lets command line flags win.
    pub fn load(args: &CliArgs) -> Result<Self> {
        let path = args.config.clone().or_else(discover_config_path);
        let file = match &path {
            Some(path) => Some(read_config(path)?),
            None => None,
        };
        let mut settings = Self::resolve(args, file.unwrap_or_default())?;
        settings.source = path.map(|path| path.display().to_string());
        Ok(settings)
    }

    fn resolve(args: &CliArgs, file: BerthConfigFile) -> Result<Self, ConsoleError> {
        let refresh_secs = args
            .refresh_secs
            .or(file.refresh_secs)
            .unwrap_or(DEFAULT_REFRESH_SECS)
            .max(MIN_REFRESH_SECS);

        Ok(Self {
            source: None,
            refresh: Duration::from_secs(refresh_secs),
            docker_binary: args
                .docker_bin
                .clone()
                .or(file.docker.binary)
                .unwrap_or_else(|| "docker".to_string()),
            docker_host: args.docker_host.clone().or(file.docker.host),
            log_file: args.log_file.clone().or(file.log_file),
            bindings: parse_bindings(&file.bindings)?,
        })
    }
}

fn read_config(path: &Path) -> Result<BerthConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

fn parse_bindings(specs: &[BindingSpec]) -> Result<Vec<KeyBinding>, ConsoleError> {
    let mut seen = HashSet::new();
    specs
        .iter()
        .map(|spec| {
            let panel = PanelKind::from_name(&spec.panel)
                .ok_or_else(|| ConsoleError::UnknownPanel(spec.panel.clone()))?;
            let key = parse_key_spec(&spec.key)
                .ok_or_else(|| ConsoleError::Config(format!("unrecognized key '{}'", spec.key)))?;
            let action = Action::from_token(&spec.action).ok_or_else(|| {
                ConsoleError::Config(format!("unrecognized action '{}'", spec.action))
            })?;
            if !seen.insert((panel, key)) {
                return Err(ConsoleError::DuplicateBinding {
                    panel: panel.name().to_string(),
                    key: key.label(),
                });
            }
            Ok(KeyBinding { panel, key, action })
        })
        .collect()
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("BERTH_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("berth.yaml"),
        PathBuf::from("berth.yml"),
        PathBuf::from(".berth.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/berth/config.yaml"),
            PathBuf::from(&home).join(".berth.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{BerthConfigFile, Settings};
    use crate::cli::CliArgs;
    use crate::error::ConsoleError;
    use crate::input::{Action, KeySpec};
    use crate::model::PanelKind;
    use std::io::Write;
    use std::time::Duration;

    fn parse(raw: &str) -> BerthConfigFile {
        serde_yaml::from_str(raw).unwrap()
    }

    #[test]
    fn defaults_apply_without_a_file() {
        let settings = Settings::resolve(&CliArgs::default(), BerthConfigFile::default()).unwrap();
        assert_eq!(settings.refresh, Duration::from_secs(5));
        assert_eq!(settings.docker_binary, "docker");
        assert!(settings.bindings.is_empty());
    }

    #[test]
    fn command_line_overrides_the_file() {
        let file = parse("refresh_secs: 30\ndocker:\n  binary: podman\n  host: unix:///a.sock\n");
        let args = CliArgs {
            refresh_secs: Some(0),
            docker_host: Some("tcp://b:2375".to_string()),
            ..CliArgs::default()
        };
        let settings = Settings::resolve(&args, file).unwrap();
        assert_eq!(settings.refresh, Duration::from_secs(1));
        assert_eq!(settings.docker_binary, "podman");
        assert_eq!(settings.docker_host.as_deref(), Some("tcp://b:2375"));
    }

    #[test]
    fn bindings_are_parsed_per_panel() {
        let file = parse(
            "bindings:\n  - panel: container list\n    key: x\n    action: remove\n  - panel: images\n    key: ctrl+p\n    action: pull\n",
        );
        let settings = Settings::resolve(&CliArgs::default(), file).unwrap();
        assert_eq!(settings.bindings.len(), 2);
        assert_eq!(settings.bindings[0].panel, PanelKind::Containers);
        assert_eq!(settings.bindings[0].key, KeySpec::char('x'));
        assert_eq!(settings.bindings[1].action, Action::Pull);
    }

    #[test]
    fn repeated_config_binding_is_rejected() {
        let file = parse(
            "bindings:\n  - {panel: images, key: x, action: pull}\n  - {panel: image list, key: x, action: save}\n",
        );
        let error = Settings::resolve(&CliArgs::default(), file).unwrap_err();
        assert!(matches!(error, ConsoleError::DuplicateBinding { .. }));
        assert!(error.is_fatal());
    }

    #[test]
    fn unknown_panel_and_action_are_fatal() {
        let file = parse("bindings:\n  - {panel: volumes, key: x, action: pull}\n");
        let error = Settings::resolve(&CliArgs::default(), file).unwrap_err();
        assert_eq!(error, ConsoleError::UnknownPanel("volumes".to_string()));

        let file = parse("bindings:\n  - {panel: images, key: x, action: explode}\n");
        let error = Settings::resolve(&CliArgs::default(), file).unwrap_err();
        assert!(matches!(error, ConsoleError::Config(_)));
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "refresh_secs: 9\nlog_file: /tmp/berth.log").unwrap();
        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            ..CliArgs::default()
        };
        let settings = Settings::load(&args).unwrap();
        assert_eq!(settings.refresh, Duration::from_secs(9));
        assert_eq!(settings.source, Some(file.path().display().to_string()));
        assert!(settings.log_file.is_some());
    }

    #[test]
    fn unreadable_config_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let args = CliArgs {
            config: Some(missing.clone()),
            ..CliArgs::default()
        };
        let error = Settings::load(&args).unwrap_err();
        assert!(format!("{error:#}").contains("nope.yaml"));
    }
}
