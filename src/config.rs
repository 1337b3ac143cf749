use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::iteration_types::{IterationId, PollInterval};
use crate::logger::Logger;

pub(crate) const ITERATION_PLACEHOLDER: &str = "{{iterationId}}";
pub(crate) const DEFAULT_CONFIG_PATH: &str = "ralph.yml";
pub(crate) const DEFAULT_ITERATIONS_DIR: &str = "iterations";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Config {
    pub(crate) command: String,
    #[serde(default = "default_iterations_dir")]
    pub(crate) iterations_dir: PathBuf,
    #[serde(default)]
    pub(crate) poll_interval_secs: PollInterval,
    #[serde(default)]
    pub(crate) log_path: Option<PathBuf>,
}

impl Config {
    /// Substitutes the iteration id into every placeholder of the command
    /// template. Other `{{...}}` tokens are left as written.
    pub(crate) fn render_command(&self, iteration: IterationId) -> String {
        self.command
            .replace(ITERATION_PLACEHOLDER, &iteration.to_string())
    }
}

fn default_iterations_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ITERATIONS_DIR)
}

/// The part of the config that validate mode reads. Every other key,
/// `command` included, is ignored, so a config that cannot drive a run can
/// still point validation at its records.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ValidateSettings {
    #[serde(default = "default_iterations_dir")]
    pub(crate) iterations_dir: PathBuf,
    #[serde(default)]
    pub(crate) log_path: Option<PathBuf>,
}

impl Default for ValidateSettings {
    fn default() -> Self {
        Self {
            iterations_dir: default_iterations_dir(),
            log_path: None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct LoadedConfig {
    pub(crate) config: Config,
    pub(crate) warnings: Vec<String>,
}

pub(crate) fn load_config(path: &Path) -> Result<LoadedConfig, String> {
    let mapping = read_config_mapping(path)?;
    let mut warnings: Vec<String> = unknown_top_level_keys(&mapping)
        .into_iter()
        .map(|key| format!("unknown config key: {}", key))
        .collect();
    validate_required_fields(&mapping)?;

    let config: Config = deserialize_mapping(path, mapping)?;
    warnings.extend(command_template_warnings(&config.command));
    Ok(LoadedConfig { config, warnings })
}

/// Reads only what validate mode needs from the config file.
pub(crate) fn load_validate_settings(path: &Path) -> Result<ValidateSettings, String> {
    let mapping = read_config_mapping(path)?;
    optional_non_empty_string(&mapping, "iterations_dir", "iterations_dir")?;
    optional_non_empty_string(&mapping, "log_path", "log_path")?;
    deserialize_mapping(path, mapping)
}

fn read_config_mapping(path: &Path) -> Result<Mapping, String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config {}: {}", path.display(), err))?;
    let value: Value = serde_yaml::from_str(&content)
        .map_err(|err| format!("Failed to parse config {}: {}", path.display(), err))?;
    match value {
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(format!("Config {} must be a YAML mapping", path.display())),
    }
}

fn deserialize_mapping<T: DeserializeOwned>(path: &Path, mapping: Mapping) -> Result<T, String> {
    serde_path_to_error::deserialize(Value::Mapping(mapping)).map_err(|err| {
        format!(
            "Failed to parse config {}: {}: {}",
            path.display(),
            err.path(),
            err.inner()
        )
    })
}

pub(crate) fn emit_config_warnings(logger: &Logger, warnings: &[String]) {
    for warning in warnings {
        logger.diagnostic("config_warning", &format!("Warning: {}", warning));
    }
}

fn unknown_top_level_keys(mapping: &Mapping) -> Vec<String> {
    let allowed = ["command", "iterations_dir", "poll_interval_secs", "log_path"];

    mapping
        .keys()
        .filter_map(|key| key.as_str().map(|value| value.to_string()))
        .filter(|key| !allowed.contains(&key.as_str()))
        .collect()
}

fn validate_required_fields(mapping: &Mapping) -> Result<(), String> {
    require_non_empty_string(mapping, "command", "command")?;
    optional_non_empty_string(mapping, "iterations_dir", "iterations_dir")?;
    optional_non_empty_string(mapping, "log_path", "log_path")?;
    Ok(())
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("placeholder pattern compiles")
    })
}

pub(crate) fn command_template_warnings(command: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    if !command.contains(ITERATION_PLACEHOLDER) {
        warnings.push(format!(
            "command does not contain {}; every run will execute the same command",
            ITERATION_PLACEHOLDER
        ));
    }
    for captures in placeholder_pattern().captures_iter(command) {
        let whole = captures.get(0).map(|m| m.as_str()).unwrap_or_default();
        if whole == ITERATION_PLACEHOLDER {
            continue;
        }
        warnings.push(format!(
            "command contains unknown placeholder {}; it will be passed through unchanged",
            whole
        ));
    }
    warnings
}

fn require_non_empty_string(mapping: &Mapping, key_name: &str, label: &str) -> Result<(), String> {
    let key = Value::String(key_name.to_string());
    match mapping.get(&key) {
        None => Err(format!("Missing required config value: {}", label)),
        Some(Value::Null) => Err(format!("{} must not be null", label)),
        Some(Value::String(value)) => {
            if value.trim().is_empty() {
                Err(format!("{} must not be empty", label))
            } else {
                Ok(())
            }
        }
        Some(_) => Err(format!("{} must be a string", label)),
    }
}

fn optional_non_empty_string(mapping: &Mapping, key_name: &str, label: &str) -> Result<(), String> {
    let key = Value::String(key_name.to_string());
    match mapping.get(&key) {
        None => Ok(()),
        Some(_) => require_non_empty_string(mapping, key_name, label),
    }
}
