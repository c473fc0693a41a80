//! Reads the configuration artifact and the live process environment into a flat map.
//!
//! Two artifact formats are understood:
//!
//! - `.env` style files (`KEY=value` per line), parsed via `dotenvy`
//! - YAML files (`*.yaml` / `*.yml`) whose nested mappings are flattened into
//!   upper snake case keys, so `app: { logLevel: debug }` becomes `APP_LOG_LEVEL=debug`
//!
//! The process environment itself is never modified. Instead [`EnvSource::load`] returns
//! the merged view in which live variables shadow the values of the file.

use crate::config::ConfigError;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Variable name to value, as read from the environment and the config artifact.
pub type RawEnvironment = BTreeMap<String, String>;

/// Environment variable pointing to the directory which contains the config artifacts.
pub const CONFIG_DIR_VAR: &str = "APP_CONFIG_DIR";

/// Artifacts used when no environment specific one exists.
const DEFAULT_ARTIFACTS: [&str; 2] = [".env", "config.yaml"];

/// Locates and reads the configuration artifact for an environment.
#[derive(Clone, Debug)]
pub struct EnvSource {
    dir: PathBuf,
    live: RawEnvironment,
}

impl EnvSource {
    /// Creates a source reading artifacts from `dir`, backed by the live process environment.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        EnvSource {
            dir: dir.into(),
            live: process_environment(),
        }
    }

    /// Creates a source for the directory given in `APP_CONFIG_DIR` (or the working directory).
    pub fn from_process() -> Self {
        let dir = env::var_os(CONFIG_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Self::new(dir)
    }

    /// Replaces the live environment (mostly useful for tests).
    pub fn with_live_environment(mut self, live: RawEnvironment) -> Self {
        self.live = live;
        self
    }

    /// Lists all artifact paths for the given environment, most specific first.
    pub fn candidates(&self, env_name: &str) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(5);
        if is_plain_name(env_name) {
            candidates.push(self.dir.join(format!("{env_name}.env")));
            candidates.push(self.dir.join(format!(".env.{env_name}")));
            candidates.push(self.dir.join(format!("config.{env_name}.yaml")));
        }
        candidates.extend(DEFAULT_ARTIFACTS.iter().map(|name| self.dir.join(name)));

        candidates
    }

    /// Returns the most specific artifact which exists for the given environment.
    pub fn locate(&self, env_name: &str) -> Result<PathBuf, ConfigError> {
        let candidates = self.candidates(env_name);
        match candidates.iter().find(|path| path.is_file()) {
            Some(path) => Ok(path.clone()),
            None => Err(ConfigError::FileNotFound {
                env: env_name.to_string(),
                searched: candidates,
            }),
        }
    }

    /// Reads the artifact for `env_name` and overlays the live environment on top of it.
    pub fn load(&self, env_name: &str) -> Result<RawEnvironment, ConfigError> {
        let path = self.locate(env_name)?;
        tracing::debug!("Loading configuration for '{}' from {}", env_name, path.display());

        let mut merged = read_artifact(&path)?;
        merged.extend(
            self.live
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        Ok(merged)
    }
}

fn process_environment() -> RawEnvironment {
    env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Environment names are only used as part of a file name if they cannot escape the config dir.
fn is_plain_name(env_name: &str) -> bool {
    !env_name.is_empty()
        && env_name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

/// Reads a single artifact, choosing the format based on its extension.
pub fn read_artifact(path: &Path) -> Result<RawEnvironment, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::FileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => parse_yaml(path, &content),
        _ => parse_dotenv(path, &content),
    }
}

fn parse_dotenv(path: &Path, content: &str) -> Result<RawEnvironment, ConfigError> {
    dotenvy::from_read_iter(content.as_bytes())
        .map(|entry| entry.map_err(|err| ConfigError::parse(path, err)))
        .collect()
}

fn parse_yaml(path: &Path, content: &str) -> Result<RawEnvironment, ConfigError> {
    let mut result = RawEnvironment::new();
    if content.trim().is_empty() {
        return Ok(result);
    }

    match serde_yaml::from_str::<Value>(content).map_err(|err| ConfigError::parse(path, err))? {
        Value::Mapping(mapping) => flatten_mapping(path, None, mapping, &mut result)?,
        Value::Null => {}
        _ => return Err(ConfigError::parse(path, "expected a mapping at the top level")),
    }

    Ok(result)
}

fn flatten_mapping(
    path: &Path,
    prefix: Option<&str>,
    mapping: serde_yaml::Mapping,
    target: &mut RawEnvironment,
) -> Result<(), ConfigError> {
    for (key, value) in mapping {
        let key = scalar_to_string(&key)
            .ok_or_else(|| ConfigError::parse(path, "mapping keys must be scalars"))?;
        let name = env_key(prefix, &key);

        match value {
            Value::Mapping(nested) => flatten_mapping(path, Some(&name), nested, target)?,
            Value::Null => {}
            Value::Sequence(items) => {
                let items = items
                    .iter()
                    .map(scalar_to_string)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        ConfigError::parse(path, format!("'{}' must only contain scalars", name))
                    })?;
                target.insert(name, items.join(","));
            }
            other => {
                let value = scalar_to_string(&other).ok_or_else(|| {
                    ConfigError::parse(path, format!("unsupported value for '{}'", name))
                })?;
                target.insert(name, value);
            }
        }
    }

    Ok(())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(string) => Some(string.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Turns `logLevel` below `app` into `APP_LOG_LEVEL`.
fn env_key(prefix: Option<&str>, key: &str) -> String {
    let mut name = String::with_capacity(key.len() + prefix.map_or(0, |p| p.len() + 1));
    if let Some(prefix) = prefix {
        name.push_str(prefix);
        name.push('_');
    }

    let mut previous_lower = false;
    for ch in key.chars() {
        if matches!(ch, '-' | '.' | ' ') {
            name.push('_');
            previous_lower = false;
            continue;
        }
        if ch.is_uppercase() && previous_lower {
            name.push('_');
        }
        name.extend(ch.to_uppercase());
        previous_lower = ch.is_lowercase() || ch.is_ascii_digit();
    }

    name
}
