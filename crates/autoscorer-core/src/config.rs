//! Layered configuration store (spec §6): env var > config file (CWD,
//! project root, user dir, system dir, in that order) > built-in default.
//!
//! A typed key registry with defaults, rather than one struct field per
//! variable, since spec §6 leaves the key set open-ended ("not
//! exhaustive").

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A config value, typed by what its built-in default looks like.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ConfigValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Parse a raw string into the same variant shape as `self` (used when
    /// overriding a default from an env var or file value, both of which
    /// arrive as strings/TOML values).
    fn reparse_as(&self, raw: &str) -> ConfigValue {
        match self {
            ConfigValue::Int(_) => raw
                .parse::<i64>()
                .map(ConfigValue::Int)
                .unwrap_or_else(|_| ConfigValue::Str(raw.to_string())),
            ConfigValue::Float(_) => raw
                .parse::<f64>()
                .map(ConfigValue::Float)
                .unwrap_or_else(|_| ConfigValue::Str(raw.to_string())),
            ConfigValue::Bool(_) => parse_bool(raw)
                .map(ConfigValue::Bool)
                .unwrap_or_else(|| ConfigValue::Str(raw.to_string())),
            ConfigValue::List(_) => ConfigValue::List(
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            ConfigValue::Str(_) => ConfigValue::Str(raw.to_string()),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Built-in defaults for the recognized keys (spec §6). Not exhaustive —
/// unrecognized keys looked up via [`Config::get`] simply return `None`.
fn builtin_defaults() -> HashMap<&'static str, ConfigValue> {
    use ConfigValue::*;
    HashMap::from([
        ("DEFAULT_EXECUTOR", Str("container".to_string())),
        ("IMAGE_PULL_POLICY", Str("if-not-present".to_string())),
        ("DEFAULT_CPU", Float(1.0)),
        ("DEFAULT_MEMORY", Str("1Gi".to_string())),
        ("DEFAULT_GPU", Int(0)),
        ("TIMEOUT", Int(3600)),
        ("CLUSTER_ENABLED", Bool(false)),
        ("CLUSTER_NAMESPACE", Str("default".to_string())),
        ("TASK_BROKER", Str("nats://127.0.0.1:4222".to_string())),
        ("LOG_DIR", Str("./logs".to_string())),
        ("WORKSPACE_ROOT", Str("./workspaces".to_string())),
        ("SECURITY_OPTS", List(vec!["no-new-privileges".to_string()])),
        ("MEMORY_THRESHOLD", Str("16Gi".to_string())),
        ("RETRY_MAX_ATTEMPTS", Int(3)),
        ("RETRY_BASE_BACKOFF_SECS", Float(1.0)),
        ("RETRY_MAX_BACKOFF_SECS", Float(30.0)),
        ("CIRCUIT_BREAKER_THRESHOLD", Int(5)),
        ("CIRCUIT_BREAKER_COOLDOWN_SECS", Int(60)),
        ("SCORER_RELOAD_INTERVAL_SECS", Int(1)),
        ("SCORER_TIMEOUT_SECS", Int(300)),
        ("METRICS_PORT", Int(9090)),
    ])
}

/// A loaded, immutable configuration snapshot. "Reload" (spec §5: "Config:
/// read-only after load; reloads via atomic pointer swap") is modeled by
/// wrapping a `Config` in `arc_swap::ArcSwap` at the call site rather than
/// by this type supporting in-place mutation.
#[derive(Debug, Clone)]
pub struct Config {
    values: HashMap<String, ConfigValue>,
}

impl Config {
    /// Load with full precedence: env var > file > built-in default.
    pub fn load() -> Self {
        Self::load_from(&search_config_files())
    }

    /// Load, searching only the given file paths (in precedence order,
    /// first existing file wins) — used by tests to avoid touching the
    /// real filesystem search path.
    pub fn load_from(file_candidates: &[PathBuf]) -> Self {
        let mut values: HashMap<String, ConfigValue> = builtin_defaults()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        if let Some(file_values) = file_candidates.iter().find_map(|p| read_config_file(p)) {
            for (key, raw) in file_values {
                if let Some(default) = values.get(key.as_str()) {
                    values.insert(key, default.reparse_as(&raw));
                } else {
                    values.insert(key, ConfigValue::Str(raw));
                }
            }
        }

        for (key, default) in builtin_defaults() {
            if let Ok(raw) = std::env::var(key) {
                values.insert(key.to_string(), default.reparse_as(&raw));
            }
        }

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ConfigValue::as_int)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ConfigValue::as_float)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ConfigValue::as_bool)
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(ConfigValue::as_list)
    }

    /// All recognized keys and their current values, for `config show`/`dump`.
    pub fn dump(&self) -> Vec<(String, ConfigValue)> {
        let mut entries: Vec<_> = self.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

/// The config file search path, in precedence order (`config paths`).
pub fn search_paths() -> Vec<PathBuf> {
    search_config_files()
}

/// CWD, then a project root found by walking up for `Cargo.lock`/`.git`,
/// then the user config dir, then the system config dir.
fn search_config_files() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("./autoscorer.toml")];

    if let Some(root) = find_project_root(&std::env::current_dir().unwrap_or_default()) {
        candidates.push(root.join("autoscorer.toml"));
    }

    if let Some(user_dir) = dirs::config_dir() {
        candidates.push(user_dir.join("autoscorer/config.toml"));
    }

    candidates.push(PathBuf::from("/etc/autoscorer/config.toml"));
    candidates
}

fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        if dir.join("Cargo.lock").is_file() || dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        dir = dir.parent()?;
    }
}

fn read_config_file(path: &Path) -> Option<HashMap<String, String>> {
    let content = std::fs::read_to_string(path).ok()?;
    let parsed: toml::Value = toml::from_str(&content).ok()?;
    let table = parsed.as_table()?;
    Some(
        table
            .iter()
            .filter_map(|(k, v)| {
                let s = match v {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    toml::Value::Array(arr) => arr
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect::<Vec<_>>()
                        .join(","),
                    _ => return None,
                };
                Some((k.clone(), s))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_used_when_nothing_overrides() {
        let config = Config::load_from(&[]);
        assert_eq!(config.get_str("DEFAULT_EXECUTOR"), Some("container"));
        assert_eq!(config.get_float("DEFAULT_CPU"), Some(1.0));
        assert_eq!(config.get_bool("CLUSTER_ENABLED"), Some(false));
    }

    #[test]
    fn file_value_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoscorer.toml");
        std::fs::write(&path, "DEFAULT_EXECUTOR = \"local\"\nDEFAULT_GPU = 2\n").unwrap();

        let config = Config::load_from(&[path]);
        assert_eq!(config.get_str("DEFAULT_EXECUTOR"), Some("local"));
        assert_eq!(config.get_int("DEFAULT_GPU"), Some(2));
    }

    #[test]
    fn env_var_overrides_file_and_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoscorer.toml");
        std::fs::write(&path, "DEFAULT_EXECUTOR = \"local\"\n").unwrap();

        std::env::set_var("DEFAULT_EXECUTOR", "cluster");
        let config = Config::load_from(&[path]);
        std::env::remove_var("DEFAULT_EXECUTOR");

        assert_eq!(config.get_str("DEFAULT_EXECUTOR"), Some("cluster"));
    }

    #[test]
    fn bool_accepts_multiple_spellings() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn missing_file_candidates_fall_back_to_defaults() {
        let config = Config::load_from(&[PathBuf::from("/nonexistent/autoscorer.toml")]);
        assert_eq!(config.get_str("DEFAULT_EXECUTOR"), Some("container"));
    }
}
