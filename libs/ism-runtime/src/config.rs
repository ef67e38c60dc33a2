//! Typed, layered configuration loading (spec §6, §10.3).
//!
//! Layering matches the teacher's `AppConfig::load_layered`: defaults → YAML file →
//! environment variables, via `figment`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// `sqlite3` or `mysql` (spec §6).
    pub rdbms: String,
    pub db_name: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// If true, DB errors propagate rather than being swallowed (default `false`).
    #[serde(default)]
    pub raise_on_sql_error: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            rdbms: "sqlite3".to_string(),
            db_name: "ism.db".to_string(),
            host: None,
            user: None,
            password: None,
            raise_on_sql_error: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    pub root_dir: String,
    /// `epoch_seconds` or `epoch_milliseconds` (spec §6).
    #[serde(default = "default_stamp_format")]
    pub stamp_format: String,
    #[serde(default = "default_tag")]
    pub tag: String,
}

fn default_stamp_format() -> String {
    "epoch_seconds".to_string()
}

fn default_tag() -> String {
    "default".to_string()
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            root_dir: "./runs".to_string(),
            stamp_format: default_stamp_format(),
            tag: default_tag(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `DEBUG/INFO/WARNING/ERROR/CRITICAL` (spec §6).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Filename under `<run_dir>/log/`; absent means console-only.
    #[serde(default)]
    pub file: Option<String>,
    /// Whether log records also bubble to stdout when `file` is set.
    #[serde(default = "default_propagate")]
    pub propagate: bool,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_propagate() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            propagate: default_propagate(),
        }
    }
}

/// Top-level engine configuration (spec §6).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            runtime: RuntimeSection::default(),
            logging: Some(LoggingConfig::default()),
        }
    }
}

impl EngineConfig {
    /// Layered loading: defaults → YAML file → environment variables
    /// (`ISM__DATABASE__RDBMS=mysql` maps to `database.rdbms`, etc).
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file(config_path.as_ref()))
            .merge(Env::prefixed("ISM__").split("__"));

        figment
            .extract()
            .with_context(|| "failed to extract EngineConfig from figment".to_string())
    }

    /// Loads from `config_path` if given, otherwise falls back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => Ok(EngineConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_layered_applies_yaml_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database:\n  rdbms: mysql\n  db_name: ism\nruntime:\n  root_dir: /tmp/runs\n  tag: custom\n"
        )
        .unwrap();
        let cfg = EngineConfig::load_layered(file.path()).unwrap();
        assert_eq!(cfg.database.rdbms, "mysql");
        assert_eq!(cfg.runtime.tag, "custom");
        // stamp_format not set in YAML: falls back to the default.
        assert_eq!(cfg.runtime.stamp_format, "epoch_seconds");
    }

    #[test]
    fn load_or_default_with_no_path_uses_defaults() {
        let cfg = EngineConfig::load_or_default(None::<&str>).unwrap();
        assert_eq!(cfg.database.rdbms, "sqlite3");
    }
}
