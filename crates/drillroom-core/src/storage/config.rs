//! TOML-based application configuration.
//!
//! Stores:
//! - Engine settings (tick granularity, start policy)
//! - Logging level
//! - The drill and workout catalog
//!
//! Configuration is stored at `~/.config/drillroom/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::catalog::{Catalog, Drill, Workout};
use crate::error::ConfigError;
use crate::session::StartPolicy;

/// Sequencer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds removed from the current step by each tick.
    #[serde(default = "default_tick_granularity")]
    pub tick_granularity_secs: u64,
    #[serde(default)]
    pub start_policy: StartPolicy,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/drillroom/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_drills")]
    pub drills: Vec<Drill>,
    #[serde(default = "default_workouts")]
    pub workouts: Vec<Workout>,
}

fn default_tick_granularity() -> u64 {
    1
}
fn default_log_level() -> String {
    "info".into()
}

fn default_drills() -> Vec<Drill> {
    vec![
        Drill {
            id: "ball-handling".into(),
            name: "Ball Handling".into(),
            duration_secs: 120,
            instructions: "Stationary dribbles, alternate hands every 10 touches.".into(),
        },
        Drill {
            id: "wall-passes".into(),
            name: "Wall Passes".into(),
            duration_secs: 90,
            instructions: "Two-touch passes against a wall, both feet.".into(),
        },
        Drill {
            id: "shuttle-sprints".into(),
            name: "Shuttle Sprints".into(),
            duration_secs: 60,
            instructions: "5-10-5 shuttle, walk back to recover.".into(),
        },
        Drill {
            id: "cool-down".into(),
            name: "Cool Down".into(),
            duration_secs: 180,
            instructions: "Light jog and stretching.".into(),
        },
    ]
}

fn default_workouts() -> Vec<Workout> {
    vec![Workout {
        id: "starter".into(),
        name: "Starter Workout".into(),
        drills: vec![
            "ball-handling".into(),
            "wall-passes".into(),
            "shuttle-sprints".into(),
            "cool-down".into(),
        ],
    }]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_granularity_secs: default_tick_granularity(),
            start_policy: StartPolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
            drills: default_drills(),
            workouts: default_workouts(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let unknown = || ConfigError::UnknownKey(key.to_string());

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => serde_json::Value::Number(
                    value
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                        .into(),
                ),
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Reject values the engine would refuse at `start()`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.tick_granularity_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "engine.tick_granularity_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        if let Some(drill) = self.drills.iter().find(|d| d.duration_secs == 0) {
            return Err(ConfigError::InvalidValue {
                key: format!("drills.{}.duration_secs", drill.id),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.drills.clone(), self.workouts.clone())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StepCatalog;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.engine.tick_granularity_secs, 1);
        assert_eq!(parsed.engine.start_policy, StartPolicy::Reject);
        assert_eq!(parsed.drills.len(), cfg.drills.len());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[engine]\nstart_policy = \"stop_previous\"\n").unwrap();
        assert_eq!(parsed.engine.start_policy, StartPolicy::StopPrevious);
        assert_eq!(parsed.engine.tick_granularity_secs, 1);
        assert_eq!(parsed.logging.level, "info");
        assert!(!parsed.workouts.is_empty());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("engine.tick_granularity_secs").as_deref(), Some("1"));
        assert_eq!(cfg.get("engine.start_policy").as_deref(), Some("reject"));
        assert!(cfg.get("engine.missing_key").is_none());
    }

    #[test]
    fn set_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.set("engine.tick_granularity_secs", "5").unwrap();
        cfg.set("engine.start_policy", "stop_previous").unwrap();
        cfg.set("logging.level", "debug").unwrap();
        assert_eq!(cfg.engine.tick_granularity_secs, 5);
        assert_eq!(cfg.engine.start_policy, StartPolicy::StopPrevious);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("engine.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.set("engine.tick_granularity_secs", "soon").is_err());
        assert!(cfg.set("engine.tick_granularity_secs", "0").is_err());
        assert!(cfg.set("engine.start_policy", "whenever").is_err());
        assert_eq!(cfg.engine.tick_granularity_secs, 1);
    }

    #[test]
    fn load_from_writes_defaults_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.engine.tick_granularity_secs, 1);

        std::fs::write(&path, "engine = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }

    #[test]
    fn default_catalog_resolves_starter_workout() {
        let steps = Config::default().catalog().workout("starter").unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].id.as_str(), "ball-handling");
    }
}
