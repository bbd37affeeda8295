use crate::errors::ConfigError;
use crate::scoring::DEFAULT_PASS_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_PATH: &str = ".readtrack/readtrack.db";
pub const DEFAULT_SEGMENTS_PER_STORY: i64 = 14;
pub const DEFAULT_CATALOG_SEGMENTS: i64 = 42;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub db_path: PathBuf,
    /// Segment count assumed for stories the caller gives no explicit total for.
    pub segments_per_story: i64,
    /// Total segments across the whole catalog, for the overall percentage.
    pub catalog_segments: i64,
    pub pass_threshold: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            segments_per_story: DEFAULT_SEGMENTS_PER_STORY,
            catalog_segments: DEFAULT_CATALOG_SEGMENTS,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Overlays `READTRACK_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("READTRACK_DB") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("READTRACK_SEGMENTS_PER_STORY") {
            self.segments_per_story = parse_count("READTRACK_SEGMENTS_PER_STORY", &v)?;
        }
        if let Some(v) = lookup("READTRACK_CATALOG_SEGMENTS") {
            self.catalog_segments = parse_count("READTRACK_CATALOG_SEGMENTS", &v)?;
        }
        if let Some(v) = lookup("READTRACK_PASS_THRESHOLD") {
            self.pass_threshold = parse_count("READTRACK_PASS_THRESHOLD", &v)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.segments_per_story <= 0 {
            return Err(ConfigError(format!(
                "segments_per_story must be positive (got {})",
                self.segments_per_story
            )));
        }
        if self.catalog_segments <= 0 {
            return Err(ConfigError(format!(
                "catalog_segments must be positive (got {})",
                self.catalog_segments
            )));
        }
        if self.pass_threshold < 0 {
            return Err(ConfigError(format!(
                "pass_threshold must not be negative (got {})",
                self.pass_threshold
            )));
        }
        Ok(())
    }
}

fn parse_count(key: &str, raw: &str) -> Result<i64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|e| ConfigError(format!("{key}: expected an integer, got '{raw}' ({e})")))
}

/// Loads engine settings from a YAML file. Missing keys keep their defaults.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut cfg: EngineConfig = if raw.trim().is_empty() {
        EngineConfig::default()
    } else {
        serde_yaml::from_str(&raw)
            .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?
    };

    // Relative database paths are taken from the config file's directory.
    if cfg.db_path.is_relative() {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            cfg.db_path = dir.join(&cfg.db_path);
        }
    }

    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.segments_per_story, 14);
        assert_eq!(cfg.catalog_segments, 42);
        assert_eq!(cfg.pass_threshold, 4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_override() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("readtrack.yaml");
        let mut f = std::fs::File::create(&path)?;
        writeln!(f, "db_path: data/app.db\nsegments_per_story: 10")?;

        let cfg = load_config(&path)?;
        assert_eq!(cfg.segments_per_story, 10);
        assert_eq!(cfg.catalog_segments, 42);
        assert_eq!(cfg.db_path, dir.path().join("data/app.db"));
        Ok(())
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("READTRACK_DB", "/tmp/x.db"),
            ("READTRACK_PASS_THRESHOLD", "5"),
        ]
        .into_iter()
        .collect();
        let mut cfg = EngineConfig::default();
        cfg.apply_env_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(cfg.pass_threshold, 5);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut cfg = EngineConfig::default();
        let err = cfg
            .apply_env_from(|k| (k == "READTRACK_SEGMENTS_PER_STORY").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.0.contains("READTRACK_SEGMENTS_PER_STORY"));
    }
}
