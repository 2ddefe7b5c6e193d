//! Analytics configuration: defaults, TOML file, environment, then CLI flags

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rules::{RuleMiningParams, DEFAULT_MAX_RULES, DEFAULT_MIN_SUPPORT};

pub const DEFAULT_DATASET_PATH: &str = "dataset/shopping_trends.csv";
/// Rules included in the affinity overview
pub const DEFAULT_OVERVIEW_RULES: usize = 15;

pub const ENV_DATASET: &str = "SHOPMIND_DATASET";
pub const ENV_KNOWLEDGE: &str = "SHOPMIND_KNOWLEDGE";
pub const ENV_MIN_SUPPORT: &str = "SHOPMIND_MIN_SUPPORT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticsConfig {
    pub dataset: PathBuf,
    pub knowledge: Option<PathBuf>,
    pub min_support: f64,
    pub max_rules: usize,
    pub overview_rules: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from(DEFAULT_DATASET_PATH),
            knowledge: None,
            min_support: DEFAULT_MIN_SUPPORT,
            max_rules: DEFAULT_MAX_RULES,
            overview_rules: DEFAULT_OVERVIEW_RULES,
        }
    }
}

/// Values given on the command line; they win over every other source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub dataset: Option<PathBuf>,
    pub knowledge: Option<PathBuf>,
    pub min_support: Option<f64>,
    pub max_rules: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

impl AnalyticsConfig {
    /// Resolve the configuration with precedence flags > env > file > default
    pub fn load(options: LoadOptions) -> Result<Self> {
        let mut config = match options.config_path.as_deref() {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(read_env)?;
        config.apply_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(ENV_DATASET) {
            self.dataset = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_KNOWLEDGE) {
            self.knowledge = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_MIN_SUPPORT) {
            self.min_support = value
                .trim()
                .parse()
                .map_err(|_| Error::InvalidEnvOverride {
                    key: ENV_MIN_SUPPORT.to_string(),
                    value,
                })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(dataset) = overrides.dataset {
            self.dataset = dataset;
        }
        if let Some(knowledge) = overrides.knowledge {
            self.knowledge = Some(knowledge);
        }
        if let Some(min_support) = overrides.min_support {
            self.min_support = min_support;
        }
        if let Some(max_rules) = overrides.max_rules {
            self.max_rules = max_rules;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_support > 0.0 && self.min_support <= 1.0) {
            return Err(Error::Validation(format!(
                "min_support must be in (0, 1], got {}",
                self.min_support
            )));
        }
        if self.max_rules == 0 {
            return Err(Error::Validation("max_rules must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn rule_params(&self) -> RuleMiningParams {
        RuleMiningParams {
            min_support: self.min_support,
            max_rules: self.max_rules,
        }
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.dataset, PathBuf::from(DEFAULT_DATASET_PATH));
        assert_eq!(config.min_support, 0.20);
        assert_eq!(config.max_rules, 20);
        assert_eq!(config.overview_rules, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_then_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "dataset = \"data/trends.csv\"").unwrap();
        writeln!(file, "min_support = 0.5").unwrap();

        let config = AnalyticsConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            overrides: ConfigOverrides {
                max_rules: Some(5),
                ..Default::default()
            },
        })
        .unwrap();

        assert_eq!(config.max_rules, 5);
        assert_eq!(config.overview_rules, DEFAULT_OVERVIEW_RULES);
        assert_eq!(config.rule_params().max_rules, 5);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AnalyticsConfig::default();
        config
            .apply_env_overrides(lookup_from(&[
                (ENV_DATASET, "/tmp/trends.csv"),
                (ENV_KNOWLEDGE, "/tmp/knowledge.json"),
                (ENV_MIN_SUPPORT, "0.3"),
            ]))
            .unwrap();

        assert_eq!(config.dataset, PathBuf::from("/tmp/trends.csv"));
        assert_eq!(config.knowledge, Some(PathBuf::from("/tmp/knowledge.json")));
        assert_eq!(config.min_support, 0.3);

        config.apply_overrides(ConfigOverrides {
            min_support: Some(0.4),
            ..Default::default()
        });
        assert_eq!(config.min_support, 0.4);
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = AnalyticsConfig::default();
        let result = config.apply_env_overrides(lookup_from(&[(ENV_MIN_SUPPORT, "lots")]));
        assert!(matches!(result, Err(Error::InvalidEnvOverride { .. })));
    }

    #[test]
    fn test_validation() {
        for min_support in [0.0, -0.1, 1.5, f64::NAN] {
            let config = AnalyticsConfig {
                min_support,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(Error::Validation(_))));
        }

        let config = AnalyticsConfig {
            max_rules: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "min_suport = 0.5").unwrap();

        let result = AnalyticsConfig::from_file(file.path());
        assert!(matches!(result, Err(Error::ConfigParse { .. })));
    }
}
