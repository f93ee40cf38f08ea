//! Configuration file support for pycoupling
//!
//! Settings are read from `.pycoupling.toml` (or `pycoupling.toml`) in the
//! analyzed directory or any of its parents. Command-line flags override
//! whatever the file says.
//!
//! ## Configuration File Format
//!
//! ```toml
//! # .pycoupling.toml
//!
//! [analysis]
//! recursive = true
//! include = []
//! exclude = ["tests/**", "migrations/**"]
//! # Infer layers from package names when no [architecture] is declared
//! auto_detect = true
//!
//! [architecture]
//! # Report modules outside every layer, and layers without a rule
//! strict = false
//!
//! [[architecture.layers]]
//! name = "presentation"
//! packages = ["app.api.**", "app.views.**"]
//!
//! [[architecture.layers]]
//! name = "domain"
//! packages = ["app.models.**"]
//!
//! [[architecture.rules]]
//! from = "presentation"
//! allow = ["domain"]
//!
//! [[architecture.rules]]
//! from = "domain"
//! allow = []
//!
//! [thresholds]
//! # Violations from one module before it is flagged for restructuring
//! module_violation_threshold = 3
//! # Layer cohesion below this is reported
//! low_cohesion = 0.5
//! # Quality gate used by `pycoupling check`
//! max_cycles = 0
//! max_violations = 0
//! min_compliance = 0.0
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::architecture::{ArchitectureSpec, UNKNOWN_LAYER, compile_glob};
use crate::collector::validate_pattern;
use crate::recommendations::RecommendationThresholds;

const CONFIG_NAMES: [&str; 2] = [".pycoupling.toml", "pycoupling.toml"];

/// Errors that can occur when loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid glob pattern: {0}")]
    PatternError(String),

    #[error("Invalid architecture: {0}")]
    InvalidArchitecture(String),
}

/// Analysis configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Descend into subdirectories
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Only analyze files matching one of these globs (all files when empty)
    #[serde(default)]
    pub include: Vec<String>,

    /// Files to leave out of the analysis
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Infer layers when no architecture is declared
    #[serde(default = "default_true")]
    pub auto_detect: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            include: Vec::new(),
            exclude: Vec::new(),
            auto_detect: true,
        }
    }
}

/// Threshold configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdsConfig {
    /// Violations from one module before a restructuring recommendation
    #[serde(default = "default_module_violation_threshold")]
    pub module_violation_threshold: usize,

    /// Layer cohesion below this is reported
    #[serde(default = "default_low_cohesion")]
    pub low_cohesion: f64,

    /// Maximum number of cycles tolerated by `check`
    #[serde(default)]
    pub max_cycles: usize,

    /// Maximum number of layer violations tolerated by `check`
    #[serde(default)]
    pub max_violations: usize,

    /// Minimum architecture compliance (0.0 - 1.0) required by `check`
    #[serde(default)]
    pub min_compliance: f64,
}

fn default_module_violation_threshold() -> usize {
    3
}

fn default_low_cohesion() -> f64 {
    0.5
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            module_violation_threshold: default_module_violation_threshold(),
            low_cohesion: default_low_cohesion(),
            max_cycles: 0,
            max_violations: 0,
            min_compliance: 0.0,
        }
    }
}

impl ThresholdsConfig {
    pub fn recommendation_thresholds(&self) -> RecommendationThresholds {
        RecommendationThresholds {
            module_violation_threshold: self.module_violation_threshold,
            low_cohesion: self.low_cohesion,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PyCouplingConfig {
    /// File selection and auto-detection
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Declared layers and their dependency rules
    #[serde(default)]
    pub architecture: ArchitectureSpec,

    /// Recommendation and quality-gate thresholds
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
}

impl PyCouplingConfig {
    /// The declared architecture, if it has both layers and rules
    pub fn architecture(&self) -> Option<&ArchitectureSpec> {
        self.architecture
            .is_actionable()
            .then_some(&self.architecture)
    }

    /// Check patterns and layer references
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pattern in self.analysis.include.iter().chain(&self.analysis.exclude) {
            validate_pattern(pattern).map_err(|e| ConfigError::PatternError(e.to_string()))?;
        }

        let mut layer_names = HashSet::new();
        for layer in &self.architecture.layers {
            if layer.name.trim().is_empty() {
                return Err(ConfigError::InvalidArchitecture(
                    "layer with an empty name".to_string(),
                ));
            }
            if !layer_names.insert(layer.name.as_str()) {
                return Err(ConfigError::InvalidArchitecture(format!(
                    "layer '{}' is declared more than once",
                    layer.name
                )));
            }
            for pattern in &layer.packages {
                if compile_glob(pattern).is_none() {
                    return Err(ConfigError::PatternError(format!(
                        "layer '{}' has an empty or invalid package pattern '{}'",
                        layer.name, pattern
                    )));
                }
            }
        }

        let known = |name: &str| name == UNKNOWN_LAYER || layer_names.contains(name);
        for rule in &self.architecture.rules {
            for name in std::iter::once(&rule.from)
                .chain(&rule.allow)
                .chain(&rule.deny)
            {
                if !known(name) {
                    return Err(ConfigError::InvalidArchitecture(format!(
                        "rule for '{}' references undeclared layer '{}'",
                        rule.from, name
                    )));
                }
            }
        }

        if !(0.0..=1.0).contains(&self.thresholds.min_compliance) {
            return Err(ConfigError::InvalidArchitecture(format!(
                "min_compliance must be between 0.0 and 1.0, got {}",
                self.thresholds.min_compliance
            )));
        }

        Ok(())
    }
}

/// Load configuration from the project directory
///
/// Searches for `.pycoupling.toml` in the given directory and parent
/// directories. Returns the default configuration when there is none.
pub fn load_config(project_path: &Path) -> Result<PyCouplingConfig, ConfigError> {
    match find_config_file(project_path) {
        Some(path) => load_config_file(&path),
        None => Ok(PyCouplingConfig::default()),
    }
}

/// Load and validate a specific configuration file
pub fn load_config_file(path: &Path) -> Result<PyCouplingConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: PyCouplingConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Find the config file by searching up the directory tree
pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
    let mut current = if start_path.is_file() {
        start_path.parent()?.to_path_buf()
    } else {
        start_path.to_path_buf()
    };

    loop {
        for name in &CONFIG_NAMES {
            let config_path = current.join(name);
            if config_path.exists() {
                return Some(config_path);
            }
        }

        if let Some(parent) = current.parent() {
            current = parent.to_path_buf();
        } else {
            break;
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = PyCouplingConfig::default();
        assert!(config.analysis.recursive);
        assert!(config.analysis.auto_detect);
        assert!(config.architecture().is_none());
        assert_eq!(config.thresholds.module_violation_threshold, 3);
        assert_eq!(config.thresholds.low_cohesion, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [analysis]
            exclude = ["tests/**"]
            auto_detect = false

            [architecture]
            strict = true

            [[architecture.layers]]
            name = "presentation"
            packages = ["app.api.**"]

            [[architecture.layers]]
            name = "domain"
            packages = ["app.models.**"]

            [[architecture.rules]]
            from = "presentation"
            allow = ["domain"]

            [[architecture.rules]]
            from = "domain"
            deny = ["presentation"]

            [thresholds]
            module_violation_threshold = 5
            max_cycles = 2
            min_compliance = 0.9
        "#;

        let config: PyCouplingConfig = toml::from_str(toml).unwrap();
        assert!(config.analysis.recursive);
        assert!(!config.analysis.auto_detect);
        assert_eq!(config.analysis.exclude, vec!["tests/**".to_string()]);

        let arch = config.architecture().unwrap();
        assert!(arch.strict);
        assert_eq!(arch.layers.len(), 2);
        assert_eq!(arch.rules[1].deny, vec!["presentation".to_string()]);
        assert!(arch.rules[1].allow.is_empty());

        assert_eq!(config.thresholds.module_violation_threshold, 5);
        assert_eq!(config.thresholds.low_cohesion, 0.5);
        assert_eq!(config.thresholds.max_cycles, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rule_with_undeclared_layer() {
        let toml = r#"
            [[architecture.layers]]
            name = "domain"
            packages = ["app.models.**"]

            [[architecture.rules]]
            from = "domain"
            allow = ["persistence"]
        "#;
        let config: PyCouplingConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidArchitecture(_)));
        assert!(err.to_string().contains("persistence"));
    }

    #[test]
    fn test_duplicate_layer_and_empty_pattern() {
        let duplicate: PyCouplingConfig = toml::from_str(
            r#"
            [[architecture.layers]]
            name = "domain"
            [[architecture.layers]]
            name = "domain"
        "#,
        )
        .unwrap();
        assert!(matches!(
            duplicate.validate(),
            Err(ConfigError::InvalidArchitecture(_))
        ));

        let empty_pattern: PyCouplingConfig = toml::from_str(
            r#"
            [[architecture.layers]]
            name = "domain"
            packages = [""]
        "#,
        )
        .unwrap();
        assert!(matches!(
            empty_pattern.validate(),
            Err(ConfigError::PatternError(_))
        ));
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let config: PyCouplingConfig = toml::from_str(
            r#"
            [analysis]
            exclude = ["^tests"]
        "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::PatternError(_))));
    }

    #[test]
    fn test_find_config_in_parent() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("src/app");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            dir.path().join(".pycoupling.toml"),
            "[thresholds]\nmax_violations = 4\n",
        )
        .unwrap();

        assert_eq!(
            find_config_file(&nested),
            Some(dir.path().join(".pycoupling.toml"))
        );
        let config = load_config(&nested).unwrap();
        assert_eq!(config.thresholds.max_violations, 4);
    }

    #[test]
    fn test_malformed_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pycoupling.toml");
        fs::write(&path, "[analysis\nrecursive = ").unwrap();
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
