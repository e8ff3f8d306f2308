use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Looked up in the working directory when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "iptm-annotator.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Viewer settings.  Every field is optional in the TOML file.
///
/// ```toml
/// id_column = "protein_id"
/// x_column = "peak"
/// y_column = "iptm"
/// size_range = [2.0, 9.0]
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Identifier column used for labels and identifier matching.
    pub id_column: String,
    /// Plotted on the x axis.
    pub x_column: String,
    /// Plotted on the y axis.
    pub y_column: String,
    /// Complex name column offered for membership selection after a merge.
    pub complex_column: String,
    /// Pre-filled in the merge dialog.
    pub multiple_id_delimiter: String,
    pub size_range: [f32; 2],
    pub alpha_range: [f32; 2],
    /// Radius of points whose size is not mapped.
    pub point_radius: f32,
    /// Opacity multiplier for unselected points while a selection is active.
    pub dim_factor: f32,
    /// Maximum number of text labels drawn for selected points.
    pub label_limit: usize,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            id_column: "id".to_string(),
            x_column: "peak".to_string(),
            y_column: "iptm".to_string(),
            complex_column: "Recommended name".to_string(),
            multiple_id_delimiter: "|".to_string(),
            size_range: [2.0, 8.0],
            alpha_range: [0.15, 1.0],
            point_radius: 3.0,
            dim_factor: 0.15,
            label_limit: 40,
        }
    }
}

impl AnnotatorConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists, or
    /// fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    log::debug!("No {DEFAULT_CONFIG_FILE} found, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.clone(),
                source,
            },
            other => other,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: AnnotatorConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let [smin, smax] = self.size_range;
        if !(smin > 0.0 && smin <= smax) {
            return Err(ConfigError::Invalid(format!(
                "size_range must be positive and ordered, got [{smin}, {smax}]"
            )));
        }
        let [amin, amax] = self.alpha_range;
        if !(0.0..=1.0).contains(&amin) || !(0.0..=1.0).contains(&amax) || amin > amax {
            return Err(ConfigError::Invalid(format!(
                "alpha_range must be ordered within [0, 1], got [{amin}, {amax}]"
            )));
        }
        if !(0.0..=1.0).contains(&self.dim_factor) {
            return Err(ConfigError::Invalid(format!(
                "dim_factor must be within [0, 1], got {}",
                self.dim_factor
            )));
        }
        if self.point_radius <= 0.0 {
            return Err(ConfigError::Invalid("point_radius must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AnnotatorConfig::from_toml(
            r#"
            id_column = "protein_id"
            size_range = [1.0, 12.0]
            "#,
        )
        .unwrap();
        assert_eq!(config.id_column, "protein_id");
        assert_eq!(config.size_range, [1.0, 12.0]);
        assert_eq!(config.y_column, "iptm");
        assert_eq!(config.label_limit, 40);
    }

    #[test]
    fn rejects_bad_ranges() {
        assert!(matches!(
            AnnotatorConfig::from_toml("alpha_range = [0.8, 0.2]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AnnotatorConfig::from_toml("size_range = [0.0, 4.0]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AnnotatorConfig::from_toml("dim_factor = 2.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AnnotatorConfig::from_toml("label_limit = \"many\""),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn loads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.toml");
        std::fs::write(&path, "x_column = \"pdockq\"\n").unwrap();
        let config = AnnotatorConfig::load(Some(&path)).unwrap();
        assert_eq!(config.x_column, "pdockq");

        let missing = AnnotatorConfig::load(Some(&dir.path().join("none.toml")));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
