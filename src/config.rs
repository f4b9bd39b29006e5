use crate::scene::NormalizeSettings;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Stage-wide constants. Every field has a default, so a config file only
/// needs the keys it changes.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Largest extent every imported asset is normalized to.
    pub target_extent: f32,
    /// Depth of the ground plane (and the grid) below the world origin.
    pub ground_offset: f32,
    /// Camera distance from the origin after a view snap.
    pub camera_distance: f32,
    /// Closest and farthest orbit distance.
    pub zoom_limits: [f32; 2],
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            target_extent: 2.0,
            ground_offset: 1.0,
            camera_distance: 5.0,
            zoom_limits: [0.1, 1000.0],
        }
    }
}

impl StageConfig {
    pub fn normalize_settings(&self) -> NormalizeSettings {
        NormalizeSettings {
            target_extent: self.target_extent,
            ground_offset: self.ground_offset,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.target_extent.is_finite() && self.target_extent > 0.0) {
            return Err(ConfigError::Invalid {
                field: "target_extent",
                reason: format!("must be a positive number, got {}", self.target_extent),
            });
        }
        if !self.ground_offset.is_finite() {
            return Err(ConfigError::Invalid {
                field: "ground_offset",
                reason: format!("must be finite, got {}", self.ground_offset),
            });
        }
        if !(self.camera_distance.is_finite() && self.camera_distance > 0.0) {
            return Err(ConfigError::Invalid {
                field: "camera_distance",
                reason: format!("must be a positive number, got {}", self.camera_distance),
            });
        }
        let [near, far] = self.zoom_limits;
        if !(near.is_finite() && far.is_finite() && near > 0.0 && near <= far) {
            return Err(ConfigError::Invalid {
                field: "zoom_limits",
                reason: format!("expected 0 < near <= far, got [{}, {}]", near, far),
            });
        }
        Ok(())
    }
}

pub fn load_config_from_file(path: &Path) -> Result<StageConfig> {
    let json = std::fs::read_to_string(path)?;
    let config: StageConfig = serde_json::from_str(&json)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{load_config_from_file, ConfigError, StageConfig};

    fn temp_path(tag: &str) -> std::path::PathBuf {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "placer_config_{}_{}_{}.json",
            tag,
            std::process::id(),
            nonce
        ))
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let path = temp_path("partial");
        std::fs::write(&path, r#"{ "camera_distance": 8.0 }"#).unwrap();
        let config = load_config_from_file(&path).unwrap();
        assert_eq!(config.camera_distance, 8.0);
        assert_eq!(config.target_extent, 2.0);
        assert_eq!(config.ground_offset, 1.0);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let path = temp_path("invalid");
        std::fs::write(&path, r#"{ "target_extent": 0.0 }"#).unwrap();
        let err = load_config_from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "target_extent",
                ..
            }
        ));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn malformed_json_and_missing_file() {
        let path = temp_path("malformed");
        std::fs::write(&path, "{ camera_distance: ").unwrap();
        assert!(matches!(
            load_config_from_file(&path),
            Err(ConfigError::Json(_))
        ));
        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            load_config_from_file(&path),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn defaults_are_valid() {
        assert!(StageConfig::default().validate().is_ok());
        let settings = StageConfig::default().normalize_settings();
        assert_eq!(settings.target_extent, 2.0);
        assert_eq!(settings.ground_offset, 1.0);
    }
}
