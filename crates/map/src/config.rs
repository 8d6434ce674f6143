use crate::grid::{DEFAULT_TILE_TYPE, DEFAULT_VARIANT};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors from loading a tilemap configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tilemap construction parameters. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilemapConfig {
    /// World units per tile edge; becomes the initial XY scale.
    pub tile_size: u32,
    /// Tiles per grid edge.
    pub grid_size: u32,
    /// Tile type for the default fill.
    pub tile_type: String,
    /// Variant for the default fill.
    pub variant: u32,
}

impl Default for TilemapConfig {
    fn default() -> Self {
        Self {
            tile_size: 16,
            grid_size: 1000,
            tile_type: DEFAULT_TILE_TYPE.into(),
            variant: DEFAULT_VARIANT,
        }
    }
}

impl TilemapConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&data)?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "loaded tilemap config");
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_grass_on_a_thousand_grid() {
        let c = TilemapConfig::default();
        assert_eq!(c.tile_size, 16);
        assert_eq!(c.grid_size, 1000);
        assert_eq!(c.tile_type, "grass");
        assert_eq!(c.variant, 1);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"grid_size": 32}}"#).unwrap();

        let c = TilemapConfig::load(file.path()).unwrap();
        assert_eq!(c.grid_size, 32);
        assert_eq!(c.tile_size, 16);
        assert_eq!(c.tile_type, "grass");
    }

    #[test]
    fn malformed_file_is_a_json_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            TilemapConfig::load(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            TilemapConfig::load(&missing),
            Err(ConfigError::Io(_))
        ));
        assert!(TilemapConfig::load_or_default(None).is_ok());
    }
}
