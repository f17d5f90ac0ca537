mod bbox;
mod builder;
mod crs;

pub use bbox::*;
pub use builder::*;
pub use crs::*;

use serde::{Deserialize, Serialize};

/// Remote path of the global 20 km UTM grid on the managed drive, stored as GeoParquet
pub const DEFAULT_GLOBAL_GRID_PATH: &str = "global_terrestrial_UTM20k_grid_v2.parquet";

/// Configuration for loading grids and building job tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilerConfig {
    /// Identifier columns looked up in the grid, in order of preference
    pub id_columns: Vec<String>,
    /// Column holding a precomputed bbox dictionary per tile
    pub bbox_column: String,
    /// Path of the global grid inside the storage collaborator
    pub global_grid_path: String,
    /// Maximum timeout for remote grid downloads (in seconds)
    pub timeout_seconds: u64,
}

impl Default for TilerConfig {
    fn default() -> Self {
        Self {
            id_columns: vec!["grid20id".to_string(), "name".to_string()],
            bbox_column: "bbox_dict".to_string(),
            global_grid_path: DEFAULT_GLOBAL_GRID_PATH.to_string(),
            timeout_seconds: 60,
        }
    }
}

impl TilerConfig {
    /// Set the identifier columns (first match wins)
    pub fn with_id_columns(mut self, columns: Vec<String>) -> Self {
        self.id_columns = columns;
        self
    }

    /// Set the bbox dictionary column name
    pub fn with_bbox_column(mut self, column: impl Into<String>) -> Self {
        self.bbox_column = column.into();
        self
    }

    /// Set the remote path of the global grid
    pub fn with_global_grid_path(mut self, path: impl Into<String>) -> Self {
        self.global_grid_path = path.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Create a builder for more complex configuration
    pub fn builder() -> TilerConfigBuilder {
        TilerConfigBuilder::new()
    }

    /// Check that the configuration can be used
    pub fn validate(&self) -> crate::Result<()> {
        if self.id_columns.iter().any(|c| c.trim().is_empty()) {
            return Err(crate::TilerError::Config(
                "Identifier column names must not be empty".to_string(),
            ));
        }
        if self.bbox_column.trim().is_empty() {
            return Err(crate::TilerError::Config(
                "The bbox column name must not be empty".to_string(),
            ));
        }
        if self.global_grid_path.trim().is_empty() {
            return Err(crate::TilerError::Config(
                "The global grid path must not be empty".to_string(),
            ));
        }
        if !cfg!(feature = "ogr")
            && crate::reader::VectorFormat::detect(&self.global_grid_path) == crate::reader::VectorFormat::Ogr
        {
            return Err(crate::TilerError::Config(format!(
                "The global grid '{}' needs the `ogr` feature; use a GeoParquet or GeoJSON copy",
                self.global_grid_path
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(crate::TilerError::Config(
                "Timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TilerConfig::default();
        assert_eq!(config.id_columns, vec!["grid20id", "name"]);
        assert_eq!(config.bbox_column, "bbox_dict");
        assert_eq!(config.global_grid_path, DEFAULT_GLOBAL_GRID_PATH);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_setters() {
        let config = TilerConfig::default()
            .with_bbox_column("extent")
            .with_global_grid_path("grids/global.parquet")
            .with_timeout(5);

        assert_eq!(config.bbox_column, "extent");
        assert_eq!(config.global_grid_path, "grids/global.parquet");
        assert_eq!(config.timeout_seconds, 5);
    }

    #[test]
    fn test_config_validation() {
        assert!(TilerConfig::default().with_bbox_column(" ").validate().is_err());
        assert!(TilerConfig::default().with_timeout(0).validate().is_err());
        assert!(
            TilerConfig::default()
                .with_id_columns(vec![String::new()])
                .validate()
                .is_err()
        );
    }

    #[cfg(not(feature = "ogr"))]
    #[test]
    fn test_ogr_only_global_grid_is_rejected() {
        let config = TilerConfig::default().with_global_grid_path("global_terrestrial_UTM20k_grid_v2.gpkg");
        assert!(matches!(config.validate(), Err(crate::TilerError::Config(_))));
    }

    #[test]
    fn test_config_serialization() {
        let config = TilerConfig::default().with_timeout(30);
        let json = serde_json::to_string(&config).unwrap();
        let back: TilerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timeout_seconds, 30);
        assert_eq!(back.id_columns, config.id_columns);
    }
}
