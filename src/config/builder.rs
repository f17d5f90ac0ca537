use super::TilerConfig;

/// Builder for creating tiler configurations with a fluent API
#[derive(Debug, Clone, Default)]
pub struct TilerConfigBuilder {
    id_columns: Option<Vec<String>>,
    bbox_column: Option<String>,
    global_grid_path: Option<String>,
    timeout_seconds: Option<u64>,
}

impl TilerConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer this identifier column over the configured ones
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        let mut columns = self
            .id_columns
            .take()
            .unwrap_or_else(|| TilerConfig::default().id_columns);
        columns.insert(0, column.into());
        self.id_columns = Some(columns);
        self
    }

    /// Replace the identifier column list
    pub fn id_columns(mut self, columns: Vec<String>) -> Self {
        self.id_columns = Some(columns);
        self
    }

    /// Set the bbox dictionary column
    pub fn bbox_column(mut self, column: impl Into<String>) -> Self {
        self.bbox_column = Some(column.into());
        self
    }

    /// Set the remote path of the global grid
    pub fn global_grid_path(mut self, path: impl Into<String>) -> Self {
        self.global_grid_path = Some(path.into());
        self
    }

    /// Set the timeout
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> TilerConfig {
        let defaults = TilerConfig::default();
        TilerConfig {
            id_columns: self.id_columns.unwrap_or(defaults.id_columns),
            bbox_column: self.bbox_column.unwrap_or(defaults.bbox_column),
            global_grid_path: self.global_grid_path.unwrap_or(defaults.global_grid_path),
            timeout_seconds: self.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        }
    }

    /// Build and validate the configuration
    pub fn build_validated(self) -> crate::Result<TilerConfig> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = TilerConfigBuilder::new().build();
        assert_eq!(config.id_columns, TilerConfig::default().id_columns);
        assert_eq!(config.timeout_seconds, 60);
    }

    #[test]
    fn test_builder_prepends_id_column() {
        let config = TilerConfigBuilder::new().id_column("tile").build();
        assert_eq!(config.id_columns, vec!["tile", "grid20id", "name"]);
    }

    #[test]
    fn test_builder_overrides() {
        let config = TilerConfig::builder()
            .id_columns(vec!["cell".to_string()])
            .bbox_column("extent")
            .global_grid_path("global.parquet")
            .timeout(10)
            .build();

        assert_eq!(config.id_columns, vec!["cell"]);
        assert_eq!(config.bbox_column, "extent");
        assert_eq!(config.global_grid_path, "global.parquet");
        assert_eq!(config.timeout_seconds, 10);
    }

    #[test]
    fn test_build_validated_rejects_bad_config() {
        let result = TilerConfigBuilder::new().timeout(0).build_validated();
        assert!(matches!(result, Err(crate::TilerError::Config(_))));
    }
}
