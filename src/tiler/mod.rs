//! The tiling pipeline: normalize AOI, load grid, intersect, enrich.

mod intersect;

pub use intersect::*;

use std::sync::Arc;

use crate::aoi::{AoiSource, load_aoi};
use crate::grid::{GridLoader, GridSource};
use crate::http::HttpClient;
use crate::storage::StorageAccess;
use crate::{JobTableMetadata, Result, TileJobTable, TilerConfig};

/// Turns an area of interest and a tiling grid into a job table
pub struct Tiler {
    config: TilerConfig,
    http: Option<Arc<dyn HttpClient>>,
}

impl Tiler {
    /// Create a tiler, validating the configuration
    pub fn new(config: TilerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, http: None })
    }

    /// Use a specific HTTP client for URL grids instead of the feature default
    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http = Some(client);
        self
    }

    pub fn config(&self) -> &TilerConfig {
        &self.config
    }

    fn grid_loader(&self) -> GridLoader {
        let loader = GridLoader::new(self.config.clone());
        match &self.http {
            Some(client) => loader.with_http_client(client.clone()),
            None => loader,
        }
    }

    /// Build the job table for `aoi` on `grid`
    ///
    /// `merge_columns` names AOI attributes copied onto each tile. `storage` is only
    /// needed for the `"global"` grid. Steps run one after another and nothing is
    /// cached between calls.
    pub async fn tile(
        &self,
        aoi: impl Into<AoiSource>,
        grid: impl Into<GridSource>,
        merge_columns: Option<&[String]>,
        storage: Option<&dyn StorageAccess>,
    ) -> Result<TileJobTable> {
        let grid = grid.into();
        let grid_description = grid.describe();

        let aoi = load_aoi(aoi.into()).await?;
        let aoi_bounds = aoi.bounds();
        tracing::info!("AOI has {} features", aoi.len());

        let grid = self
            .grid_loader()
            .load(grid, aoi_bounds.as_ref(), storage)
            .await?;

        let (rows, merge_warnings) = build_job_rows(&aoi, &grid, merge_columns);
        tracing::info!("{} tiles intersect the AOI", rows.len());

        let mut warnings = grid.warnings;
        warnings.extend(merge_warnings);

        Ok(TileJobTable::new(
            rows,
            warnings,
            JobTableMetadata::new(grid_description, aoi.len()),
        ))
    }
}

impl Default for Tiler {
    fn default() -> Self {
        Self {
            config: TilerConfig::default(),
            http: None,
        }
    }
}

/// Tile with the default configuration
pub async fn tile(
    aoi: impl Into<AoiSource>,
    grid: impl Into<GridSource>,
    merge_columns: Option<&[String]>,
    storage: Option<&dyn StorageAccess>,
) -> Result<TileJobTable> {
    Tiler::default()
        .tile(aoi, grid, merge_columns, storage)
        .await
}
