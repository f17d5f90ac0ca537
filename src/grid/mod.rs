//! Tiling grid loading: every grid form becomes a [`TilingGrid`] in EPSG:4326.

mod laea;
mod mgrs;

pub use laea::*;
pub use mgrs::*;

use geo::{BoundingRect, Geometry, Intersects, Rect};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::http::{HttpClient, HttpConfig, create_client_with_config, network_error};
use crate::projection::Transformer;
use crate::reader::{VectorFormat, read_geoparquet_bytes, read_vector_bytes, read_vector_path};
use crate::storage::StorageAccess;
use crate::{
    BoundingBox, Crs, GeoTable, NetworkError, Result, TilerConfig, TilerError, TilerWarning,
};

/// The accepted shapes of a tiling grid
#[derive(Debug, Clone)]
pub enum GridSource {
    /// An already loaded grid table
    Table(GeoTable),
    /// An http(s) URL to a GeoParquet file
    Url(String),
    /// A vector file on disk
    Path(PathBuf),
    /// The 20 km LAEA Europe grid, clipped to the pan-European coverage
    Eu,
    /// The global 20 km UTM grid held in managed storage
    Global,
}

impl GridSource {
    /// Interpret a grid string: a reserved keyword, a URL, or a path
    pub fn parse(spec: &str) -> Self {
        match spec {
            "EU" => Self::Eu,
            "global" => Self::Global,
            url if url.starts_with("http://") || url.starts_with("https://") => {
                Self::Url(url.to_string())
            }
            path => Self::Path(PathBuf::from(path)),
        }
    }

    /// Human-readable description for logs and job metadata
    pub fn describe(&self) -> String {
        match self {
            Self::Table(table) => format!("table ({} tiles)", table.len()),
            Self::Url(url) => url.clone(),
            Self::Path(path) => path.display().to_string(),
            Self::Eu => "EU".to_string(),
            Self::Global => "global".to_string(),
        }
    }
}

impl From<&str> for GridSource {
    fn from(spec: &str) -> Self {
        Self::parse(spec)
    }
}

impl From<String> for GridSource {
    fn from(spec: String) -> Self {
        Self::parse(&spec)
    }
}

impl From<GeoTable> for GridSource {
    fn from(table: GeoTable) -> Self {
        Self::Table(table)
    }
}

impl From<PathBuf> for GridSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

/// One grid cell
#[derive(Debug, Clone, PartialEq)]
pub struct GridTile {
    /// Row index in the grid source
    pub index: usize,
    /// Value of the first identifier column present
    pub id: Option<String>,
    /// Precomputed extent from the bbox column
    pub bbox_dict: Option<BoundingBox>,
    /// Outline in EPSG:4326
    pub geometry: Geometry<f64>,
    /// Bounds in the grid's own CRS
    pub native_bounds: Rect<f64>,
}

impl GridTile {
    /// Identifier used for the job, falling back to the source row index
    pub fn tile_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.index.to_string())
    }

    /// The tile's job extent, derived from its bounds when the grid has none
    pub fn job_bbox(&self, native_crs: Crs) -> BoundingBox {
        self.bbox_dict
            .unwrap_or_else(|| BoundingBox::from_rect(self.native_bounds, native_crs))
    }
}

/// A loaded tiling grid
#[derive(Debug, Clone)]
pub struct TilingGrid {
    pub native_crs: Crs,
    pub tiles: Vec<GridTile>,
    pub has_id_column: bool,
    pub has_bbox_column: bool,
    pub warnings: Vec<TilerWarning>,
}

impl TilingGrid {
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Loads grids from any [`GridSource`]
pub struct GridLoader {
    config: TilerConfig,
    http: Option<Arc<dyn HttpClient>>,
}

impl GridLoader {
    pub fn new(config: TilerConfig) -> Self {
        Self { config, http: None }
    }

    /// Use a specific HTTP client for URL grids
    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http = Some(client);
        self
    }

    pub fn config(&self) -> &TilerConfig {
        &self.config
    }

    /// Load a grid, keeping only tiles whose bounds overlap `aoi_bounds` when given
    pub async fn load(
        &self,
        source: GridSource,
        aoi_bounds: Option<&BoundingBox>,
        storage: Option<&dyn StorageAccess>,
    ) -> Result<TilingGrid> {
        tracing::info!("Loading tiling grid {}", source.describe());

        let table = match source {
            GridSource::Table(table) => table,
            GridSource::Url(url) => self.fetch_url(&url).await?,
            GridSource::Path(path) => {
                let is_file = tokio::fs::metadata(&path)
                    .await
                    .map(|meta| meta.is_file())
                    .unwrap_or(false);
                if !is_file {
                    return Err(TilerError::UnsupportedGrid {
                        spec: path.display().to_string(),
                    });
                }
                read_vector_path(&path).await?
            }
            GridSource::Eu => match aoi_bounds {
                Some(bounds) => laea20km_cells(bounds)?,
                None => GeoTable::new(Crs::LAEA_EUROPE),
            },
            GridSource::Global => {
                let storage = storage.ok_or(TilerError::MissingCredential)?;
                let path = &self.config.global_grid_path;
                tracing::debug!("Fetching global grid {} from {} storage", path, storage.storage_type());
                let data = storage.fetch(path).await?;
                read_vector_bytes(path, data).await?
            }
        };

        self.build(table, aoi_bounds)
    }

    async fn fetch_url(&self, url: &str) -> Result<GeoTable> {
        let client = match &self.http {
            Some(client) => client.clone(),
            None => {
                let config = HttpConfig::new()
                    .with_timeout(Duration::from_secs(self.config.timeout_seconds));
                create_client_with_config(config).map_err(TilerError::Config)?
            }
        };

        let response = client
            .get(url)
            .await
            .map_err(|e| network_error(url, e))?;
        if !response.is_success() {
            return Err(TilerError::Network(NetworkError::HttpError {
                url: url.to_string(),
                status: response.status,
            }));
        }

        let name = url.split(['?', '#']).next().unwrap_or(url);
        match VectorFormat::detect(name) {
            VectorFormat::GeoJson => read_vector_bytes(name, response.body).await,
            _ => read_geoparquet_bytes(response.body.into())
                .map_err(|e| TilerError::unsupported_source(url, e.to_string())),
        }
    }

    /// Reproject, pre-filter and index a raw grid table
    fn build(&self, table: GeoTable, aoi_bounds: Option<&BoundingBox>) -> Result<TilingGrid> {
        if table.is_empty() {
            return Ok(TilingGrid {
                native_crs: table.crs.unwrap_or_default(),
                tiles: Vec::new(),
                has_id_column: false,
                has_bbox_column: false,
                warnings: Vec::new(),
            });
        }

        let native_crs = table.require_crs("tiling grid")?;
        let id_column = self
            .config
            .id_columns
            .iter()
            .find(|column| table.has_column(column))
            .cloned();
        let bbox_column = &self.config.bbox_column;
        let has_bbox_column = table.has_column(bbox_column);

        let mut warnings = Vec::new();
        if id_column.is_none() {
            warnings.push(TilerWarning::MissingIdColumn.emit());
        }
        if !has_bbox_column {
            warnings.push(TilerWarning::MissingBboxColumn.emit());
        }

        let window = aoi_bounds.and_then(|bounds| match bounds.to_crs(native_crs) {
            Ok(window) => Some(window.to_rect()),
            Err(e) => {
                tracing::debug!("Skipping bbox pre-filter, AOI bounds not projectable: {}", e);
                None
            }
        });

        let transformer = Transformer::new(native_crs, Crs::WGS84)?;
        let mut tiles = Vec::new();
        for (index, row) in table.rows.into_iter().enumerate() {
            let Some(native_bounds) = row.geometry.bounding_rect() else {
                continue;
            };
            if window.is_some_and(|window| !window.intersects(&native_bounds)) {
                continue;
            }

            let id = id_column
                .as_deref()
                .and_then(|column| row.property(column))
                .map(id_text);
            let bbox_dict = row
                .property(bbox_column)
                .map(BoundingBox::from_dict_value)
                .transpose()?;

            tiles.push(GridTile {
                index,
                id,
                bbox_dict,
                geometry: transformer.transform_geometry(&row.geometry)?,
                native_bounds,
            });
        }

        tracing::info!("Grid has {} candidate tiles in {}", tiles.len(), native_crs);
        Ok(TilingGrid {
            native_crs,
            tiles,
            has_id_column: id_column.is_some(),
            has_bbox_column,
            warnings,
        })
    }
}

/// Load a grid with the default configuration
pub async fn load_grid(
    source: GridSource,
    aoi_bounds: Option<&BoundingBox>,
    storage: Option<&dyn StorageAccess>,
) -> Result<TilingGrid> {
    GridLoader::new(TilerConfig::default())
        .load(source, aoi_bounds, storage)
        .await
}

fn id_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
