//! The job table handed to the batch-job manager.

mod dataframe;

pub use dataframe::*;

use chrono::{DateTime, Utc};
use geo::Geometry;
use geozero::ToWkt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;

use crate::{BoundingBox, Crs, Result, TilerError};

/// Status written for every freshly generated job
pub const INITIAL_JOB_STATUS: &str = "not_started";

/// Advisory messages produced while tiling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TilerWarning {
    /// The grid has neither a `grid20id` nor a `name` column
    MissingIdColumn,
    /// The grid has no `bbox_dict` column
    MissingBboxColumn,
    /// None of the requested merge columns exist in the AOI
    NoMergeColumnsFound { requested: Vec<String> },
    /// Several AOI features with different values intersect one tile
    AmbiguousMerge {
        tile_id: String,
        candidates: Vec<usize>,
    },
}

impl fmt::Display for TilerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIdColumn => write!(
                f,
                "Tiling grid has no identifier column (grid20id or name); \
                 falling back to geometry-based intersection and row indices as tile ids"
            ),
            Self::MissingBboxColumn => write!(
                f,
                "Tiling grid has no bbox_dict column; job extents are derived from tile bounds"
            ),
            Self::NoMergeColumnsFound { requested } => write!(
                f,
                "None of the requested merge columns {:?} exist in the area of interest",
                requested
            ),
            Self::AmbiguousMerge {
                tile_id,
                candidates,
            } => write!(
                f,
                "Tile {} intersects AOI features {:?} with differing values; using feature {}",
                tile_id,
                candidates,
                candidates.first().copied().unwrap_or_default()
            ),
        }
    }
}

impl TilerWarning {
    /// Log the warning and hand it back for collection
    pub(crate) fn emit(self) -> Self {
        tracing::warn!("{}", self);
        self
    }
}

/// One job: a grid tile overlapping the area of interest
#[derive(Debug, Clone, PartialEq)]
pub struct TileJobRow {
    pub tile_id: String,
    /// Row index of the tile in the grid source
    pub source_index: usize,
    pub bbox_dict: BoundingBox,
    /// Tile outline in EPSG:4326
    pub geometry: Geometry<f64>,
    /// Columns merged in from the area of interest
    pub attributes: Map<String, Value>,
}

/// Provenance of a job table
#[derive(Debug, Clone, Serialize)]
pub struct JobTableMetadata {
    pub generated_at: DateTime<Utc>,
    pub grid_source: String,
    pub aoi_feature_count: usize,
}

impl JobTableMetadata {
    pub fn new(grid_source: impl Into<String>, aoi_feature_count: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            grid_source: grid_source.into(),
            aoi_feature_count,
        }
    }
}

/// Result of a tiling call
#[derive(Debug, Clone)]
pub struct TileJobTable {
    pub crs: Crs,
    pub rows: Vec<TileJobRow>,
    pub warnings: Vec<TilerWarning>,
    pub metadata: JobTableMetadata,
}

impl TileJobTable {
    pub fn new(rows: Vec<TileJobRow>, warnings: Vec<TilerWarning>, metadata: JobTableMetadata) -> Self {
        Self {
            crs: Crs::WGS84,
            rows,
            warnings,
            metadata,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn tile_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.tile_id.as_str()).collect()
    }

    /// Merged attribute column names in first-seen order
    pub fn attribute_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.attributes.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    /// Export as a GeoJSON feature collection
    pub fn to_geojson(&self) -> Result<geojson::FeatureCollection> {
        let features = self
            .rows
            .iter()
            .map(|row| {
                let mut properties = Map::new();
                properties.insert("tile_id".to_string(), Value::from(row.tile_id.clone()));
                properties.insert("bbox_dict".to_string(), bbox_value(&row.bbox_dict)?);
                for (key, value) in &row.attributes {
                    properties.insert(key.clone(), value.clone());
                }
                Ok(geojson::Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::from(&row.geometry))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })
    }

    /// Write the jobs database CSV consumed by the job manager
    ///
    /// Columns: `tile_id`, `bbox_dict` (JSON), `status`, the merged attributes,
    /// and `geometry` as WKT.
    pub fn write_job_csv<W: Write>(&self, writer: W) -> Result<()> {
        let attribute_columns = self.attribute_columns();
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec!["tile_id", "bbox_dict", "status"];
        header.extend(attribute_columns.iter().map(String::as_str));
        header.push("geometry");
        csv_writer.write_record(&header).map_err(csv_error)?;

        for row in &self.rows {
            let mut record = vec![
                row.tile_id.clone(),
                bbox_value(&row.bbox_dict)?.to_string(),
                INITIAL_JOB_STATUS.to_string(),
            ];
            for column in &attribute_columns {
                record.push(match row.attributes.get(column) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(text)) => text.clone(),
                    Some(other) => other.to_string(),
                });
            }
            let wkt = row
                .geometry
                .to_wkt()
                .map_err(|e| TilerError::Geometry(format!("Cannot encode tile {}: {}", row.tile_id, e)))?;
            record.push(wkt);
            csv_writer.write_record(&record).map_err(csv_error)?;
        }

        csv_writer.flush().map_err(|e| TilerError::io("job csv", e))?;
        tracing::info!("Wrote {} jobs", self.rows.len());
        Ok(())
    }
}

fn bbox_value(bbox: &BoundingBox) -> Result<Value> {
    serde_json::to_value(bbox).map_err(|e| TilerError::Parse(format!("Cannot encode bbox: {}", e)))
}

fn csv_error(e: csv::Error) -> TilerError {
    TilerError::io("job csv", e.into())
}
