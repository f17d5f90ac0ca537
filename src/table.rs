//! In-memory geometry table shared by the readers, the AOI normalizer and the grid loader.

use geo::{Geometry, Rect};
use serde_json::{Map, Value};

use crate::projection::Transformer;
use crate::{BoundingBox, Crs, Result, TilerError};

/// One feature: a geometry plus its attribute columns
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRow {
    pub geometry: Geometry<f64>,
    pub properties: Map<String, Value>,
}

impl GeoRow {
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            properties: Map::new(),
        }
    }

    /// Attach an attribute value
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute, treating JSON null as absent
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key).filter(|value| !value.is_null())
    }
}

/// A table of geometries with attribute columns and an optional CRS
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoTable {
    pub crs: Option<Crs>,
    pub rows: Vec<GeoRow>,
}

impl GeoTable {
    /// Create an empty table in the given CRS
    pub fn new(crs: Crs) -> Self {
        Self {
            crs: Some(crs),
            rows: Vec::new(),
        }
    }

    /// Create an empty table without a CRS
    pub fn without_crs() -> Self {
        Self::default()
    }

    pub fn with_row(mut self, row: GeoRow) -> Self {
        self.rows.push(row);
        self
    }

    pub fn push(&mut self, row: GeoRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Attribute column names in first-seen order
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.properties.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    /// Whether any row carries a non-null value for the column
    pub fn has_column(&self, column: &str) -> bool {
        self.rows.iter().any(|row| row.property(column).is_some())
    }

    /// The CRS, or an error naming the table when it is missing
    pub fn require_crs(&self, context: &str) -> Result<Crs> {
        self.crs.ok_or_else(|| TilerError::MissingCrs {
            context: context.to_string(),
        })
    }

    /// Combined bounds of all geometries
    pub fn total_bounds(&self) -> Option<Rect<f64>> {
        let crs = self.crs.unwrap_or_default();
        BoundingBox::from_geometries(self.rows.iter().map(|row| &row.geometry), crs)
            .map(|bbox| bbox.to_rect())
    }

    /// Reproject every geometry into `target`
    pub fn to_crs(&self, target: Crs) -> Result<GeoTable> {
        let source = self.require_crs("to_crs")?;
        if source == target {
            return Ok(self.clone());
        }

        let transformer = Transformer::new(source, target)?;
        let rows = self
            .rows
            .iter()
            .map(|row| {
                Ok(GeoRow {
                    geometry: transformer.transform_geometry(&row.geometry)?,
                    properties: row.properties.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(GeoTable {
            crs: Some(target),
            rows,
        })
    }
}
