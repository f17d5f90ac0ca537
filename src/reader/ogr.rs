use std::path::Path;

use gdal::Dataset;
use gdal::vector::{FieldValue, LayerAccess};
use serde_json::{Map, Value};

use crate::{Crs, GeoRow, GeoTable, Result, TilerError};

/// Read the first layer of any OGR-readable vector file
pub fn read_ogr(path: &Path) -> Result<GeoTable> {
    let name = path.display().to_string();
    let dataset = Dataset::open(path)
        .map_err(|e| TilerError::unsupported_source(&name, format!("OGR could not open it: {}", e)))?;
    let mut layer = dataset
        .layer(0)
        .map_err(|e| TilerError::unsupported_source(&name, format!("no vector layer: {}", e)))?;

    let crs = layer
        .spatial_ref()
        .and_then(|srs| srs.auth_code().ok())
        .and_then(|code| u32::try_from(code).ok())
        .map(Crs::epsg);

    let mut table = GeoTable {
        crs,
        rows: Vec::new(),
    };

    for (index, feature) in layer.features().enumerate() {
        let Some(geometry) = feature.geometry() else {
            tracing::warn!("Skipping feature {} of {} without geometry", index, name);
            continue;
        };
        let geometry = geometry.to_geo().map_err(|e| {
            TilerError::Parse(format!("Invalid geometry in feature {} of {}: {}", index, name, e))
        })?;

        let properties: Map<String, Value> = feature
            .fields()
            .map(|(field, value)| (field, value.map(field_value).unwrap_or(Value::Null)))
            .collect();

        table.push(GeoRow {
            geometry,
            properties,
        });
    }

    tracing::debug!("Read {} features from {} via OGR", table.len(), name);
    Ok(table)
}

fn field_value(value: FieldValue) -> Value {
    match value {
        FieldValue::IntegerValue(v) => Value::from(v),
        FieldValue::Integer64Value(v) => Value::from(v),
        FieldValue::RealValue(v) => Value::from(v),
        FieldValue::StringValue(v) => Value::from(v),
        FieldValue::IntegerListValue(v) => Value::from(v),
        FieldValue::Integer64ListValue(v) => Value::from(v),
        FieldValue::RealListValue(v) => Value::from(v),
        FieldValue::StringListValue(v) => Value::from(v),
        FieldValue::DateValue(v) => Value::from(v.to_string()),
        FieldValue::DateTimeValue(v) => Value::from(v.to_rfc3339()),
    }
}
