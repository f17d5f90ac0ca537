use geojson::{Feature, GeoJson, JsonObject};
use serde_json::Value;

use crate::{Crs, GeoRow, GeoTable, Result, TilerError};

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Parse GeoJSON text into a geometry table
pub fn read_geojson_str(text: &str) -> Result<GeoTable> {
    let geojson = text
        .parse::<GeoJson>()
        .map_err(|e| TilerError::Parse(format!("Invalid GeoJSON: {}", e)))?;
    geojson_to_table(geojson)
}

/// Convert a parsed GeoJSON object into a geometry table
///
/// The CRS is EPSG:4326 unless a legacy `crs` member names another one.
pub fn geojson_to_table(geojson: GeoJson) -> Result<GeoTable> {
    match geojson {
        GeoJson::FeatureCollection(collection) => {
            let crs = legacy_crs(collection.foreign_members.as_ref())?.unwrap_or(Crs::WGS84);
            let mut table = GeoTable::new(crs);
            for (index, feature) in collection.features.into_iter().enumerate() {
                if let Some(row) = feature_to_row(feature, index)? {
                    table.push(row);
                }
            }
            Ok(table)
        }
        GeoJson::Feature(feature) => {
            let crs = legacy_crs(feature.foreign_members.as_ref())?.unwrap_or(Crs::WGS84);
            let mut table = GeoTable::new(crs);
            if let Some(row) = feature_to_row(feature, 0)? {
                table.push(row);
            }
            Ok(table)
        }
        GeoJson::Geometry(geometry) => {
            let crs = legacy_crs(geometry.foreign_members.as_ref())?.unwrap_or(Crs::WGS84);
            let geometry = geo::Geometry::<f64>::try_from(geometry)
                .map_err(|e| TilerError::Parse(format!("Invalid GeoJSON geometry: {}", e)))?;
            Ok(GeoTable::new(crs).with_row(GeoRow::new(geometry)))
        }
    }
}

fn feature_to_row(feature: Feature, index: usize) -> Result<Option<GeoRow>> {
    let Some(geometry) = feature.geometry else {
        tracing::warn!("Skipping GeoJSON feature {} without geometry", index);
        return Ok(None);
    };

    let geometry = geo::Geometry::<f64>::try_from(geometry).map_err(|e| {
        TilerError::Parse(format!("Invalid geometry in GeoJSON feature {}: {}", index, e))
    })?;

    Ok(Some(GeoRow {
        geometry,
        properties: feature.properties.unwrap_or_default(),
    }))
}

/// Read the pre-RFC 7946 `crs` member: `{"type": "name", "properties": {"name": "EPSG:3035"}}`
fn legacy_crs(foreign_members: Option<&JsonObject>) -> Result<Option<Crs>> {
    let name = foreign_members
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|properties| properties.get("name"))
        .and_then(Value::as_str);

    name.map(Crs::parse).transpose()
}

/// Check whether a JSON value is a structurally valid GeoJSON object
pub fn is_geojson(value: &Value) -> bool {
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return false;
    };

    match kind {
        "Feature" => {
            value.get("geometry").is_some_and(is_valid_geometry)
                && value.get("properties").is_some_and(Value::is_object)
        }
        "FeatureCollection" => value
            .get("features")
            .and_then(Value::as_array)
            .is_some_and(|features| features.iter().all(is_geojson)),
        _ => is_valid_geometry(value),
    }
}

fn is_valid_geometry(value: &Value) -> bool {
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return false;
    };
    if kind == "GeometryCollection" {
        return value.get("geometries").is_some_and(Value::is_array);
    }
    GEOMETRY_TYPES.contains(&kind) && value.get("coordinates").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {
          "type": "Feature",
          "properties": {"field_id": 7, "crop": "maize"},
          "geometry": {"type": "Polygon", "coordinates": [[[6.78, 52.18], [6.88, 52.18], [6.88, 52.24], [6.78, 52.24], [6.78, 52.18]]]}
        },
        {
          "type": "Feature",
          "properties": {"field_id": 8},
          "geometry": null
        }
      ]
    }"#;

    #[test]
    fn test_read_feature_collection() {
        let table = read_geojson_str(COLLECTION).unwrap();
        assert_eq!(table.crs, Some(Crs::WGS84));
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].property("crop"), Some(&Value::from("maize")));
        assert!(matches!(table.rows[0].geometry, geo::Geometry::Polygon(_)));
    }

    #[test]
    fn test_legacy_crs_member() {
        let text = r#"{
          "type": "FeatureCollection",
          "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3035"}},
          "features": []
        }"#;
        let table = read_geojson_str(text).unwrap();
        assert_eq!(table.crs, Some(Crs::LAEA_EUROPE));
        assert!(table.is_empty());
    }

    #[test]
    fn test_bare_geometry() {
        let text = r#"{"type": "Point", "coordinates": [6.8, 52.2]}"#;
        let table = read_geojson_str(text).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_invalid_geojson() {
        assert!(matches!(read_geojson_str("{\"type\": 1}"), Err(TilerError::Parse(_))));
    }

    #[test]
    fn test_is_geojson() {
        let collection: Value = serde_json::from_str(COLLECTION).unwrap();
        assert!(!is_geojson(&collection)); // second feature has a null geometry

        let valid = serde_json::json!({
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}
        });
        assert!(is_geojson(&valid));
        assert!(is_geojson(&serde_json::json!({"type": "FeatureCollection", "features": [valid]})));
        assert!(!is_geojson(&serde_json::json!({"type": "Feature", "geometry": {}})));
        assert!(!is_geojson(&serde_json::json!({"west": 1.0})));
    }
}
