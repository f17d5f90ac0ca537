use std::collections::HashMap;

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, UInt8Type, UInt16Type,
    UInt32Type, UInt64Type,
};
use arrow_array::{Array, RecordBatch};
use arrow_schema::DataType;
use bytes::Bytes;
use geo::{Geometry, GeometryCollection};
use geozero::ToGeo;
use geozero::wkb::Wkb;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{Crs, GeoRow, GeoTable, Result, TilerError};

/// The `geo` key of a GeoParquet file's key/value metadata
#[derive(Debug, Deserialize)]
struct GeoMetadata {
    primary_column: Option<String>,
    #[serde(default)]
    columns: HashMap<String, GeoColumnMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeoColumnMetadata {
    encoding: Option<String>,
    /// PROJJSON; absent means OGC:CRS84, explicit null means unknown
    #[serde(default = "default_crs")]
    crs: Value,
}

fn default_crs() -> Value {
    Value::String("OGC:CRS84".to_string())
}

/// Read a GeoParquet file held in memory
pub fn read_geoparquet_bytes(data: Bytes) -> Result<GeoTable> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)
        .map_err(|e| TilerError::Parse(format!("Failed to open GeoParquet: {}", e)))?;

    let metadata = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|entries| entries.iter().find(|entry| entry.key == "geo"))
        .and_then(|entry| entry.value.as_deref())
        .map(serde_json::from_str::<GeoMetadata>)
        .transpose()
        .map_err(|e| TilerError::Parse(format!("Invalid GeoParquet 'geo' metadata: {}", e)))?;

    let geometry_column = metadata
        .as_ref()
        .and_then(|meta| meta.primary_column.clone())
        .unwrap_or_else(|| "geometry".to_string());

    let column_meta = metadata
        .as_ref()
        .and_then(|meta| meta.columns.get(&geometry_column));

    if let Some(encoding) = column_meta.and_then(|meta| meta.encoding.as_deref()) {
        if !encoding.eq_ignore_ascii_case("WKB") {
            return Err(TilerError::Parse(format!(
                "GeoParquet geometry encoding '{}' is not supported, only WKB",
                encoding
            )));
        }
    }

    let crs = match column_meta {
        Some(meta) => crs_from_projjson(&meta.crs)?,
        None => Some(Crs::WGS84),
    };

    let reader = builder
        .build()
        .map_err(|e| TilerError::Parse(format!("Failed to build GeoParquet reader: {}", e)))?;

    let mut table = GeoTable {
        crs,
        rows: Vec::new(),
    };
    for batch in reader {
        let batch = batch.map_err(|e| TilerError::Parse(format!("Failed to read batch: {}", e)))?;
        append_batch(&batch, &geometry_column, &mut table)?;
    }

    tracing::debug!(
        "Read {} GeoParquet rows (geometry column '{}', crs {:?})",
        table.len(),
        geometry_column,
        table.crs
    );
    Ok(table)
}

/// Resolve a PROJJSON CRS to an EPSG code
fn crs_from_projjson(crs: &Value) -> Result<Option<Crs>> {
    match crs {
        Value::Null => Ok(None),
        Value::String(text) => Crs::parse(text).map(Some),
        Value::Object(object) => {
            let id = object.get("id").ok_or_else(|| {
                TilerError::Parse("PROJJSON CRS without an 'id' member is not supported".to_string())
            })?;
            let authority = id.get("authority").and_then(Value::as_str).unwrap_or("EPSG");
            let code = match id.get("code") {
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::String(s)) => s.clone(),
                _ => return Err(TilerError::Parse("PROJJSON id without a code".to_string())),
            };
            Crs::parse(&format!("{}:{}", authority, code)).map(Some)
        }
        other => Err(TilerError::Parse(format!("Unsupported GeoParquet CRS: {}", other))),
    }
}

fn append_batch(batch: &RecordBatch, geometry_column: &str, table: &mut GeoTable) -> Result<()> {
    let schema = batch.schema();
    let geometry_index = schema.index_of(geometry_column).map_err(|_| {
        TilerError::Parse(format!("No geometry column '{}' found", geometry_column))
    })?;
    let geometries = batch.column(geometry_index);

    for row in 0..batch.num_rows() {
        // null geometries keep their row as an empty collection so row numbers stay aligned
        let geometry = match wkb_value(geometries.as_ref(), row)? {
            Some(wkb) => Wkb(wkb.to_vec())
                .to_geo()
                .map_err(|e| TilerError::Parse(format!("WKB decode error in row {}: {}", row, e)))?,
            None => Geometry::GeometryCollection(GeometryCollection(Vec::new())),
        };

        let mut properties = Map::new();
        for (index, field) in schema.fields().iter().enumerate() {
            if index == geometry_index {
                continue;
            }
            properties.insert(field.name().clone(), arrow_value(batch.column(index).as_ref(), row));
        }

        table.push(GeoRow {
            geometry,
            properties,
        });
    }

    Ok(())
}

fn wkb_value(array: &dyn Array, row: usize) -> Result<Option<&[u8]>> {
    if array.is_null(row) {
        return Ok(None);
    }
    match array.data_type() {
        DataType::Binary => Ok(Some(array.as_binary::<i32>().value(row))),
        DataType::LargeBinary => Ok(Some(array.as_binary::<i64>().value(row))),
        other => Err(TilerError::Parse(format!(
            "Geometry column has type {:?}, expected WKB binary",
            other
        ))),
    }
}

/// Convert one Arrow cell into a JSON value
fn arrow_value(array: &dyn Array, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }

    match array.data_type() {
        DataType::Utf8 => Value::from(array.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => Value::from(array.as_string::<i64>().value(row)),
        DataType::Boolean => Value::from(array.as_boolean().value(row)),
        DataType::Int8 => Value::from(array.as_primitive::<Int8Type>().value(row)),
        DataType::Int16 => Value::from(array.as_primitive::<Int16Type>().value(row)),
        DataType::Int32 => Value::from(array.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => Value::from(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Value::from(array.as_primitive::<UInt8Type>().value(row)),
        DataType::UInt16 => Value::from(array.as_primitive::<UInt16Type>().value(row)),
        DataType::UInt32 => Value::from(array.as_primitive::<UInt32Type>().value(row)),
        DataType::UInt64 => Value::from(array.as_primitive::<UInt64Type>().value(row)),
        DataType::Float32 => Value::from(array.as_primitive::<Float32Type>().value(row)),
        DataType::Float64 => Value::from(array.as_primitive::<Float64Type>().value(row)),
        DataType::Struct(_) => {
            let struct_array = array.as_struct();
            let object = struct_array
                .column_names()
                .into_iter()
                .zip(struct_array.columns())
                .map(|(name, child)| (name.to_string(), arrow_value(child.as_ref(), row)))
                .collect();
            Value::Object(object)
        }
        DataType::List(_) => {
            let values = array.as_list::<i32>().value(row);
            Value::Array(
                (0..values.len())
                    .map(|i| arrow_value(values.as_ref(), i))
                    .collect(),
            )
        }
        other => {
            tracing::debug!("Skipping unsupported attribute type {:?}", other);
            Value::Null
        }
    }
}

/// Encode a table as GeoParquet with attribute columns as strings or doubles
#[cfg(test)]
pub(crate) fn encode_geoparquet(table: &GeoTable) -> Vec<u8> {
    use std::sync::Arc;

    use arrow_array::{ArrayRef, BinaryArray, Float64Array, StringArray};
    use arrow_schema::{Field, Schema};
    use geozero::{CoordDimensions, ToWkb};
    use parquet::arrow::ArrowWriter;
    use parquet::file::properties::WriterProperties;
    use parquet::format::KeyValue;

    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();

    for column in table.columns() {
        let values: Vec<Option<&Value>> = table.rows.iter().map(|r| r.property(&column)).collect();
        let numeric = values.iter().flatten().all(|v| v.is_number());
        if numeric {
            fields.push(Field::new(&column, DataType::Float64, true));
            let array: Float64Array = values.iter().map(|v| v.and_then(Value::as_f64)).collect();
            arrays.push(Arc::new(array));
        } else {
            fields.push(Field::new(&column, DataType::Utf8, true));
            let array: StringArray = values
                .iter()
                .map(|v| {
                    v.map(|value| match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                })
                .collect();
            arrays.push(Arc::new(array));
        }
    }

    // empty collections are written as null geometries
    let wkb: Vec<Option<Vec<u8>>> = table
        .rows
        .iter()
        .map(|row| match &row.geometry {
            geo::Geometry::GeometryCollection(collection) if collection.0.is_empty() => None,
            geometry => Some(geometry.to_wkb(CoordDimensions::xy()).unwrap()),
        })
        .collect();
    fields.push(Field::new("geometry", DataType::Binary, true));
    arrays.push(Arc::new(BinaryArray::from(
        wkb.iter().map(|w| w.as_deref()).collect::<Vec<_>>(),
    )));

    let crs = table.crs.unwrap_or_default();
    let geo = serde_json::json!({
        "version": "1.0.0",
        "primary_column": "geometry",
        "columns": {
            "geometry": {
                "encoding": "WKB",
                "geometry_types": [],
                "crs": {"id": {"authority": "EPSG", "code": crs.code()}}
            }
        }
    });

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();
    let props = WriterProperties::builder()
        .set_key_value_metadata(Some(vec![KeyValue::new("geo".to_string(), geo.to_string())]))
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, Some(props)).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    buffer
}
