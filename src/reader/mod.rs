//! Vector readers: GeoParquet, GeoJSON and (with the `ogr` feature) anything GDAL can open.

mod geojson_file;
mod geoparquet;
#[cfg(feature = "ogr")]
mod ogr;

pub use geojson_file::*;
pub use geoparquet::*;

use std::path::Path;

use crate::{GeoTable, Result, TilerError};

/// Vector format detected from a file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    /// Columnar GeoParquet with WKB geometries
    GeoParquet,
    /// GeoJSON text
    GeoJson,
    /// Anything else, handed to the OGR reader
    Ogr,
}

impl VectorFormat {
    /// Detect file format from extension
    pub fn detect(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("parquet") | Some("geoparquet") => Self::GeoParquet,
            Some("geojson") | Some("json") => Self::GeoJson,
            _ => Self::Ogr,
        }
    }
}

/// Read a vector file from disk, dispatching on its extension
pub async fn read_vector_path(path: &Path) -> Result<GeoTable> {
    let name = path.display().to_string();
    let format = VectorFormat::detect(&name);
    tracing::debug!("Reading {} as {:?}", name, format);

    match format {
        VectorFormat::GeoParquet | VectorFormat::GeoJson => {
            let data = tokio::fs::read(path)
                .await
                .map_err(|e| TilerError::unsupported_source(&name, format!("cannot read file: {}", e)))?;
            read_vector_bytes(&name, data).await
        }
        VectorFormat::Ogr => read_ogr_path(path),
    }
}

/// Parse an in-memory vector file; `name` only drives format detection and messages
pub async fn read_vector_bytes(name: &str, data: Vec<u8>) -> Result<GeoTable> {
    match VectorFormat::detect(name) {
        VectorFormat::GeoParquet => read_geoparquet_bytes(data.into())
            .map_err(|e| TilerError::unsupported_source(name, e.to_string())),
        VectorFormat::GeoJson => {
            let text = String::from_utf8(data).map_err(|_| {
                TilerError::unsupported_source(name, "GeoJSON content is not valid UTF-8")
            })?;
            read_geojson_str(&text).map_err(|e| TilerError::unsupported_source(name, e.to_string()))
        }
        VectorFormat::Ogr => read_ogr_bytes(name, data).await,
    }
}

#[cfg(feature = "ogr")]
fn read_ogr_path(path: &Path) -> Result<GeoTable> {
    ogr::read_ogr(path)
}

#[cfg(not(feature = "ogr"))]
fn read_ogr_path(path: &Path) -> Result<GeoTable> {
    Err(TilerError::unsupported_source(
        path.display().to_string(),
        "file extension is not a GeoParquet or GeoJSON extension and OGR support is not enabled",
    ))
}

#[cfg(feature = "ogr")]
async fn read_ogr_bytes(name: &str, data: Vec<u8>) -> Result<GeoTable> {
    // GDAL needs a real file name for driver detection
    let file_name = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "grid.gpkg".to_string());
    let dir = tempfile::tempdir().map_err(|e| TilerError::io("temporary directory", e))?;
    let temp_path = dir.path().join(file_name);
    tokio::fs::write(&temp_path, data)
        .await
        .map_err(|e| TilerError::io(temp_path.display().to_string(), e))?;
    ogr::read_ogr(&temp_path)
}

#[cfg(not(feature = "ogr"))]
async fn read_ogr_bytes(name: &str, _data: Vec<u8>) -> Result<GeoTable> {
    Err(TilerError::unsupported_source(
        name,
        "file extension is not a GeoParquet or GeoJSON extension and OGR support is not enabled",
    ))
}
