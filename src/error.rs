use thiserror::Error;

/// Errors that can occur while tiling an area of interest
#[derive(Error, Debug)]
pub enum TilerError {
    /// A local file or fetched resource could not be read by any vector reader
    #[error(
        "Unsupported source '{source_name}': {reason}. Accepted formats are GeoParquet \
         (.parquet, .geoparquet), GeoJSON (.geojson, .json) and, with the `ogr` feature, \
         any OGR-readable vector format"
    )]
    UnsupportedSource { source_name: String, reason: String },

    /// A tiling grid string that is neither a path, a URL, nor a reserved keyword
    #[error(
        "Unsupported tiling grid specification '{spec}': expected \"EU\", \"global\", an \
         http(s) URL to a GeoParquet file, or a path to an existing vector file"
    )]
    UnsupportedGrid { spec: String },

    /// The "global" grid was requested without a storage collaborator
    #[error("Loading the \"global\" tiling grid requires a storage access handle")]
    MissingCredential,

    /// A geometry table without a CRS reached a stage that needs one
    #[error("Geometry table '{context}' has no coordinate reference system attached")]
    MissingCrs { context: String },

    /// Configuration validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors parsing vector data or attribute values
    #[error("Parse error: {0}")]
    Parse(String),

    /// Geometry kinds or shapes the tiler cannot work with
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Coordinate transformation errors
    #[error("Projection error: {0}")]
    Projection(String),

    /// Local file system errors
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Network-related errors while fetching remote grids
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    /// HTTP request failed
    #[error("HTTP request to {url} failed with status {status}")]
    HttpError { url: String, status: u16 },

    /// Request timeout
    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Connection error
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Invalid URL
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl TilerError {
    pub(crate) fn unsupported_source(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedSource {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TilerError>;
