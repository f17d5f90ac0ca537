//! Area-of-interest normalization.
//!
//! Every accepted AOI form ends up as an [`AoiLayer`]: polygonal features in
//! EPSG:4326 with their attribute columns.

use geo::{BooleanOps, Geometry, MultiPolygon, Polygon};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::reader::{geojson_to_table, is_geojson, read_vector_path};
use crate::{BoundingBox, Crs, GeoRow, GeoTable, Result, TilerError};

/// The accepted shapes of an area of interest
#[derive(Debug, Clone)]
pub enum AoiSource {
    /// An already loaded geometry table; its CRS must be set
    Table(GeoTable),
    /// A single bounding box in any CRS
    BBox(BoundingBox),
    /// A GeoJSON object, EPSG:4326 unless it carries a legacy `crs` member
    GeoJson(geojson::GeoJson),
    /// A vector file on disk
    Path(PathBuf),
    /// A single polygon in EPSG:4326
    Polygon(Polygon<f64>),
}

impl AoiSource {
    /// Interpret a JSON mapping as either a GeoJSON object or a bounding-box dictionary
    pub fn from_json_value(value: Value) -> Result<Self> {
        if is_geojson(&value) {
            let geojson = geojson::GeoJson::from_json_value(value)
                .map_err(|e| TilerError::Parse(format!("Invalid GeoJSON: {}", e)))?;
            return Ok(Self::GeoJson(geojson));
        }
        if value.get("west").is_some() {
            return BoundingBox::from_dict_value(&value).map(Self::BBox);
        }
        Err(TilerError::Parse(
            "JSON area of interest is neither GeoJSON nor a bounding-box dictionary".to_string(),
        ))
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Table(_) => "table",
            Self::BBox(_) => "bbox",
            Self::GeoJson(_) => "geojson",
            Self::Path(_) => "path",
            Self::Polygon(_) => "polygon",
        }
    }
}

impl From<GeoTable> for AoiSource {
    fn from(table: GeoTable) -> Self {
        Self::Table(table)
    }
}

impl From<BoundingBox> for AoiSource {
    fn from(bbox: BoundingBox) -> Self {
        Self::BBox(bbox)
    }
}

impl From<geojson::GeoJson> for AoiSource {
    fn from(geojson: geojson::GeoJson) -> Self {
        Self::GeoJson(geojson)
    }
}

impl From<geojson::FeatureCollection> for AoiSource {
    fn from(collection: geojson::FeatureCollection) -> Self {
        Self::GeoJson(geojson::GeoJson::FeatureCollection(collection))
    }
}

impl From<PathBuf> for AoiSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for AoiSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Polygon<f64>> for AoiSource {
    fn from(polygon: Polygon<f64>) -> Self {
        Self::Polygon(polygon)
    }
}

/// One normalized AOI feature
#[derive(Debug, Clone, PartialEq)]
pub struct AoiFeature {
    pub shape: MultiPolygon<f64>,
    pub properties: Map<String, Value>,
}

impl AoiFeature {
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key).filter(|value| !value.is_null())
    }
}

/// A normalized area of interest: polygonal features in EPSG:4326
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AoiLayer {
    pub features: Vec<AoiFeature>,
}

impl AoiLayer {
    /// Normalize a geometry table, reprojecting it to EPSG:4326
    pub fn from_table(table: GeoTable) -> Result<Self> {
        if table.is_empty() {
            return Ok(Self::default());
        }

        let crs = table.require_crs("area of interest")?;
        let table = table.to_crs(Crs::WGS84)?;
        tracing::debug!("Normalizing {} AOI features from {}", table.len(), crs);

        let features = table
            .rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                let shape = polygonal(&row.geometry).ok_or_else(|| {
                    TilerError::Geometry(format!(
                        "AOI feature {} is a {}, only polygonal geometries are accepted",
                        index,
                        geometry_kind(&row.geometry)
                    ))
                })?;
                Ok(AoiFeature {
                    shape,
                    properties: row.properties,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Whether any feature carries a non-null value for the column
    pub fn has_column(&self, column: &str) -> bool {
        self.features.iter().any(|f| f.property(column).is_some())
    }

    /// All polygons of all features
    pub fn polygons(&self) -> impl Iterator<Item = &Polygon<f64>> {
        self.features.iter().flat_map(|f| f.shape.0.iter())
    }

    /// Dissolve every feature into a single region
    pub fn union(&self) -> MultiPolygon<f64> {
        self.features
            .iter()
            .map(|f| f.shape.clone())
            .reduce(|acc, shape| acc.union(&shape))
            .unwrap_or_else(|| MultiPolygon::new(vec![]))
    }

    /// Bounds of the layer in EPSG:4326
    pub fn bounds(&self) -> Option<BoundingBox> {
        let geometries: Vec<Geometry<f64>> = self
            .features
            .iter()
            .map(|f| Geometry::MultiPolygon(f.shape.clone()))
            .collect();
        BoundingBox::from_geometries(&geometries, Crs::WGS84)
    }
}

/// Normalize any AOI form into polygonal features in EPSG:4326
pub async fn load_aoi(source: AoiSource) -> Result<AoiLayer> {
    tracing::debug!("Loading AOI from {}", source.kind());

    let table = match source {
        AoiSource::Table(table) => table,
        AoiSource::BBox(bbox) => {
            // Densify projected boxes so the lon/lat outline keeps its curvature
            let polygon = if bbox.crs == Crs::WGS84 {
                bbox.to_polygon()
            } else {
                bbox.to_lat_lon_polygon(true)?
            };
            GeoTable::new(Crs::WGS84).with_row(GeoRow::new(polygon))
        }
        AoiSource::GeoJson(geojson) => geojson_to_table(geojson)?,
        AoiSource::Path(path) => read_vector_path(&path).await?,
        AoiSource::Polygon(polygon) => GeoTable::new(Crs::WGS84).with_row(GeoRow::new(polygon)),
    };

    AoiLayer::from_table(table)
}

/// Collect the polygonal parts of a geometry, `None` if it has non-polygonal parts
fn polygonal(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Some(MultiPolygon::new(vec![polygon.clone()])),
        Geometry::MultiPolygon(multi) => Some(multi.clone()),
        Geometry::Rect(rect) => Some(MultiPolygon::new(vec![rect.to_polygon()])),
        Geometry::Triangle(triangle) => Some(MultiPolygon::new(vec![triangle.to_polygon()])),
        Geometry::GeometryCollection(collection) => {
            let mut polygons = Vec::new();
            for member in collection.iter() {
                polygons.extend(polygonal(member)?.0);
            }
            Some(MultiPolygon::new(polygons))
        }
        _ => None,
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, BoundingRect, point, polygon};

    fn enschede() -> BoundingBox {
        BoundingBox::new(6.778564, 52.175195, 6.888428, 52.243358, Crs::WGS84)
    }

    fn assert_same_region(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) {
        let (ra, rb) = (a.bounding_rect().unwrap(), b.bounding_rect().unwrap());
        for (x, y) in [(ra.min(), rb.min()), (ra.max(), rb.max())] {
            assert!((x.x - y.x).abs() < 1e-7 && (x.y - y.y).abs() < 1e-7, "{:?} != {:?}", x, y);
        }
        let (area_a, area_b) = (a.unsigned_area(), b.unsigned_area());
        assert!((area_a - area_b).abs() / area_b < 1e-6, "{} != {}", area_a, area_b);
    }

    #[tokio::test]
    async fn test_source_forms_normalize_to_same_region() {
        let expected = load_aoi(enschede().into()).await.unwrap().union();

        let polygon = enschede().to_polygon();
        let from_polygon = load_aoi(polygon.clone().into()).await.unwrap();
        assert_same_region(&from_polygon.union(), &expected);

        let table = GeoTable::new(Crs::WGS84).with_row(GeoRow::new(polygon.clone()));
        let from_table = load_aoi(table.into()).await.unwrap();
        assert_same_region(&from_table.union(), &expected);

        let collection = geojson::FeatureCollection::from(&geo::GeometryCollection::from(vec![
            Geometry::Polygon(polygon.clone()),
        ]));
        let from_geojson = load_aoi(collection.into()).await.unwrap();
        assert_same_region(&from_geojson.union(), &expected);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aoi.geojson");
        let feature_collection = geojson::FeatureCollection::from(&geo::GeometryCollection::from(
            vec![Geometry::Polygon(polygon)],
        ));
        tokio::fs::write(&path, feature_collection.to_string()).await.unwrap();
        let from_path = load_aoi(path.into()).await.unwrap();
        assert_same_region(&from_path.union(), &expected);
    }

    #[tokio::test]
    async fn test_projected_bbox_is_reprojected() {
        let cell = BoundingBox::from_laea20km_id("E402N310").unwrap();
        let layer = load_aoi(cell.into()).await.unwrap();
        let bounds = layer.bounds().unwrap();
        assert_eq!(bounds.crs, Crs::WGS84);
        assert!(bounds.west > -30.0 && bounds.east < 60.0);
        assert!(bounds.south > 30.0 && bounds.north < 75.0);
        // densified outline: 16 segments per edge plus the closing point
        assert_eq!(layer.features[0].shape.0[0].exterior().0.len(), 65);
    }

    #[tokio::test]
    async fn test_table_without_crs_fails() {
        let table = GeoTable::without_crs().with_row(GeoRow::new(enschede().to_polygon()));
        assert!(matches!(
            load_aoi(table.into()).await,
            Err(TilerError::MissingCrs { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_source_gives_empty_layer() {
        let layer = load_aoi(GeoTable::without_crs().into()).await.unwrap();
        assert!(layer.is_empty());
        assert!(layer.union().0.is_empty());
        assert!(layer.bounds().is_none());
    }

    #[tokio::test]
    async fn test_points_are_rejected() {
        let table = GeoTable::new(Crs::WGS84).with_row(GeoRow::new(point!(x: 6.8, y: 52.2)));
        assert!(matches!(
            load_aoi(table.into()).await,
            Err(TilerError::Geometry(_))
        ));
    }

    #[test]
    fn test_union_of_overlapping_features() {
        let left = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 0.0, y: 1.0)];
        let right = polygon![(x: 1.0, y: 0.0), (x: 3.0, y: 0.0), (x: 3.0, y: 1.0), (x: 1.0, y: 1.0)];
        let table = GeoTable::new(Crs::WGS84)
            .with_row(GeoRow::new(left).with_property("crop", "maize"))
            .with_row(GeoRow::new(right).with_property("crop", "wheat"));

        let layer = AoiLayer::from_table(table).unwrap();
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.polygons().count(), 2);
        assert!(layer.has_column("crop"));
        assert!((layer.union().unsigned_area() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_value_dispatch() {
        let bbox = serde_json::json!({
            "west": 6.778564, "south": 52.175195, "east": 6.888428, "north": 52.243358, "crs": "EPSG:4326"
        });
        assert!(matches!(AoiSource::from_json_value(bbox).unwrap(), AoiSource::BBox(_)));

        let feature = serde_json::json!({
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]}
        });
        assert!(matches!(AoiSource::from_json_value(feature).unwrap(), AoiSource::GeoJson(_)));

        assert!(AoiSource::from_json_value(serde_json::json!({"foo": 1})).is_err());
    }
}
