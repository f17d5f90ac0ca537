use geo::{BoundingRect, Coord, Distance, Geometry, Haversine, LineString, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

use super::Crs;
use crate::projection::{Transformer, densified_ring};
use crate::{Result, TilerError};

/// Segments per edge used when a box is projected into another CRS
const DENSIFY_SEGMENTS: usize = 16;

/// A bounding-box dictionary as consumed by openEO job specifications
///
/// Serializes to `{"west": .., "south": .., "east": .., "north": .., "crs": "EPSG:...."}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western (minimum x) boundary
    pub west: f64,
    /// Southern (minimum y) boundary
    pub south: f64,
    /// Eastern (maximum x) boundary
    pub east: f64,
    /// Northern (maximum y) boundary
    pub north: f64,
    /// Reference system of the four coordinates
    pub crs: Crs,
}

impl BoundingBox {
    /// Create a new bounding box from coordinates
    pub fn new(west: f64, south: f64, east: f64, north: f64, crs: Crs) -> Self {
        Self {
            west,
            south,
            east,
            north,
            crs,
        }
    }

    /// Create a bounding box from a rectangle in the given CRS
    pub fn from_rect(rect: Rect<f64>, crs: Crs) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y, crs)
    }

    /// Bounds of a set of geometries, `None` when there are no coordinates
    pub fn from_geometries<'a>(
        geometries: impl IntoIterator<Item = &'a Geometry<f64>>,
        crs: Crs,
    ) -> Option<Self> {
        geometries
            .into_iter()
            .filter_map(|geometry| geometry.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })
            .map(|rect| Self::from_rect(rect, crs))
    }

    /// Extent of a 20 km LAEA Europe cell from its identifier, e.g. `E402N310`
    ///
    /// The numbers are the lower-left corner in units of 10 km.
    pub fn from_laea20km_id(id: &str) -> Result<Self> {
        let invalid = || TilerError::Config(format!("Invalid LAEA 20km tile id '{}'", id));

        let rest = id.strip_prefix('E').ok_or_else(invalid)?;
        let (east_part, north_part) = rest.split_once('N').ok_or_else(invalid)?;
        let west = east_part.parse::<u32>().map_err(|_| invalid())? as f64 * 10_000.0;
        let south = north_part.parse::<u32>().map_err(|_| invalid())? as f64 * 10_000.0;

        Ok(Self::new(
            west,
            south,
            west + 20_000.0,
            south + 20_000.0,
            Crs::LAEA_EUROPE,
        ))
    }

    /// Parse a bbox dictionary stored in a grid attribute column
    ///
    /// Grid files carry it as a JSON object, a JSON string, or a Python dict repr
    /// such as `{'east': 4340000, 'south': 3100000, 'west': 4320000, 'north': 3120000, 'crs': 3035}`.
    pub fn from_dict_value(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(_) => serde_json::from_value(value.clone())
                .map_err(|e| TilerError::Parse(format!("Invalid bbox dictionary: {}", e))),
            serde_json::Value::String(text) => {
                let normalized = text
                    .replace('\'', "\"")
                    .replace("None", "null")
                    .replace("True", "true")
                    .replace("False", "false");
                serde_json::from_str(&normalized).map_err(|e| {
                    TilerError::Parse(format!("Invalid bbox dictionary '{}': {}", text, e))
                })
            }
            other => Err(TilerError::Parse(format!(
                "Unsupported bbox dictionary value: {}",
                other
            ))),
        }
    }

    /// Get the center point of the bounding box as (x, y)
    pub fn center(&self) -> (f64, f64) {
        ((self.west + self.east) / 2.0, (self.south + self.north) / 2.0)
    }

    /// Get the width of the bounding box in CRS units
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Get the height of the bounding box in CRS units
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Check if this bounding box contains a point given in its own CRS
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.west && x <= self.east && y >= self.south && y <= self.north
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.west,
                y: self.south,
            },
            Coord {
                x: self.east,
                y: self.north,
            },
        )
    }

    /// The box as a polygon in its own CRS
    pub fn to_polygon(&self) -> Polygon<f64> {
        self.to_rect().to_polygon()
    }

    /// The box as a polygon in EPSG:4326
    ///
    /// With `densify` the edges are split before projection so that the curved
    /// outline of a projected box is preserved.
    pub fn to_lat_lon_polygon(&self, densify: bool) -> Result<Polygon<f64>> {
        let transformer = Transformer::new(self.crs, Crs::WGS84)?;
        let segments = if densify { DENSIFY_SEGMENTS } else { 1 };

        let ring = densified_ring(&self.to_rect(), segments)
            .into_iter()
            .map(|coord| transformer.transform_coord(coord))
            .collect::<Result<Vec<_>>>()?;

        Ok(Polygon::new(LineString::from(ring), vec![]))
    }

    /// Re-express the box in another CRS (bounds of the projected, densified outline)
    pub fn to_crs(&self, target: Crs) -> Result<Self> {
        if self.crs == target {
            return Ok(*self);
        }
        let transformer = Transformer::new(self.crs, target)?;
        let rect = transformer.transform_rect(&self.to_rect(), DENSIFY_SEGMENTS)?;
        Ok(Self::from_rect(rect, target))
    }

    /// Get the approximate area in square kilometers using geographic calculations
    pub fn area_km2(&self) -> Result<f64> {
        let ll = self.to_crs(Crs::WGS84)?;
        let (center_lon, center_lat) = ll.center();

        let width_km = {
            let west_point = Point::new(ll.west, center_lat);
            let east_point = Point::new(ll.east, center_lat);
            Haversine.distance(west_point, east_point) / 1000.0
        };

        let height_km = {
            let south_point = Point::new(center_lon, ll.south);
            let north_point = Point::new(center_lon, ll.north);
            Haversine.distance(south_point, north_point) / 1000.0
        };

        Ok(width_km * height_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, point};

    fn enschede() -> BoundingBox {
        BoundingBox::new(6.778564, 52.175195, 6.888428, 52.243358, Crs::WGS84)
    }

    #[test]
    fn test_bounding_box_dimensions() {
        let bbox = BoundingBox::new(13.0, 52.0, 14.0, 53.0, Crs::WGS84);
        assert_eq!(bbox.center(), (13.5, 52.5));
        assert_eq!(bbox.width(), 1.0);
        assert_eq!(bbox.height(), 1.0);
    }

    #[test]
    fn test_bounding_box_contains() {
        let bbox = BoundingBox::new(13.0, 52.0, 14.0, 53.0, Crs::WGS84);

        assert!(bbox.contains(13.5, 52.5)); // Center
        assert!(bbox.contains(13.0, 52.0)); // Southwest corner
        assert!(bbox.contains(14.0, 53.0)); // Northeast corner

        assert!(!bbox.contains(13.5, 51.9)); // Too far south
        assert!(!bbox.contains(12.9, 52.5)); // Too far west
    }

    #[test]
    fn test_bounding_box_area() {
        let area = enschede().area_km2().unwrap();

        // Roughly 7.5km x 7.6km
        assert!(area > 50.0 && area < 65.0, "Area should be around 57 km², got {}", area);
    }

    #[test]
    fn test_projected_area_matches_cell_size() {
        let cell = BoundingBox::from_laea20km_id("E402N310").unwrap();
        let area = cell.area_km2().unwrap();
        assert!((area - 400.0).abs() < 20.0, "got {}", area);
    }

    #[test]
    fn test_laea20km_id_to_extent() {
        let cell = BoundingBox::from_laea20km_id("E402N310").unwrap();
        assert_eq!(cell.west, 4_020_000.0);
        assert_eq!(cell.south, 3_100_000.0);
        assert_eq!(cell.east, 4_040_000.0);
        assert_eq!(cell.north, 3_120_000.0);
        assert_eq!(cell.crs, Crs::LAEA_EUROPE);

        assert!(BoundingBox::from_laea20km_id("N402E310").is_err());
        assert!(BoundingBox::from_laea20km_id("E402").is_err());
        assert!(BoundingBox::from_laea20km_id("EabcN310").is_err());
    }

    #[test]
    fn test_dict_value_forms() {
        let expected = BoundingBox::new(4_320_000.0, 3_100_000.0, 4_340_000.0, 3_120_000.0, Crs::LAEA_EUROPE);

        let object = serde_json::json!({
            "west": 4320000, "south": 3100000, "east": 4340000, "north": 3120000, "crs": "EPSG:3035"
        });
        assert_eq!(BoundingBox::from_dict_value(&object).unwrap(), expected);

        let python_repr = serde_json::Value::String(
            "{'east': 4340000, 'south': 3100000, 'west': 4320000, 'north': 3120000, 'crs': 3035}"
                .to_string(),
        );
        assert_eq!(BoundingBox::from_dict_value(&python_repr).unwrap(), expected);

        assert!(BoundingBox::from_dict_value(&serde_json::json!(42)).is_err());
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(enschede()).unwrap();
        assert_eq!(json["crs"], "EPSG:4326");
        assert_eq!(json["west"], 6.778564);
        let back: BoundingBox = serde_json::from_value(json).unwrap();
        assert_eq!(back, enschede());
    }

    #[test]
    fn test_from_geometries() {
        let points = [
            Geometry::Point(point!(x: 5.0, y: 51.0)),
            Geometry::Point(point!(x: 6.5, y: 52.5)),
            Geometry::Point(point!(x: 5.5, y: 50.0)),
        ];
        let bbox = BoundingBox::from_geometries(points.iter(), Crs::WGS84).unwrap();
        assert_eq!(bbox, BoundingBox::new(5.0, 50.0, 6.5, 52.5, Crs::WGS84));

        assert!(BoundingBox::from_geometries(std::iter::empty(), Crs::WGS84).is_none());
    }

    #[test]
    fn test_lat_lon_polygon_of_projected_box() {
        let cell = BoundingBox::from_laea20km_id("E402N310").unwrap();
        let polygon = cell.to_lat_lon_polygon(true).unwrap();
        assert_eq!(polygon.exterior().0.len(), DENSIFY_SEGMENTS * 4 + 1);
        assert!(polygon.unsigned_area() > 0.0);

        let rect = polygon.bounding_rect().unwrap();
        assert!(rect.min().x > 5.0 && rect.max().x < 15.0);
        assert!(rect.min().y > 45.0 && rect.max().y < 55.0);
    }
}
