use geo::{Centroid, Coord, Geometry, Intersects, LineString, MapCoords, MultiPolygon, Polygon, Rect, coord};

use super::mgrs::MgrsLocator;
use crate::projection::{Transformer, densified_ring};
use crate::reader::read_geojson_str;
use crate::{BoundingBox, Crs, GeoRow, GeoTable, Result, TilerError};

/// Edge length of a grid cell in metres
pub const LAEA_CELL_SIZE: f64 = 20_000.0;

/// Extent of the continental grid in EPSG:3035 metres (west, south, east, north)
pub const LAEA_COVERAGE: (f64, f64, f64, f64) = (900_000.0, 800_000.0, 8_100_000.0, 7_600_000.0);

/// Buffered pan-European land outline in EPSG:4326; cells outside it are not part of the grid
const PAN_EU_COVERAGE: &str = include_str!("../../resources/pan_eu_coverage.geojson");

/// The pan-European coverage mask in EPSG:4326
pub fn pan_eu_coverage() -> Result<MultiPolygon<f64>> {
    let table = read_geojson_str(PAN_EU_COVERAGE)?;
    let polygons = table
        .rows
        .into_iter()
        .map(|row| match row.geometry {
            Geometry::Polygon(polygon) => Ok(polygon),
            other => Err(TilerError::Geometry(format!(
                "Coverage mask holds a non-polygon geometry: {:?}",
                other
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(MultiPolygon::new(polygons))
}

/// Build the 20 km LAEA Europe cells overlapping `window`
///
/// Cells touching the window edge are included, and only cells reaching into the
/// pan-European coverage mask are kept. Each cell carries its identifier in `name`,
/// its extent in `bbox_dict` and the Sentinel-2 tiles it needs in `s2_tileid_list`,
/// the columns of the packaged grid file.
pub fn laea20km_cells(window: &BoundingBox) -> Result<GeoTable> {
    let window = window.to_crs(Crs::LAEA_EUROPE)?;
    let (min_x, min_y, max_x, max_y) = LAEA_COVERAGE;

    let coverage = pan_eu_coverage()?;
    let to_lat_lon = Transformer::new(Crs::LAEA_EUROPE, Crs::WGS84)?;
    let mut locator = MgrsLocator::new();

    let west = snap_touching(window.west).max(min_x);
    let south = snap_touching(window.south).max(min_y);

    let mut table = GeoTable::new(Crs::LAEA_EUROPE);
    let mut y = south;
    while y <= window.north && y < max_y {
        let mut x = west;
        while x <= window.east && x < max_x {
            let rect = Rect::new(coord! { x: x, y: y }, coord! { x: x + LAEA_CELL_SIZE, y: y + LAEA_CELL_SIZE });
            let outline = Polygon::new(LineString::from(densified_ring(&rect, 4)), vec![]);
            let lat_lon = outline.try_map_coords(|c| to_lat_lon.transform_coord(c))?;
            if lat_lon.intersects(&coverage) {
                let s2_tiles = sentinel2_tiles(&lat_lon, &mut locator)?;
                table.push(cell(rect, outline, s2_tiles)?);
            }
            x += LAEA_CELL_SIZE;
        }
        y += LAEA_CELL_SIZE;
    }

    tracing::debug!("Generated {} LAEA 20km cells", table.len());
    Ok(table)
}

/// Identifier of the cell whose lower-left corner is (`x`, `y`)
pub fn laea20km_id(x: f64, y: f64) -> String {
    format!("E{:03}N{:03}", (x / 10_000.0) as u32, (y / 10_000.0) as u32)
}

/// Lower edge of the first cell touching `value`
fn snap_touching(value: f64) -> f64 {
    (value / LAEA_CELL_SIZE).ceil() * LAEA_CELL_SIZE - LAEA_CELL_SIZE
}

/// Sentinel-2 tiles under the cell centre and corners, centre first, as a comma separated list
fn sentinel2_tiles(outline: &Polygon<f64>, locator: &mut MgrsLocator) -> Result<String> {
    let mut points: Vec<Coord<f64>> = outline.centroid().map(|c| c.0).into_iter().collect();
    points.extend(outline.exterior().coords().step_by(4).copied());

    let mut tiles: Vec<String> = Vec::new();
    for point in points {
        let tile = locator.tile_id(point.x, point.y)?;
        if !tiles.contains(&tile) {
            tiles.push(tile);
        }
    }
    Ok(tiles.join(","))
}

fn cell(rect: Rect<f64>, outline: Polygon<f64>, s2_tiles: String) -> Result<GeoRow> {
    let bbox = BoundingBox::from_rect(rect, Crs::LAEA_EUROPE);
    let bbox_dict = serde_json::to_value(bbox)
        .map_err(|e| TilerError::Parse(format!("Cannot encode bbox: {}", e)))?;

    Ok(GeoRow::new(outline)
        .with_property("name", laea20km_id(rect.min().x, rect.min().y))
        .with_property("s2_tileid_list", s2_tiles)
        .with_property("bbox_dict", bbox_dict))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_ids_round_trip() {
        assert_eq!(laea20km_id(4_020_000.0, 3_100_000.0), "E402N310");
        assert_eq!(laea20km_id(900_000.0, 800_000.0), "E090N080");

        let bbox = BoundingBox::from_laea20km_id(&laea20km_id(4_020_000.0, 3_100_000.0)).unwrap();
        assert_eq!(bbox.west, 4_020_000.0);
        assert_eq!(bbox.south, 3_100_000.0);
    }

    #[test]
    fn test_cells_cover_projected_window() {
        let window = BoundingBox::new(4_025_000.0, 3_105_000.0, 4_045_000.0, 3_110_000.0, Crs::LAEA_EUROPE);
        let cells = laea20km_cells(&window).unwrap();

        let names: Vec<&str> = cells
            .rows
            .iter()
            .filter_map(|row| row.property("name").and_then(|v| v.as_str()))
            .collect();
        assert_eq!(names, vec!["E402N310", "E404N310"]);

        let bbox = BoundingBox::from_dict_value(cells.rows[1].property("bbox_dict").unwrap()).unwrap();
        assert_eq!(bbox.crs, Crs::LAEA_EUROPE);
        assert_eq!(bbox.east, 4_060_000.0);
    }

    #[test]
    fn test_cells_touching_window_edges_are_included() {
        let window = BoundingBox::new(4_020_000.0, 3_105_000.0, 4_040_000.0, 3_110_000.0, Crs::LAEA_EUROPE);
        let cells = laea20km_cells(&window).unwrap();

        let names: Vec<&str> = cells
            .rows
            .iter()
            .filter_map(|row| row.property("name").and_then(|v| v.as_str()))
            .collect();
        assert_eq!(names, vec!["E400N310", "E402N310", "E404N310"]);
    }

    #[test]
    fn test_open_sea_window_is_empty() {
        let atlantic = BoundingBox::new(-25.0, 44.5, -24.0, 45.5, Crs::WGS84);
        assert!(laea20km_cells(&atlantic).unwrap().is_empty());
    }

    #[test]
    fn test_coverage_mask() {
        let coverage = pan_eu_coverage().unwrap();
        assert!(coverage.intersects(&geo::point! { x: 6.85, y: 52.21 }));
        assert!(coverage.intersects(&geo::point! { x: -21.9, y: 64.1 }));
        assert!(coverage.intersects(&geo::point! { x: -25.7, y: 37.7 }));
        assert!(!coverage.intersects(&geo::point! { x: -24.5, y: 45.0 }));
    }

    #[test]
    fn test_cells_carry_sentinel2_tiles() {
        let enschede = BoundingBox::new(6.84, 52.20, 6.86, 52.22, Crs::WGS84);
        let cells = laea20km_cells(&enschede).unwrap();
        assert!(!cells.is_empty());
        for row in &cells.rows {
            let tiles = row.property("s2_tileid_list").and_then(|v| v.as_str()).unwrap();
            assert!(tiles.split(',').any(|tile| tile == "32ULC"), "{}", tiles);
        }
    }

    #[test]
    fn test_window_outside_coverage_is_empty() {
        let window = BoundingBox::new(100.0, 100.0, 50_000.0, 50_000.0, Crs::LAEA_EUROPE);
        assert!(laea20km_cells(&window).unwrap().is_empty());
    }

    #[test]
    fn test_lon_lat_window() {
        let enschede = BoundingBox::new(6.778564, 52.175195, 6.888428, 52.243358, Crs::WGS84);
        let cells = laea20km_cells(&enschede).unwrap();
        assert!((1..=4).contains(&cells.len()), "got {} cells", cells.len());
    }
}
