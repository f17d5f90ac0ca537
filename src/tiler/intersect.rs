use geo::{Intersects, MultiPolygon};
use serde_json::{Map, Value};

use crate::aoi::AoiLayer;
use crate::grid::{GridTile, TilingGrid};
use crate::{TileJobRow, TilerWarning};

/// Select every tile touching or overlapping `region`, in grid order
pub fn intersecting_tiles<'a>(
    grid: &'a TilingGrid,
    region: &'a MultiPolygon<f64>,
) -> impl Iterator<Item = &'a GridTile> {
    grid.tiles
        .iter()
        .filter(move |tile| tile.geometry.intersects(region))
}

/// Build one job row per grid tile intersecting the AOI
///
/// Merged columns come from the lowest-index AOI feature intersecting the tile.
/// Tiles hit by several features with differing values get an
/// [`TilerWarning::AmbiguousMerge`].
pub fn build_job_rows(
    aoi: &AoiLayer,
    grid: &TilingGrid,
    merge_columns: Option<&[String]>,
) -> (Vec<TileJobRow>, Vec<TilerWarning>) {
    let mut warnings = Vec::new();
    let region = aoi.union();
    if region.0.is_empty() {
        return (Vec::new(), warnings);
    }

    let requested = merge_columns.unwrap_or_default();
    let columns: Vec<&String> = requested.iter().filter(|c| aoi.has_column(c)).collect();
    if !requested.is_empty() && columns.is_empty() {
        warnings.push(
            TilerWarning::NoMergeColumnsFound {
                requested: requested.to_vec(),
            }
            .emit(),
        );
    }

    let rows = intersecting_tiles(grid, &region)
        .map(|tile| {
            let tile_id = tile.tile_id();
            let attributes = if columns.is_empty() {
                Map::new()
            } else {
                let (attributes, ambiguous) = merge_attributes(aoi, tile, &columns);
                if let Some(candidates) = ambiguous {
                    warnings.push(
                        TilerWarning::AmbiguousMerge {
                            tile_id: tile_id.clone(),
                            candidates,
                        }
                        .emit(),
                    );
                }
                attributes
            };

            TileJobRow {
                tile_id,
                source_index: tile.index,
                bbox_dict: tile.job_bbox(grid.native_crs),
                geometry: tile.geometry.clone(),
                attributes,
            }
        })
        .collect();

    (rows, warnings)
}

/// Attributes of the first intersecting feature, plus the candidate list when it is ambiguous
fn merge_attributes(
    aoi: &AoiLayer,
    tile: &GridTile,
    columns: &[&String],
) -> (Map<String, Value>, Option<Vec<usize>>) {
    let candidates: Vec<usize> = aoi
        .features
        .iter()
        .enumerate()
        .filter(|(_, feature)| tile.geometry.intersects(&feature.shape))
        .map(|(index, _)| index)
        .collect();

    let values_of = |index: usize| -> Map<String, Value> {
        columns
            .iter()
            .map(|column| {
                let value = aoi.features[index]
                    .property(column)
                    .cloned()
                    .unwrap_or(Value::Null);
                ((*column).clone(), value)
            })
            .collect()
    };

    let Some(&first) = candidates.first() else {
        return (columns.iter().map(|c| ((*c).clone(), Value::Null)).collect(), None);
    };

    let attributes = values_of(first);
    let ambiguous = candidates[1..]
        .iter()
        .any(|&other| values_of(other) != attributes);

    (attributes, ambiguous.then_some(candidates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundingBox, Crs, GeoRow, GeoTable};
    use geo::{Geometry, Rect, coord};

    fn tile(index: usize, x: f64) -> GridTile {
        let rect = Rect::new(coord! { x: x, y: 0.0 }, coord! { x: x + 1.0, y: 1.0 });
        GridTile {
            index,
            id: None,
            bbox_dict: None,
            geometry: Geometry::Polygon(rect.to_polygon()),
            native_bounds: rect,
        }
    }

    fn grid() -> TilingGrid {
        TilingGrid {
            native_crs: Crs::WGS84,
            tiles: vec![tile(0, 0.0), tile(1, 1.0), tile(2, 5.0)],
            has_id_column: false,
            has_bbox_column: false,
            warnings: vec![],
        }
    }

    fn aoi(features: &[(f64, f64, &str)]) -> AoiLayer {
        let mut table = GeoTable::new(Crs::WGS84);
        for &(west, east, crop) in features {
            let bbox = BoundingBox::new(west, 0.2, east, 0.8, Crs::WGS84);
            table.push(GeoRow::new(bbox.to_polygon()).with_property("crop", crop));
        }
        AoiLayer::from_table(table).unwrap()
    }

    #[test]
    fn test_touching_tiles_are_selected() {
        // the AOI ends exactly on the boundary between tile 0 and tile 1
        let (rows, warnings) = build_job_rows(&aoi(&[(0.2, 1.0, "maize")]), &grid(), None);
        assert!(warnings.is_empty());
        assert_eq!(rows.iter().map(|r| r.source_index).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(rows[0].tile_id, "0");
        assert_eq!(rows[1].bbox_dict, BoundingBox::new(1.0, 0.0, 2.0, 1.0, Crs::WGS84));
    }

    #[test]
    fn test_first_match_merge_with_ambiguity_warning() {
        let layer = aoi(&[(0.2, 0.4, "maize"), (0.6, 1.5, "wheat")]);
        let columns = vec!["crop".to_string()];
        let (rows, warnings) = build_job_rows(&layer, &grid(), Some(columns.as_slice()));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].attributes["crop"], Value::from("maize"));
        assert_eq!(rows[1].attributes["crop"], Value::from("wheat"));
        assert_eq!(
            warnings,
            vec![TilerWarning::AmbiguousMerge {
                tile_id: "0".to_string(),
                candidates: vec![0, 1],
            }]
        );
    }

    #[test]
    fn test_equal_values_are_not_ambiguous() {
        let layer = aoi(&[(0.2, 0.4, "maize"), (0.6, 0.8, "maize")]);
        let columns = vec!["crop".to_string()];
        let (rows, warnings) = build_job_rows(&layer, &grid(), Some(columns.as_slice()));
        assert_eq!(rows.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unknown_merge_columns() {
        let columns = vec!["field_id".to_string()];
        let (rows, warnings) = build_job_rows(&aoi(&[(0.2, 0.4, "maize")]), &grid(), Some(columns.as_slice()));
        assert!(rows[0].attributes.is_empty());
        assert_eq!(
            warnings,
            vec![TilerWarning::NoMergeColumnsFound { requested: columns }]
        );
    }

    #[test]
    fn test_empty_aoi_gives_no_rows() {
        let (rows, warnings) = build_job_rows(&AoiLayer::default(), &grid(), None);
        assert!(rows.is_empty() && warnings.is_empty());
    }
}
