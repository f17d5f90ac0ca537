//! Pure-Rust coordinate transformation between EPSG-coded reference systems.
//!
//! Definitions come from the `crs-definitions` database and are evaluated with
//! `proj4rs`, so no system PROJ installation is needed.

use geo::{Coord, Geometry, MapCoords, Rect};
use proj4rs::proj::Proj;

use crate::{Crs, Result, TilerError};

/// Transforms coordinates from one CRS into another
pub struct Transformer {
    source: Crs,
    target: Crs,
    projections: Option<(Proj, Proj)>,
}

impl Transformer {
    /// Build a transformer, failing if either CRS is missing from the EPSG database
    pub fn new(source: Crs, target: Crs) -> Result<Self> {
        if source == target {
            return Ok(Self {
                source,
                target,
                projections: None,
            });
        }

        let source_proj = Self::load(source)?;
        let target_proj = Self::load(target)?;

        Ok(Self {
            source,
            target,
            projections: Some((source_proj, target_proj)),
        })
    }

    fn load(crs: Crs) -> Result<Proj> {
        let definition = crs.proj_string().ok_or_else(|| {
            TilerError::Projection(format!("{} is not in the crs-definitions database", crs))
        })?;
        Proj::from_proj_string(definition)
            .map_err(|e| TilerError::Projection(format!("Invalid projection {}: {:?}", crs, e)))
    }

    pub fn source(&self) -> Crs {
        self.source
    }

    pub fn target(&self) -> Crs {
        self.target
    }

    /// Whether this transformer leaves coordinates untouched
    pub fn is_identity(&self) -> bool {
        self.projections.is_none()
    }

    /// Transform a single coordinate
    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let Some((source_proj, target_proj)) = &self.projections else {
            return Ok(coord);
        };

        // proj4rs works in radians for geographic systems
        let mut point = if self.source.is_geographic() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        proj4rs::transform::transform(source_proj, target_proj, &mut point).map_err(|e| {
            TilerError::Projection(format!(
                "Transform of ({}, {}) from {} to {} failed: {:?}",
                coord.x, coord.y, self.source, self.target, e
            ))
        })?;

        let (x, y) = if self.target.is_geographic() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !x.is_finite() || !y.is_finite() {
            return Err(TilerError::Projection(format!(
                "Transform of ({}, {}) from {} to {} produced non-finite coordinates",
                coord.x, coord.y, self.source, self.target
            )));
        }

        Ok(Coord { x, y })
    }

    /// Transform every vertex of a geometry
    pub fn transform_geometry(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        if self.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|coord| self.transform_coord(coord))
    }

    /// Transform a rectangle, densifying its edges so the result bounds the projected shape
    pub fn transform_rect(&self, rect: &Rect<f64>, segments_per_edge: usize) -> Result<Rect<f64>> {
        if self.is_identity() {
            return Ok(*rect);
        }

        let ring = densified_ring(rect, segments_per_edge);
        let mut min = Coord {
            x: f64::INFINITY,
            y: f64::INFINITY,
        };
        let mut max = Coord {
            x: f64::NEG_INFINITY,
            y: f64::NEG_INFINITY,
        };
        for coord in ring {
            let projected = self.transform_coord(coord)?;
            min.x = min.x.min(projected.x);
            min.y = min.y.min(projected.y);
            max.x = max.x.max(projected.x);
            max.y = max.y.max(projected.y);
        }

        Ok(Rect::new(min, max))
    }
}

/// Closed ring around a rectangle with `segments_per_edge` segments on each side
pub fn densified_ring(rect: &Rect<f64>, segments_per_edge: usize) -> Vec<Coord<f64>> {
    let steps = segments_per_edge.max(1);
    let (min, max) = (rect.min(), rect.max());
    let corners = [
        Coord { x: min.x, y: min.y },
        Coord { x: max.x, y: min.y },
        Coord { x: max.x, y: max.y },
        Coord { x: min.x, y: max.y },
    ];

    let mut ring = Vec::with_capacity(steps * 4 + 1);
    for (i, start) in corners.iter().enumerate() {
        let end = corners[(i + 1) % corners.len()];
        for step in 0..steps {
            let t = step as f64 / steps as f64;
            ring.push(Coord {
                x: start.x + (end.x - start.x) * t,
                y: start.y + (end.y - start.y) * t,
            });
        }
    }
    ring.push(corners[0]);
    ring
}

/// Reproject a geometry, short-circuiting when the CRS already matches
pub fn reproject(geometry: &Geometry<f64>, source: Crs, target: Crs) -> Result<Geometry<f64>> {
    Transformer::new(source, target)?.transform_geometry(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, point};

    const EPS: f64 = 1e-6;

    #[test]
    fn test_identity_transform() {
        let transformer = Transformer::new(Crs::WGS84, Crs::WGS84).unwrap();
        assert!(transformer.is_identity());
        let c = transformer.transform_coord(coord! { x: 6.8, y: 52.2 }).unwrap();
        assert_eq!(c, coord! { x: 6.8, y: 52.2 });
    }

    #[test]
    fn test_laea_origin_round_trip() {
        // LAEA Europe is centred on 10E 52N with false origin 4321000 / 3210000
        let to_laea = Transformer::new(Crs::WGS84, Crs::LAEA_EUROPE).unwrap();
        let projected = to_laea.transform_coord(coord! { x: 10.0, y: 52.0 }).unwrap();
        assert!((projected.x - 4_321_000.0).abs() < 1.0, "x = {}", projected.x);
        assert!((projected.y - 3_210_000.0).abs() < 1.0, "y = {}", projected.y);

        let back = Transformer::new(Crs::LAEA_EUROPE, Crs::WGS84).unwrap();
        let ll = back.transform_coord(projected).unwrap();
        assert!((ll.x - 10.0).abs() < EPS);
        assert!((ll.y - 52.0).abs() < EPS);
    }

    #[test]
    fn test_geometry_transform_keeps_shape() {
        let geometry = Geometry::Point(point!(x: 6.8, y: 52.2));
        let projected = reproject(&geometry, Crs::WGS84, Crs::LAEA_EUROPE).unwrap();
        assert!(matches!(projected, Geometry::Point(_)));
    }

    #[test]
    fn test_densified_ring_is_closed() {
        let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 2.0, y: 1.0 });
        let ring = densified_ring(&rect, 4);
        assert_eq!(ring.len(), 17);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_unknown_epsg_fails() {
        assert!(Transformer::new(Crs::epsg(1), Crs::WGS84).is_err());
    }
}
