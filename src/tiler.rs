//! Polygon to H3 cell conversion.
//!
//! A cell belongs to a polygon when its centre lies inside the polygon
//! (`ContainmentMode::ContainsCentroid`). By default only the exterior ring
//! bounds the coverage; interior rings are dropped before tiling.

use crate::error::{CoverageError, Result};
use geo::{Coord, LineString, Polygon};
use h3o::geom::{ContainmentMode, TilerBuilder};
use h3o::{CellIndex, LatLng, Resolution};
use std::collections::HashSet;

/// How interior rings (holes) of a polygon are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoleMode {
    /// Tile the exterior ring only; cells inside holes are covered.
    #[default]
    Ignore,
    /// Cells whose centre falls inside a hole are left out.
    Exclude,
}

/// Produces the cells a polygon covers at a resolution.
pub trait GridTiler: Sync {
    fn tile(&self, polygon: &Polygon<f64>, resolution: u8) -> Result<Vec<CellIndex>>;
}

/// [`GridTiler`] backed by the `h3o` tiler.
#[derive(Debug, Clone, Copy, Default)]
pub struct H3Tiler {
    pub holes: HoleMode,
}

impl H3Tiler {
    pub fn new(holes: HoleMode) -> Self {
        Self { holes }
    }
}

impl GridTiler for H3Tiler {
    fn tile(&self, polygon: &Polygon<f64>, resolution: u8) -> Result<Vec<CellIndex>> {
        tile_with(polygon, resolution, self.holes)
    }
}

pub fn parse_resolution(level: u8) -> Result<Resolution> {
    Resolution::try_from(level).map_err(|_| CoverageError::UnsupportedResolution(level))
}

/// Cells covered by the exterior ring of `polygon` at `resolution`.
///
/// The returned cells are unique; their order is unspecified.
pub fn tile(polygon: &Polygon<f64>, resolution: u8) -> Result<Vec<CellIndex>> {
    tile_with(polygon, resolution, HoleMode::Ignore)
}

pub fn tile_with(polygon: &Polygon<f64>, resolution: u8, holes: HoleMode) -> Result<Vec<CellIndex>> {
    let resolution = parse_resolution(resolution)?;
    validate_ring(polygon.exterior(), "exterior ring")?;

    let interiors = match holes {
        HoleMode::Ignore => Vec::new(),
        HoleMode::Exclude => {
            for (i, ring) in polygon.interiors().iter().enumerate() {
                validate_ring(ring, &format!("interior ring {}", i))?;
            }
            polygon.interiors().to_vec()
        }
    };
    let input = Polygon::new(polygon.exterior().clone(), interiors);

    let mut tiler = TilerBuilder::new(resolution)
        .containment_mode(ContainmentMode::ContainsCentroid)
        .build();
    tiler
        .add(input)
        .map_err(|e| CoverageError::TilingFailure(e.to_string()))?;

    let mut cells: Vec<CellIndex> = tiler.into_coverage().collect();
    cells.sort_unstable();
    cells.dedup();
    Ok(cells)
}

/// Centre of `cell` as `(latitude, longitude)` in degrees.
pub fn center_of(cell: CellIndex) -> (f64, f64) {
    let center = LatLng::from(cell);
    (center.lat(), center.lng())
}

fn validate_ring(ring: &LineString<f64>, name: &str) -> Result<()> {
    if let Some(bad) = ring.0.iter().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(CoverageError::InvalidGeometry(format!(
            "{} has a non-finite coordinate ({}, {})",
            name, bad.x, bad.y
        )));
    }

    let distinct = count_distinct(&ring.0, 3);
    if distinct < 3 {
        return Err(CoverageError::InvalidGeometry(format!(
            "{} has {} distinct point(s), at least 3 are required",
            name, distinct
        )));
    }
    Ok(())
}

// Stops counting once `limit` is reached.
fn count_distinct(coords: &[Coord<f64>], limit: usize) -> usize {
    let mut seen = HashSet::new();
    for c in coords {
        seen.insert((c.x.to_bits(), c.y.to_bits()));
        if seen.len() >= limit {
            break;
        }
    }
    seen.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn unit_square() -> Polygon<f64> {
        polygon![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 1.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 0.0)
        ]
    }

    #[test]
    fn test_unit_square_res4() {
        let cells = tile(&unit_square(), 4).unwrap();
        assert!(!cells.is_empty());

        for cell in &cells {
            assert_eq!(u8::from(cell.resolution()), 4);
            let (lat, lng) = center_of(*cell);
            assert!((0.0..=1.0).contains(&lat), "lat {} outside square", lat);
            assert!((0.0..=1.0).contains(&lng), "lng {} outside square", lng);
        }
    }

    #[test]
    fn test_no_duplicates() {
        let cells = tile(&unit_square(), 6).unwrap();
        let unique: HashSet<_> = cells.iter().collect();
        assert_eq!(unique.len(), cells.len());
    }

    #[test]
    fn test_two_point_ring_is_invalid() {
        let line = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        match tile(&line, 4) {
            Err(CoverageError::InvalidGeometry(msg)) => assert!(msg.contains("distinct")),
            other => panic!("expected InvalidGeometry, got {:?}", other),
        }
    }

    #[test]
    fn test_repeated_points_are_invalid() {
        let degenerate = polygon![
            (x: 5.0, y: 5.0),
            (x: 5.0, y: 5.0),
            (x: 6.0, y: 6.0),
            (x: 5.0, y: 5.0)
        ];
        assert!(matches!(
            tile(&degenerate, 4),
            Err(CoverageError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_non_finite_is_invalid() {
        let bad = polygon![
            (x: 0.0, y: 0.0),
            (x: f64::NAN, y: 1.0),
            (x: 1.0, y: 1.0)
        ];
        assert!(matches!(tile(&bad, 4), Err(CoverageError::InvalidGeometry(_))));
    }

    #[test]
    fn test_unsupported_resolution() {
        assert_eq!(
            tile(&unit_square(), 16),
            Err(CoverageError::UnsupportedResolution(16))
        );
        assert!(parse_resolution(15).is_ok());
    }

    #[test]
    fn test_tiny_polygon_yields_empty() {
        let tiny = polygon![
            (x: 10.0, y: 10.0),
            (x: 10.000001, y: 10.0),
            (x: 10.000001, y: 10.000001),
            (x: 10.0, y: 10.000001)
        ];
        assert_eq!(tile(&tiny, 2).unwrap(), Vec::new());
    }

    #[test]
    fn test_holes_ignored_by_default() {
        let donut = Polygon::new(
            unit_square().exterior().clone(),
            vec![LineString::from(vec![
                (0.2, 0.2),
                (0.2, 0.8),
                (0.8, 0.8),
                (0.8, 0.2),
                (0.2, 0.2)
            ])],
        );

        let ignored = tile(&donut, 6).unwrap();
        assert_eq!(ignored, tile(&unit_square(), 6).unwrap());

        let excluded = tile_with(&donut, 6, HoleMode::Exclude).unwrap();
        assert!(excluded.len() < ignored.len());
        for cell in &excluded {
            let (lat, lng) = center_of(*cell);
            assert!(!(lat > 0.25 && lat < 0.75 && lng > 0.25 && lng < 0.75));
        }
    }

    #[test]
    fn test_coarser_cell_is_ancestor() {
        let coarse = tile(&unit_square(), 4).unwrap();
        for cell in coarse {
            let (lat, lng) = center_of(cell);
            let point = LatLng::new(lat, lng).unwrap();
            let fine = point.to_cell(parse_resolution(7).unwrap());
            assert_eq!(fine.parent(cell.resolution()), Some(cell));
        }
    }
}
