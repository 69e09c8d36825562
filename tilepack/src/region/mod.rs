//! Region definitions and tile enumeration.
//!
//! A [`Region`] is a named geographic bounding box supplied by configuration.
//! [`Region::tiles`] expands the box at a zoom level into the rectangle of
//! tile coordinates covering it: the tile of the northwest corner through the
//! tile of the southeast corner, inclusive in both axes. This deliberately
//! over-covers shapes that are not rectangles; the fetcher's existence check
//! makes the extra tiles cheap.

use serde::{Deserialize, Serialize};

use crate::coord::{to_tile_coord, CoordError, TileCoord};

/// A rectangular latitude/longitude extent.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BoundingBox {
    /// Southern edge, degrees.
    pub min_lat: f64,
    /// Northern edge, degrees.
    pub max_lat: f64,
    /// Western edge, degrees.
    pub min_lon: f64,
    /// Eastern edge, degrees.
    pub max_lon: f64,
}

impl BoundingBox {
    /// Creates a bounding box.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// True if the edges are ordered (south <= north, west <= east).
    pub fn is_ordered(&self) -> bool {
        self.min_lat <= self.max_lat && self.min_lon <= self.max_lon
    }
}

/// A named region to mirror, defined by its bounding box.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Region {
    /// Display name, e.g. "Vietnam mainland".
    pub name: String,
    /// Geographic extent.
    pub bounds: BoundingBox,
}

impl Region {
    /// Creates a region.
    pub fn new(name: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }

    /// Enumerates the tiles covering this region at the given zoom level.
    ///
    /// Returns the full cartesian product of the inclusive x and y ranges,
    /// column by column; each coordinate appears exactly once. The maximum
    /// latitude maps to the *minimum* row because tile rows grow southward.
    pub fn tiles(&self, zoom: u8) -> Result<Vec<TileCoord>, CoordError> {
        tiles_in_bounds(&self.bounds, zoom)
    }

    /// Number of tiles [`Region::tiles`] would return, without materializing
    /// them.
    pub fn tile_count(&self, zoom: u8) -> Result<usize, CoordError> {
        let (northwest, southeast) = corner_tiles(&self.bounds, zoom)?;
        Ok(rect_count(&northwest, &southeast))
    }
}

fn corner_tiles(bounds: &BoundingBox, zoom: u8) -> Result<(TileCoord, TileCoord), CoordError> {
    let northwest = to_tile_coord(bounds.max_lat, bounds.min_lon, zoom)?;
    let southeast = to_tile_coord(bounds.min_lat, bounds.max_lon, zoom)?;
    Ok((northwest, southeast))
}

fn rect_count(northwest: &TileCoord, southeast: &TileCoord) -> usize {
    (southeast.x - northwest.x + 1) as usize * (southeast.y - northwest.y + 1) as usize
}

/// Enumerates the tiles covering `bounds` at `zoom`. See [`Region::tiles`].
pub fn tiles_in_bounds(bounds: &BoundingBox, zoom: u8) -> Result<Vec<TileCoord>, CoordError> {
    let (northwest, southeast) = corner_tiles(bounds, zoom)?;

    let mut tiles = Vec::with_capacity(rect_count(&northwest, &southeast));
    for x in northwest.x..=southeast.x {
        for y in northwest.y..=southeast.y {
            tiles.push(TileCoord { zoom, x, y });
        }
    }

    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn vietnam_mainland() -> Region {
        Region::new(
            "Vietnam mainland",
            BoundingBox::new(8.0, 23.5, 102.0, 110.0),
        )
    }

    #[test]
    fn test_vietnam_mainland_at_zoom_11() {
        // Fixed, deterministic rectangle: x 1604..=1649, y 886..=978
        let tiles = vietnam_mainland().tiles(11).unwrap();

        assert_eq!(tiles.len(), 46 * 93);
        assert_eq!(tiles.first(), Some(&TileCoord::new(11, 1604, 886)));
        assert_eq!(tiles.last(), Some(&TileCoord::new(11, 1649, 978)));

        let min_x = tiles.iter().map(|t| t.x).min().unwrap();
        let max_x = tiles.iter().map(|t| t.x).max().unwrap();
        let min_y = tiles.iter().map(|t| t.y).min().unwrap();
        let max_y = tiles.iter().map(|t| t.y).max().unwrap();
        assert_eq!((min_x, max_x, min_y, max_y), (1604, 1649, 886, 978));
    }

    #[test]
    fn test_enumeration_is_reproducible() {
        let first = vietnam_mainland().tiles(11).unwrap();
        let second = vietnam_mainland().tiles(11).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tiles_are_unique() {
        let tiles = vietnam_mainland().tiles(11).unwrap();
        let unique: HashSet<_> = tiles.iter().copied().collect();
        assert_eq!(unique.len(), tiles.len());
    }

    #[test]
    fn test_tile_count_matches_enumeration() {
        let region = vietnam_mainland();
        for zoom in [5, 8, 11] {
            assert_eq!(
                region.tile_count(zoom).unwrap(),
                region.tiles(zoom).unwrap().len()
            );
        }
    }

    #[test]
    fn test_single_point_region_yields_one_tile() {
        let region = Region::new("point", BoundingBox::new(10.0, 10.0, 106.0, 106.0));
        let tiles = region.tiles(11).unwrap();
        assert_eq!(tiles.len(), 1);
    }

    #[test]
    fn test_y_axis_inversion() {
        // The northern edge must land on the smallest row
        let region = vietnam_mainland();
        let north = to_tile_coord(region.bounds.max_lat, region.bounds.min_lon, 11).unwrap();
        let south = to_tile_coord(region.bounds.min_lat, region.bounds.min_lon, 11).unwrap();
        assert!(north.y < south.y);

        let tiles = region.tiles(11).unwrap();
        assert_eq!(tiles.iter().map(|t| t.y).min().unwrap(), north.y);
    }

    #[test]
    fn test_out_of_range_bounds_propagate_error() {
        let region = Region::new("bad", BoundingBox::new(-89.0, 23.5, 102.0, 110.0));
        assert!(region.tiles(11).is_err());
    }

    #[test]
    fn test_overlapping_regions_do_not_deduplicate() {
        // Concatenating two overlapping enumerations keeps the duplicates;
        // the fetcher resolves them as no-op skips.
        let a = Region::new("a", BoundingBox::new(10.0, 11.0, 105.0, 106.0));
        let b = Region::new("b", BoundingBox::new(10.5, 11.5, 105.5, 106.5));

        let mut combined = a.tiles(11).unwrap();
        combined.extend(b.tiles(11).unwrap());

        let unique: HashSet<_> = combined.iter().copied().collect();
        assert!(unique.len() < combined.len());
    }

    #[test]
    fn test_region_deserializes_from_json() {
        let json = r#"{
            "name": "Paracel Islands",
            "bounds": { "min_lat": 15.5, "max_lat": 17.5, "min_lon": 111.0, "max_lon": 113.0 }
        }"#;

        let region: Region = serde_json::from_str(json).unwrap();
        assert_eq!(region.name, "Paracel Islands");
        assert_eq!(region.bounds.min_lat, 15.5);
        assert!(region.bounds.is_ordered());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_count_formula(
                lat_a in -80.0..80.0_f64,
                lat_span in 0.0..5.0_f64,
                lon_a in -170.0..170.0_f64,
                lon_span in 0.0..5.0_f64,
                zoom in 0u8..=12
            ) {
                let bounds = BoundingBox::new(lat_a, lat_a + lat_span, lon_a, lon_a + lon_span);
                let tiles = tiles_in_bounds(&bounds, zoom)?;

                let northwest = to_tile_coord(bounds.max_lat, bounds.min_lon, zoom)?;
                let southeast = to_tile_coord(bounds.min_lat, bounds.max_lon, zoom)?;

                let expected = (southeast.x - northwest.x + 1) as usize
                    * (southeast.y - northwest.y + 1) as usize;
                prop_assert_eq!(tiles.len(), expected);

                let unique: HashSet<_> = tiles.iter().copied().collect();
                prop_assert_eq!(unique.len(), tiles.len());
            }
        }
    }
}
