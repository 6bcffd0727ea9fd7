//! Tile index mapping
//!
//! Maps a geographic region and zoom level onto the rectangle of Web Mercator
//! tiles that covers it.

mod types;

pub use types::{
    Bounds, CoordError, CoordinateRegion, LatLon, Span, TileCoord, TileRange, TileRangeIter,
    MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Returns the inclusive rectangle of tiles covering `region` at `zoom`.
///
/// The region is validated first; degenerate spans, out-of-range centers and
/// unsupported zoom levels are rejected instead of producing an empty or
/// wrong set. Region edges beyond the Mercator domain are clamped.
///
/// Latitude is inverted: the northern edge gives `y_min`, the southern edge
/// gives `y_max`.
pub fn tiles_for(region: &CoordinateRegion, zoom: u8) -> Result<TileRange, CoordError> {
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }
    region.validate()?;

    let bounds = region.bounds();
    let tiles_per_side = 2.0_f64.powi(zoom as i32);

    Ok(TileRange {
        zoom,
        x_min: lon_to_x(bounds.min_lon, tiles_per_side),
        x_max: lon_to_x(bounds.max_lon, tiles_per_side),
        y_min: lat_to_y(bounds.max_lat, tiles_per_side),
        y_max: lat_to_y(bounds.min_lat, tiles_per_side),
    })
}

/// Returns the tile ranges for every zoom level in `min_zoom..=max_zoom`.
pub fn tiles_for_zoom_range(
    region: &CoordinateRegion,
    min_zoom: u8,
    max_zoom: u8,
) -> Result<Vec<TileRange>, CoordError> {
    if min_zoom > max_zoom {
        return Err(CoordError::InvalidZoomRange {
            min: min_zoom,
            max: max_zoom,
        });
    }
    (min_zoom..=max_zoom)
        .map(|zoom| tiles_for(region, zoom))
        .collect()
}

/// Counts the tiles a zoom range would plan, rejecting counts above `limit`.
pub fn checked_tile_count(
    region: &CoordinateRegion,
    min_zoom: u8,
    max_zoom: u8,
    limit: u64,
) -> Result<u64, CoordError> {
    let count = tiles_for_zoom_range(region, min_zoom, max_zoom)?
        .iter()
        .map(TileRange::len)
        .sum();

    if count > limit {
        return Err(CoordError::TooManyTiles { count, max: limit });
    }
    Ok(count)
}

#[inline]
fn lon_to_x(lon: f64, tiles_per_side: f64) -> u32 {
    let x = (((lon + 180.0) / 360.0) * tiles_per_side).floor();
    clamp_index(x, tiles_per_side)
}

#[inline]
fn lat_to_y(lat: f64, tiles_per_side: f64) -> u32 {
    let lat_rad = lat * PI / 180.0;
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * tiles_per_side)
        .floor();
    clamp_index(y, tiles_per_side)
}

// lon = 180 and the Mercator limits land exactly on `tiles_per_side`.
#[inline]
fn clamp_index(value: f64, tiles_per_side: f64) -> u32 {
    value.clamp(0.0, tiles_per_side - 1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(lat: f64, lon: f64, delta: f64) -> CoordinateRegion {
        CoordinateRegion::new(lat, lon, delta, delta)
    }

    #[test]
    fn test_zoom_zero_is_single_tile() {
        let range = tiles_for(&square(40.7128, -74.0060, 1.0), 0).unwrap();
        let tiles: Vec<_> = range.iter().collect();
        assert_eq!(tiles, vec![TileCoord::new(0, 0, 0)]);
    }

    #[test]
    fn test_equator_region_spans_four_tiles_at_zoom_one() {
        let range = tiles_for(&square(0.0, 0.0, 20.0), 1).unwrap();
        assert_eq!((range.x_min, range.x_max), (0, 1));
        assert_eq!((range.y_min, range.y_max), (0, 1));
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_new_york_point_region_at_zoom_16() {
        // Lower Manhattan.
        let range = tiles_for(&square(40.7128, -74.0060, 0.000_001), 16).unwrap();
        assert_eq!(range.x_min, 19295);
        assert_eq!(range.y_min, 24640);
        assert_eq!(range.len(), 1);
    }

    #[test]
    fn test_latitude_inversion() {
        let north = tiles_for(&square(60.0, 10.0, 1.0), 8).unwrap();
        let south = tiles_for(&square(-60.0, 10.0, 1.0), 8).unwrap();
        assert!(north.y_max < south.y_min);
    }

    #[test]
    fn test_antimeridian_edge_is_clamped() {
        let range = tiles_for(&square(0.0, 180.0, 2.0), 3).unwrap();
        assert_eq!(range.x_max, 7);
    }

    #[test]
    fn test_polar_region_is_clamped() {
        let range = tiles_for(&square(89.0, 0.0, 4.0), 4).unwrap();
        assert_eq!(range.y_min, 0);
        assert!(range.y_max < 16);
    }

    #[test]
    fn test_zero_span_rejected() {
        let result = tiles_for(&CoordinateRegion::new(10.0, 10.0, 0.0, 1.0), 5);
        assert!(matches!(result, Err(CoordError::InvalidSpan { .. })));
    }

    #[test]
    fn test_negative_span_rejected() {
        let result = tiles_for(&CoordinateRegion::new(10.0, 10.0, 1.0, -1.0), 5);
        assert!(matches!(result, Err(CoordError::InvalidSpan { .. })));
    }

    #[test]
    fn test_nan_rejected() {
        let result = tiles_for(&CoordinateRegion::new(f64::NAN, 10.0, 1.0, 1.0), 5);
        assert_eq!(result, Err(CoordError::NonFinite));
    }

    #[test]
    fn test_zoom_above_max_rejected() {
        let result = tiles_for(&square(0.0, 0.0, 1.0), MAX_ZOOM + 1);
        assert_eq!(result, Err(CoordError::InvalidZoom(MAX_ZOOM + 1)));
    }

    #[test]
    fn test_center_out_of_range_rejected() {
        assert!(matches!(
            tiles_for(&square(91.0, 0.0, 1.0), 2),
            Err(CoordError::InvalidLatitude(_))
        ));
        assert!(matches!(
            tiles_for(&square(0.0, -181.0, 1.0), 2),
            Err(CoordError::InvalidLongitude(_))
        ));
    }

    #[test]
    fn test_inverted_zoom_range_rejected() {
        let result = tiles_for_zoom_range(&square(0.0, 0.0, 1.0), 5, 4);
        assert_eq!(result, Err(CoordError::InvalidZoomRange { min: 5, max: 4 }));
    }

    #[test]
    fn test_checked_tile_count_limit() {
        let region = square(0.0, 0.0, 20.0);
        assert_eq!(checked_tile_count(&region, 0, 1, 10), Ok(5));
        assert_eq!(
            checked_tile_count(&region, 0, 1, 4),
            Err(CoordError::TooManyTiles { count: 5, max: 4 })
        );
    }

    #[test]
    fn test_range_iterator_visits_every_tile_once() {
        let range = TileRange {
            zoom: 5,
            x_min: 3,
            x_max: 5,
            y_min: 10,
            y_max: 11,
        };
        let tiles: Vec<_> = range.iter().collect();
        assert_eq!(tiles.len() as u64, range.len());
        let unique: std::collections::HashSet<_> = tiles.iter().collect();
        assert_eq!(unique.len(), tiles.len());
        assert!(tiles.iter().all(|t| range.contains(t)));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_valid_region_is_non_empty_and_in_bounds(
                lat in -80.0..80.0_f64,
                lon in -179.0..179.0_f64,
                delta in 0.001..5.0_f64,
                zoom in 0u8..=MAX_ZOOM
            ) {
                let range = tiles_for(&square(lat, lon, delta), zoom)?;
                let n = 2u64.pow(zoom as u32);

                prop_assert!(range.x_min <= range.x_max);
                prop_assert!(range.y_min <= range.y_max);
                prop_assert!(u64::from(range.x_max) < n);
                prop_assert!(u64::from(range.y_max) < n);
                prop_assert!(range.len() >= 1);
            }

            #[test]
            fn test_deterministic(
                lat in -80.0..80.0_f64,
                lon in -179.0..179.0_f64,
                delta in 0.001..5.0_f64,
                zoom in 0u8..=18
            ) {
                let region = square(lat, lon, delta);
                prop_assert_eq!(tiles_for(&region, zoom)?, tiles_for(&region, zoom)?);
            }

            #[test]
            fn test_zoom_zero_always_origin(
                lat in -90.0..90.0_f64,
                lon in -180.0..180.0_f64,
                delta in 0.001..50.0_f64
            ) {
                let range = tiles_for(&square(lat, lon, delta), 0)?;
                prop_assert_eq!(range.iter().collect::<Vec<_>>(), vec![TileCoord::new(0, 0, 0)]);
            }

            #[test]
            fn test_deeper_zoom_never_covers_fewer_tiles(
                lat in -80.0..80.0_f64,
                lon in -179.0..179.0_f64,
                delta in 0.001..5.0_f64,
                zoom in 0u8..18
            ) {
                let region = square(lat, lon, delta);
                let shallow = tiles_for(&region, zoom)?;
                let deep = tiles_for(&region, zoom + 1)?;
                prop_assert!(deep.len() >= shallow.len());
            }
        }
    }
}
