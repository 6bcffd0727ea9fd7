//! Coordinate types and errors

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum supported zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum supported zoom level.
pub const MAX_ZOOM: u8 = 22;

/// Northern limit of the Web Mercator projection in degrees.
pub const MAX_LAT: f64 = 85.05112878;

/// Southern limit of the Web Mercator projection in degrees.
pub const MIN_LAT: f64 = -85.05112878;

/// Western longitude limit in degrees.
pub const MIN_LON: f64 = -180.0;

/// Eastern longitude limit in degrees.
pub const MAX_LON: f64 = 180.0;

/// Errors raised for regions and zoom levels that cannot be tiled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// A coordinate or span was NaN or infinite.
    #[error("region contains a non-finite value")]
    NonFinite,

    /// Latitude or longitude span was zero or negative.
    #[error("region span must be positive (lat {lat_span}, lon {lon_span})")]
    InvalidSpan { lat_span: f64, lon_span: f64 },

    /// Center latitude outside [-90, 90].
    #[error("invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Center longitude outside [-180, 180].
    #[error("invalid longitude: {0}")]
    InvalidLongitude(f64),

    /// Zoom level above [`MAX_ZOOM`].
    #[error("invalid zoom level: {0} (max {MAX_ZOOM})")]
    InvalidZoom(u8),

    /// Minimum zoom greater than maximum zoom.
    #[error("invalid zoom range: {min}..={max}")]
    InvalidZoomRange { min: u8, max: u8 },

    /// The region would plan more tiles than allowed.
    #[error("region covers {count} tiles (limit {max})")]
    TooManyTiles { count: u64, max: u64 },
}

/// A tile address under the Web Mercator XYZ scheme.
///
/// `x` grows west to east, `y` grows north to south.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// A geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Latitude and longitude extent of a region in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub lat_delta: f64,
    pub lon_delta: f64,
}

/// A rectangular geographic region expressed as a center and a span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRegion {
    pub center: LatLon,
    pub span: Span,
}

/// Edges of a region, already clamped to the Web Mercator domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl CoordinateRegion {
    /// Creates a region from its center and span.
    pub fn new(center_lat: f64, center_lon: f64, lat_delta: f64, lon_delta: f64) -> Self {
        Self {
            center: LatLon {
                lat: center_lat,
                lon: center_lon,
            },
            span: Span {
                lat_delta,
                lon_delta,
            },
        }
    }

    /// Checks that the region can be tiled.
    pub fn validate(&self) -> Result<(), CoordError> {
        let values = [
            self.center.lat,
            self.center.lon,
            self.span.lat_delta,
            self.span.lon_delta,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CoordError::NonFinite);
        }
        if self.span.lat_delta <= 0.0 || self.span.lon_delta <= 0.0 {
            return Err(CoordError::InvalidSpan {
                lat_span: self.span.lat_delta,
                lon_span: self.span.lon_delta,
            });
        }
        if !(-90.0..=90.0).contains(&self.center.lat) {
            return Err(CoordError::InvalidLatitude(self.center.lat));
        }
        if !(MIN_LON..=MAX_LON).contains(&self.center.lon) {
            return Err(CoordError::InvalidLongitude(self.center.lon));
        }
        Ok(())
    }

    /// Returns the region edges clamped to the Web Mercator domain.
    pub fn bounds(&self) -> Bounds {
        let min_lat = self.center.lat - self.span.lat_delta / 2.0;
        let max_lat = min_lat + self.span.lat_delta;
        let min_lon = self.center.lon - self.span.lon_delta / 2.0;
        let max_lon = min_lon + self.span.lon_delta;

        Bounds {
            min_lat: min_lat.clamp(MIN_LAT, MAX_LAT),
            max_lat: max_lat.clamp(MIN_LAT, MAX_LAT),
            min_lon: min_lon.clamp(MIN_LON, MAX_LON),
            max_lon: max_lon.clamp(MIN_LON, MAX_LON),
        }
    }
}

/// Inclusive rectangle of tiles at a single zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl TileRange {
    /// Number of tiles in the rectangle.
    pub fn len(&self) -> u64 {
        let width = u64::from(self.x_max - self.x_min) + 1;
        let height = u64::from(self.y_max - self.y_min) + 1;
        width * height
    }

    /// A range always holds at least one tile.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the tile lies inside this range.
    pub fn contains(&self, tile: &TileCoord) -> bool {
        tile.zoom == self.zoom
            && (self.x_min..=self.x_max).contains(&tile.x)
            && (self.y_min..=self.y_max).contains(&tile.y)
    }

    /// Iterates tiles column by column (x outer, y inner).
    pub fn iter(&self) -> TileRangeIter {
        TileRangeIter {
            range: *self,
            x: self.x_min,
            y: self.y_min,
            done: false,
        }
    }
}

impl IntoIterator for TileRange {
    type Item = TileCoord;
    type IntoIter = TileRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the tiles of a [`TileRange`].
#[derive(Debug, Clone)]
pub struct TileRangeIter {
    range: TileRange,
    x: u32,
    y: u32,
    done: bool,
}

impl Iterator for TileRangeIter {
    type Item = TileCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let tile = TileCoord::new(self.range.zoom, self.x, self.y);

        if self.y < self.range.y_max {
            self.y += 1;
        } else if self.x < self.range.x_max {
            self.x += 1;
            self.y = self.range.y_min;
        } else {
            self.done = true;
        }

        Some(tile)
    }
}
