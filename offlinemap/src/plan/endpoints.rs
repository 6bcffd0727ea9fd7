//! URL construction for map resources.

use crate::coord::TileCoord;
use crate::job::ImageQuality;

/// Default tile server base URL.
pub const DEFAULT_BASE_URL: &str = "https://a.tiles.mapbox.com/v3/";

/// Name of the marker feature collection served for each map.
pub const MARKER_DATA_NAME: &str = "markers.geojson";

/// Suffix requesting double-resolution images.
const RETINA_SUFFIX: &str = "@2x";

/// Fixed naming scheme of the map server.
///
/// All methods are pure string formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
    retina: bool,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Endpoints {
    /// Creates endpoints under `base_url`, requesting retina images.
    ///
    /// A trailing slash is appended when missing.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            retina: true,
        }
    }

    /// Enables or disables the `@2x` suffix on tiles and icons.
    pub fn with_retina(mut self, retina: bool) -> Self {
        self.retina = retina;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retina(&self) -> bool {
        self.retina
    }

    fn scale_suffix(&self) -> &'static str {
        if self.retina {
            RETINA_SUFFIX
        } else {
            ""
        }
    }

    /// TileJSON metadata of a map.
    pub fn metadata_url(&self, map_id: &str) -> String {
        format!("{}{}.json?secure", self.base_url, map_id)
    }

    /// Marker feature collection of a map.
    pub fn marker_data_url(&self, map_id: &str) -> String {
        format!("{}{}/{}", self.base_url, map_id, MARKER_DATA_NAME)
    }

    /// Raster tile of a map.
    pub fn tile_url(&self, map_id: &str, tile: TileCoord, quality: ImageQuality) -> String {
        format!(
            "{}{}/{}/{}/{}{}.{}",
            self.base_url,
            map_id,
            tile.zoom,
            tile.x,
            tile.y,
            self.scale_suffix(),
            quality.extension()
        )
    }

    /// Marker pin icon for a simplestyle size, symbol and color.
    ///
    /// Returns `None` when any of the three values is empty. Only the first
    /// letter of the size is used (`small` → `s`) and a leading `#` on the
    /// color is dropped.
    pub fn marker_icon_url(&self, size: &str, symbol: &str, color: &str) -> Option<String> {
        let size = size.trim().chars().next()?.to_ascii_lowercase();
        let symbol = symbol.trim();
        let color = color.trim().trim_start_matches('#');
        if symbol.is_empty() || color.is_empty() {
            return None;
        }

        Some(format!(
            "{}marker/pin-{}-{}+{}{}.png",
            self.base_url,
            size,
            symbol,
            color,
            self.scale_suffix()
        ))
    }
}
