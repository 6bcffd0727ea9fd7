//! Marker icon discovery.
//!
//! Marker data is a GeoJSON feature collection styled with the simplestyle
//! properties `marker-size`, `marker-color` and `marker-symbol`. Every styled
//! point needs its pin icon in the offline package.
//!
//! Errors are two-tier: a document that is not a feature collection fails as
//! a whole, while a malformed individual feature is skipped.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::plan::Endpoints;

/// Marker data could not be read as a feature collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerError {
    /// The bytes are not valid JSON.
    #[error("marker data is not valid JSON: {0}")]
    InvalidJson(String),

    /// The document is JSON but not a feature collection.
    #[error("marker data is not a feature collection: {0}")]
    NotFeatureCollection(&'static str),
}

/// Extracts the distinct marker icon URLs referenced by point features.
pub fn resolve_icon_urls(
    data: &[u8],
    endpoints: &Endpoints,
) -> Result<BTreeSet<String>, MarkerError> {
    let document: Value =
        serde_json::from_slice(data).map_err(|e| MarkerError::InvalidJson(e.to_string()))?;

    let features = document
        .as_object()
        .ok_or(MarkerError::NotFeatureCollection("top level is not an object"))?
        .get("features")
        .ok_or(MarkerError::NotFeatureCollection("missing features"))?
        .as_array()
        .ok_or(MarkerError::NotFeatureCollection("features is not an array"))?;

    let mut urls = BTreeSet::new();
    let mut skipped = 0usize;

    for feature in features {
        match point_icon_url(feature, endpoints) {
            Some(url) => {
                urls.insert(url);
            }
            None => skipped += 1,
        }
    }

    debug!(
        features = features.len(),
        icons = urls.len(),
        skipped,
        "Resolved marker icons"
    );

    Ok(urls)
}

/// Icon URL of a single styled point feature, or `None` to skip it.
fn point_icon_url(feature: &Value, endpoints: &Endpoints) -> Option<String> {
    let feature = feature.as_object()?;

    let geometry_type = feature.get("geometry")?.get("type")?.as_str()?;
    if geometry_type != "Point" {
        return None;
    }

    let properties = feature.get("properties")?.as_object()?;
    let size = non_empty(properties, "marker-size")?;
    let color = non_empty(properties, "marker-color")?;
    let symbol = non_empty(properties, "marker-symbol")?;

    endpoints.marker_icon_url(size, symbol, color)
}

fn non_empty<'a>(properties: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    properties
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoints() -> Endpoints {
        Endpoints::new("http://tiles.local/v3/")
    }

    fn point(size: &str, color: &str, symbol: &str) -> Value {
        json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [-77.03, 38.89] },
            "properties": {
                "marker-size": size,
                "marker-color": color,
                "marker-symbol": symbol
            }
        })
    }

    fn collection(features: Vec<Value>) -> Vec<u8> {
        serde_json::to_vec(&json!({ "type": "FeatureCollection", "features": features })).unwrap()
    }

    #[test]
    fn test_single_point_yields_one_icon() {
        let data = collection(vec![point("medium", "ff0000", "cafe")]);

        let urls = resolve_icon_urls(&data, &endpoints()).unwrap();

        assert_eq!(urls.len(), 1);
        assert!(urls.contains("http://tiles.local/v3/marker/pin-m-cafe+ff0000@2x.png"));
    }

    #[test]
    fn test_identical_points_dedup() {
        let data = collection(vec![
            point("medium", "ff0000", "cafe"),
            point("medium", "ff0000", "cafe"),
        ]);

        let urls = resolve_icon_urls(&data, &endpoints()).unwrap();

        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn test_distinct_styles_yield_distinct_icons() {
        let data = collection(vec![
            point("small", "00ff00", "bus"),
            point("large", "#0000ff", "rail"),
        ]);

        let urls = resolve_icon_urls(&data, &endpoints()).unwrap();

        assert_eq!(urls.len(), 2);
        assert!(urls.contains("http://tiles.local/v3/marker/pin-l-rail+0000ff@2x.png"));
    }

    #[test]
    fn test_line_string_only_is_empty_not_error() {
        let line = json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] },
            "properties": { "marker-size": "medium", "marker-color": "f00", "marker-symbol": "x" }
        });

        let urls = resolve_icon_urls(&collection(vec![line]), &endpoints()).unwrap();

        assert!(urls.is_empty());
    }

    #[test]
    fn test_malformed_features_are_skipped() {
        let data = collection(vec![
            json!("not a feature"),
            json!({ "type": "Feature", "properties": {} }),
            json!({ "type": "Feature", "geometry": { "type": "Point" } }),
            json!({ "type": "Feature", "geometry": { "type": 7 }, "properties": {} }),
            point("medium", "", "cafe"),
            point("medium", "ff0000", "   "),
            json!({
                "type": "Feature",
                "geometry": { "type": "Point" },
                "properties": { "marker-size": 3, "marker-color": "f00", "marker-symbol": "x" }
            }),
            point("small", "abcdef", "star"),
        ]);

        let urls = resolve_icon_urls(&data, &endpoints()).unwrap();

        assert_eq!(urls.len(), 1);
        assert!(urls.contains("http://tiles.local/v3/marker/pin-s-star+abcdef@2x.png"));
    }

    #[test]
    fn test_invalid_json_fails() {
        let result = resolve_icon_urls(b"{ not json", &endpoints());
        assert!(matches!(result, Err(MarkerError::InvalidJson(_))));
    }

    #[test]
    fn test_non_collection_documents_fail() {
        let docs: [&[u8]; 3] = [
            b"[]",
            b"{\"type\":\"FeatureCollection\"}",
            b"{\"features\":{}}",
        ];
        for doc in docs {
            let result = resolve_icon_urls(doc, &endpoints());
            assert!(
                matches!(result, Err(MarkerError::NotFeatureCollection(_))),
                "expected failure for {}",
                String::from_utf8_lossy(doc)
            );
        }
    }

    #[test]
    fn test_empty_collection() {
        let urls = resolve_icon_urls(&collection(vec![]), &endpoints()).unwrap();
        assert!(urls.is_empty());
    }
}
