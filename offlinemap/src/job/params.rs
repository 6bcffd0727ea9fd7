//! Job identity and parameters.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coord::{checked_tile_count, CoordError, CoordinateRegion};

/// Unique identifier of a download job and of the package it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random job ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Raster image quality of downloaded tiles.
///
/// Each variant selects the filename extension requested from the tile
/// server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Full,
    Png32,
    Png64,
    Png128,
    Png256,
    Jpeg70,
    Jpeg80,
    Jpeg90,
}

impl ImageQuality {
    /// All qualities in declaration order.
    pub const ALL: [ImageQuality; 8] = [
        ImageQuality::Full,
        ImageQuality::Png32,
        ImageQuality::Png64,
        ImageQuality::Png128,
        ImageQuality::Png256,
        ImageQuality::Jpeg70,
        ImageQuality::Jpeg80,
        ImageQuality::Jpeg90,
    ];

    /// Filename extension used in tile URLs.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageQuality::Full => "png",
            ImageQuality::Png32 => "png32",
            ImageQuality::Png64 => "png64",
            ImageQuality::Png128 => "png128",
            ImageQuality::Png256 => "png256",
            ImageQuality::Jpeg70 => "jpg70",
            ImageQuality::Jpeg80 => "jpg80",
            ImageQuality::Jpeg90 => "jpg90",
        }
    }

    /// Numeric code stored in package manifests.
    pub fn code(&self) -> u8 {
        match self {
            ImageQuality::Full => 0,
            ImageQuality::Png32 => 1,
            ImageQuality::Png64 => 2,
            ImageQuality::Png128 => 3,
            ImageQuality::Png256 => 4,
            ImageQuality::Jpeg70 => 5,
            ImageQuality::Jpeg80 => 6,
            ImageQuality::Jpeg90 => 7,
        }
    }
}

impl fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageQuality {
    type Err = String;

    /// Accepts either the URL extension (`jpg80`) or `full`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower == "full" {
            return Ok(ImageQuality::Full);
        }
        ImageQuality::ALL
            .into_iter()
            .find(|q| q.extension() == lower)
            .ok_or_else(|| format!("unknown image quality: {}", s))
    }
}

/// A client request for an offline map, before a job ID is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub map_id: String,
    pub region: CoordinateRegion,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub include_metadata: bool,
    pub include_markers: bool,
    pub image_quality: ImageQuality,
}

impl DownloadRequest {
    /// Creates a request with metadata and markers included at full quality.
    pub fn new(
        map_id: impl Into<String>,
        region: CoordinateRegion,
        min_zoom: u8,
        max_zoom: u8,
    ) -> Self {
        Self {
            map_id: map_id.into(),
            region,
            min_zoom,
            max_zoom,
            include_metadata: true,
            include_markers: true,
            image_quality: ImageQuality::Full,
        }
    }

    pub fn with_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    pub fn with_markers(mut self, include: bool) -> Self {
        self.include_markers = include;
        self
    }

    pub fn with_image_quality(mut self, quality: ImageQuality) -> Self {
        self.image_quality = quality;
        self
    }

    /// Checks the region and zoom range, returning the planned tile count.
    pub fn validate(&self, max_tiles: u64) -> Result<u64, CoordError> {
        checked_tile_count(&self.region, self.min_zoom, self.max_zoom, max_tiles)
    }

    /// Freezes the request into job parameters under `id`.
    pub fn into_parameters(self, id: JobId) -> JobParameters {
        JobParameters {
            id,
            map_id: self.map_id,
            include_metadata: self.include_metadata,
            include_markers: self.include_markers,
            image_quality: self.image_quality,
            region: self.region,
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
        }
    }
}

/// Immutable parameters of a running job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
    pub id: JobId,
    pub map_id: String,
    pub include_metadata: bool,
    pub include_markers: bool,
    pub image_quality: ImageQuality,
    pub region: CoordinateRegion,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl JobParameters {
    /// Key/value description of the job persisted alongside its package.
    pub fn manifest(&self) -> JobManifest {
        let yes_no = |flag: bool| if flag { "YES" } else { "NO" }.to_string();

        let mut entries = BTreeMap::new();
        entries.insert("uniqueID".to_string(), self.id.to_string());
        entries.insert("mapID".to_string(), self.map_id.clone());
        entries.insert("includesMetadata".to_string(), yes_no(self.include_metadata));
        entries.insert("includesMarkers".to_string(), yes_no(self.include_markers));
        entries.insert(
            "imageQuality".to_string(),
            self.image_quality.code().to_string(),
        );
        entries.insert(
            "region_latitude".to_string(),
            format!("{:.8}", self.region.center.lat),
        );
        entries.insert(
            "region_longitude".to_string(),
            format!("{:.8}", self.region.center.lon),
        );
        entries.insert(
            "region_latitude_delta".to_string(),
            format!("{:.8}", self.region.span.lat_delta),
        );
        entries.insert(
            "region_longitude_delta".to_string(),
            format!("{:.8}", self.region.span.lon_delta),
        );
        entries.insert("minimumZ".to_string(), self.min_zoom.to_string());
        entries.insert("maximumZ".to_string(), self.max_zoom.to_string());

        JobManifest {
            job_id: self.id,
            map_id: self.map_id.clone(),
            entries,
        }
    }
}

/// Metadata written with a package when it is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobManifest {
    pub job_id: JobId,
    pub map_id: String,
    pub entries: BTreeMap<String, String>,
}

impl JobManifest {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}
