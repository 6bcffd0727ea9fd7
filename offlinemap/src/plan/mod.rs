//! Resource planning for offline map jobs.
//!
//! A plan is built in two pure steps and then frozen:
//!
//! ```text
//! build_static_plan ──► ResourcePlan ──extend_icons──► ResourcePlan ──freeze──► FrozenPlan
//!   (metadata, markers,                (discovered marker                (fixed for the
//!    tiles per zoom)                    icon URLs)                        whole job)
//! ```
//!
//! The expected file count of a job is the length of its [`FrozenPlan`].

mod endpoints;

pub use endpoints::{Endpoints, DEFAULT_BASE_URL, MARKER_DATA_NAME};

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::coord::{tiles_for_zoom_range, CoordError};
use crate::job::JobParameters;

/// Role of a resource within a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Metadata,
    MarkerData,
    Tile,
    MarkerIcon,
}

impl ResourceKind {
    /// Metadata and marker data are required for a usable package.
    pub fn is_critical(&self) -> bool {
        matches!(self, ResourceKind::Metadata | ResourceKind::MarkerData)
    }
}

/// Mutable plan under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePlan {
    metadata: Option<String>,
    marker_data: Option<String>,
    tiles: Vec<String>,
    icons: BTreeSet<String>,
}

impl ResourcePlan {
    pub fn metadata_url(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    pub fn marker_data_url(&self) -> Option<&str> {
        self.marker_data.as_deref()
    }

    pub fn tile_urls(&self) -> &[String] {
        &self.tiles
    }

    pub fn icon_urls(&self) -> &BTreeSet<String> {
        &self.icons
    }

    /// Number of distinct URLs in the plan.
    pub fn len(&self) -> usize {
        self.metadata.iter().count()
            + self.marker_data.iter().count()
            + self.tiles.len()
            + self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `url` is already planned in any partition.
    pub fn contains(&self, url: &str) -> bool {
        self.metadata.as_deref() == Some(url)
            || self.marker_data.as_deref() == Some(url)
            || self.icons.contains(url)
            || self.tiles.iter().any(|t| t == url)
    }

    /// Adds discovered marker icon URLs, skipping any already planned.
    ///
    /// Returns the number of URLs actually added.
    pub fn extend_icons<I>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.icons.len();
        let tiles: HashSet<&str> = self.tiles.iter().map(String::as_str).collect();
        let fresh: Vec<String> = urls
            .into_iter()
            .filter(|url| {
                self.metadata.as_deref() != Some(url.as_str())
                    && self.marker_data.as_deref() != Some(url.as_str())
                    && !tiles.contains(url.as_str())
            })
            .collect();
        self.icons.extend(fresh);
        self.icons.len() - before
    }

    /// Drops the marker-data URL, for maps that turned out to have none.
    pub fn remove_marker_data(&mut self) -> Option<String> {
        self.marker_data.take()
    }

    /// Fixes the plan for downloading.
    pub fn freeze(self) -> FrozenPlan {
        let mut resources = Vec::with_capacity(self.len());
        if let Some(url) = self.metadata {
            resources.push(PlannedResource {
                url,
                kind: ResourceKind::Metadata,
            });
        }
        if let Some(url) = self.marker_data {
            resources.push(PlannedResource {
                url,
                kind: ResourceKind::MarkerData,
            });
        }
        resources.extend(self.tiles.into_iter().map(|url| PlannedResource {
            url,
            kind: ResourceKind::Tile,
        }));
        resources.extend(self.icons.into_iter().map(|url| PlannedResource {
            url,
            kind: ResourceKind::MarkerIcon,
        }));

        let index = resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.url.clone(), i))
            .collect();

        FrozenPlan { resources, index }
    }
}

/// One URL of a frozen plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedResource {
    pub url: String,
    pub kind: ResourceKind,
}

/// Immutable plan of a job; its length is the job's expected file count.
#[derive(Debug, Clone, Default)]
pub struct FrozenPlan {
    resources: Vec<PlannedResource>,
    index: HashMap<String, usize>,
}

impl FrozenPlan {
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn resources(&self) -> &[PlannedResource] {
        &self.resources
    }

    pub fn urls(&self) -> impl Iterator<Item = &String> {
        self.resources.iter().map(|r| &r.url)
    }

    pub fn kind_of(&self, url: &str) -> Option<ResourceKind> {
        self.index.get(url).map(|&i| self.resources[i].kind)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }
}

/// Builds the static part of a job's plan: metadata, marker data and tiles.
///
/// Marker icon URLs are added later from the fetched marker data.
pub fn build_static_plan(
    params: &JobParameters,
    endpoints: &Endpoints,
) -> Result<ResourcePlan, CoordError> {
    let ranges = tiles_for_zoom_range(&params.region, params.min_zoom, params.max_zoom)?;

    let metadata = params
        .include_metadata
        .then(|| endpoints.metadata_url(&params.map_id));
    let marker_data = params
        .include_markers
        .then(|| endpoints.marker_data_url(&params.map_id));

    let capacity = ranges.iter().map(|r| r.len() as usize).sum();
    let mut tiles = Vec::with_capacity(capacity);
    for range in ranges {
        tiles.extend(
            range
                .iter()
                .map(|tile| endpoints.tile_url(&params.map_id, tile, params.image_quality)),
        );
    }

    Ok(ResourcePlan {
        metadata,
        marker_data,
        tiles,
        icons: BTreeSet::new(),
    })
}
