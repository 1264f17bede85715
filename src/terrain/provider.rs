//! Sources of elevation data.
use super::ElevationGrid;
use crate::error::EngineError;
use crate::geometry::LocalProjection;
use crate::id::SiteID;
use geo::{Coord, Rect};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// A request for elevation data covering part of a site
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationRequest {
    /// The site the data is for
    pub site_id: SiteID,
    /// Area to cover, in local metres
    pub bounds: Rect,
    /// Projection between local metres and lon/lat, for providers backed by geographic data
    pub projection: LocalProjection,
    /// Requested cell size in metres
    pub cell_size_m: f64,
}

/// Something which can supply an elevation grid for a site.
///
/// Implementations must be usable from several generation workers at once.
pub trait ElevationProvider: Send + Sync {
    /// Fetch a grid covering the requested bounds
    fn fetch_elevation(&self, request: &ElevationRequest) -> Result<ElevationGrid, EngineError>;

    /// A short name for log messages
    fn name(&self) -> &str;
}

/// A Gaussian hill (or hollow, if the height is negative) on synthetic terrain
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Hill {
    /// Easting of the summit in local metres
    pub x_m: f64,
    /// Northing of the summit in local metres
    pub y_m: f64,
    /// Height of the summit above the surrounding plane
    pub height_m: f64,
    /// Horizontal scale of the hill
    pub radius_m: f64,
}

impl Hill {
    fn height_at(&self, c: Coord) -> f64 {
        let d2 = (c.x - self.x_m).powi(2) + (c.y - self.y_m).powi(2);
        self.height_m * (-d2 / (2.0 * self.radius_m * self.radius_m)).exp()
    }
}

/// Generates terrain from an inclined plane plus a set of hills.
///
/// Deterministic, so it is used for demos, tests and offline runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SyntheticElevationProvider {
    /// Elevation at the local origin
    #[serde(default)]
    pub base_elevation_m: f64,
    /// Rise towards the east, in percent
    #[serde(default)]
    pub gradient_east_pct: f64,
    /// Rise towards the north, in percent
    #[serde(default)]
    pub gradient_north_pct: f64,
    /// Hills added to the plane
    #[serde(default, rename = "hill")]
    pub hills: Vec<Hill>,
}

impl SyntheticElevationProvider {
    /// A flat plane at the given elevation
    pub fn flat(elevation_m: f64) -> Self {
        Self {
            base_elevation_m: elevation_m,
            gradient_east_pct: 0.0,
            gradient_north_pct: 0.0,
            hills: Vec::new(),
        }
    }

    /// An inclined plane
    pub fn inclined(elevation_m: f64, gradient_east_pct: f64, gradient_north_pct: f64) -> Self {
        Self {
            base_elevation_m: elevation_m,
            gradient_east_pct,
            gradient_north_pct,
            hills: Vec::new(),
        }
    }

    /// Elevation at a local coordinate
    pub fn elevation_at(&self, c: Coord) -> f64 {
        self.base_elevation_m
            + c.x * self.gradient_east_pct / 100.0
            + c.y * self.gradient_north_pct / 100.0
            + self.hills.iter().map(|h| h.height_at(c)).sum::<f64>()
    }
}

impl ElevationProvider for SyntheticElevationProvider {
    fn fetch_elevation(&self, request: &ElevationRequest) -> Result<ElevationGrid, EngineError> {
        Ok(ElevationGrid::from_fn(
            request.bounds,
            request.cell_size_m,
            |c| self.elevation_at(c),
        ))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Serves pre-loaded grids (e.g. read from raster files) keyed by site
#[derive(Debug, Default)]
pub struct InMemoryElevationProvider {
    grids: RwLock<HashMap<SiteID, ElevationGrid>>,
}

impl InMemoryElevationProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the grid for a site
    pub fn insert(&self, site_id: SiteID, grid: ElevationGrid) {
        self.grids
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(site_id, grid);
    }
}

impl ElevationProvider for InMemoryElevationProvider {
    fn fetch_elevation(&self, request: &ElevationRequest) -> Result<ElevationGrid, EngineError> {
        let grids = self
            .grids
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        grids.get(&request.site_id).cloned().ok_or_else(|| {
            EngineError::terrain_unavailable(&request.site_id, "no elevation data loaded")
        })
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

/// A provider with no data, e.g. when the elevation service is offline
#[derive(Debug, Clone, Default)]
pub struct UnavailableElevationProvider {
    /// Reported as the failure reason
    pub reason: String,
}

impl ElevationProvider for UnavailableElevationProvider {
    fn fetch_elevation(&self, request: &ElevationRequest) -> Result<ElevationGrid, EngineError> {
        let reason = if self.reason.is_empty() {
            "elevation service unavailable"
        } else {
            &self.reason
        };
        Err(EngineError::terrain_unavailable(&request.site_id, reason))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Wraps another provider, logging each request and its outcome
pub struct LoggingElevationProvider {
    inner: Box<dyn ElevationProvider>,
}

impl LoggingElevationProvider {
    /// Wrap a provider
    pub fn new(inner: Box<dyn ElevationProvider>) -> Self {
        Self { inner }
    }
}

impl ElevationProvider for LoggingElevationProvider {
    fn fetch_elevation(&self, request: &ElevationRequest) -> Result<ElevationGrid, EngineError> {
        debug!(
            "Requesting elevation for site {} from {} provider ({:.0} x {:.0} m at {} m)",
            request.site_id,
            self.inner.name(),
            request.bounds.width(),
            request.bounds.height(),
            request.cell_size_m
        );
        let result = self.inner.fetch_elevation(request);
        match &result {
            Ok(grid) => debug!(
                "Received {}x{} elevation grid for site {}",
                grid.n_cols, grid.n_rows, request.site_id
            ),
            Err(err) => warn!("{err}"),
        }

        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
