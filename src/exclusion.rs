//! Exclusion zones and the filter which keeps asset footprints out of them.
use crate::geometry::{polygon_distance, polygon_line_distance};
use crate::id::{ZoneID, define_id_getter};
use crate::site::{Site, SiteData};
use anyhow::{Result, ensure};
use geo::{Contains, EuclideanDistance, Intersects, Point, Polygon};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};

/// The kind of no-build area a zone represents
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, SerializeLabeledStringEnum, DeserializeLabeledStringEnum,
)]
pub enum ZoneType {
    /// Wetland, subject to wetland buffer rules
    #[string = "wetland"]
    Wetland,
    /// An explicit setback area (e.g. from a road or neighbouring dwelling)
    #[string = "setback"]
    Setback,
    /// Flood-prone land
    #[string = "floodplain"]
    Floodplain,
    /// Protected habitat
    #[string = "habitat"]
    Habitat,
    /// Cultural or heritage site
    #[string = "cultural"]
    Cultural,
    /// Any other user-drawn zone
    #[string = "custom"]
    Custom,
}

/// A no-build area on a site
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionZone {
    /// Unique identifier for the zone
    pub id: ZoneID,
    /// What kind of zone this is
    pub zone_type: ZoneType,
    /// Zone outline in local metres
    pub geometry: Polygon,
    /// The zone extends this far outward from its outline
    pub buffer_m: f64,
    /// Display label
    pub label: String,
    /// Display colour (e.g. `#2a9d8f`)
    pub color: String,
}
define_id_getter! {ExclusionZone, ZoneID}

impl ExclusionZone {
    /// Check the zone definition is valid
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.buffer_m.is_finite() && self.buffer_m >= 0.0,
            "Buffer for zone {} must be a finite, non-negative number",
            self.id
        );
        ensure!(
            self.geometry.exterior().0.len() >= 4,
            "Zone {} must have at least three vertices",
            self.id
        );

        Ok(())
    }

    /// Distance from a polygon to the zone outline (zero when they overlap)
    pub fn distance_to(&self, polygon: &Polygon) -> f64 {
        polygon_distance(&self.geometry, polygon)
    }

    /// Whether a polygon intersects the zone's buffered geometry
    pub fn excludes(&self, polygon: &Polygon) -> bool {
        self.geometry.intersects(polygon) || self.distance_to(polygon) < self.buffer_m
    }

    /// Whether a point lies inside the zone's buffered geometry
    pub fn excludes_point(&self, point: Point) -> bool {
        self.geometry.contains(&point)
            || point.euclidean_distance(self.geometry.exterior()) < self.buffer_m
    }
}

/// Why a footprint was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum Exclusion {
    /// Not entirely inside the site boundary
    OutsideBoundary,
    /// Closer to the site boundary than the setback distance
    BoundarySetback,
    /// Inside a zone's buffered geometry
    Zone(ZoneID),
}

/// Rejects footprints which leave the site, violate the boundary setback or touch a buffered zone
#[derive(Debug, Clone)]
pub struct ExclusionFilter<'a> {
    site: &'a Site,
    zones: &'a [ExclusionZone],
    setback_m: f64,
}

impl<'a> ExclusionFilter<'a> {
    /// Create a filter for a site, applying the given setback from the site boundary
    pub fn new(site_data: &'a SiteData, setback_m: f64) -> Self {
        Self {
            site: &site_data.site,
            zones: &site_data.zones,
            setback_m: setback_m.max(0.0),
        }
    }

    /// The boundary setback applied by this filter
    pub fn setback_m(&self) -> f64 {
        self.setback_m
    }

    /// Check a footprint against the boundary, setback and zones
    pub fn check(&self, footprint: &Polygon) -> Result<(), Exclusion> {
        if !self.site.boundary.contains(footprint) {
            return Err(Exclusion::OutsideBoundary);
        }

        if self.setback_m > 0.0
            && polygon_line_distance(footprint, self.site.boundary.exterior()) < self.setback_m
        {
            return Err(Exclusion::BoundarySetback);
        }

        if let Some(zone) = self.zones.iter().find(|zone| zone.excludes(footprint)) {
            return Err(Exclusion::Zone(zone.id.clone()));
        }

        Ok(())
    }

    /// Whether a single point is excluded (outside the site or inside a buffered zone).
    ///
    /// Used as the cheap pass/fail term of the terrain suitability score.
    pub fn is_point_excluded(&self, point: Point) -> bool {
        !self.site.boundary.contains(&point) || self.zones.iter().any(|z| z.excludes_point(point))
    }
}
