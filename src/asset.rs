//! Asset types and placed assets.
use crate::earthwork::Earthwork;
use crate::geometry::Footprint;
use crate::id::{AssetID, define_id_getter};
use crate::units::Kilowatts;
use anyhow::{Result, ensure};
use geo::{Point, Polygon};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// The kinds of infrastructure asset which can be placed on a site
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// A block of solar panels
    Solar,
    /// A battery storage container
    Battery,
    /// A generator set
    Generator,
    /// The site substation. Carries no capacity of its own.
    Substation,
    /// A wind turbine
    WindTurbine,
}

/// Physical and siting characteristics of an asset type
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetTypeSpec {
    /// The kind of asset described
    pub kind: AssetKind,
    /// Smallest capacity of a single asset
    pub min_capacity_kw: Kilowatts,
    /// Largest capacity of a single asset
    pub max_capacity_kw: Kilowatts,
    /// Footprint extent along its long axis
    pub length_m: f64,
    /// Footprint extent across its long axis
    pub width_m: f64,
    /// Steepest ground the asset can be built on
    pub max_slope_deg: f64,
    /// Preferred facing of the ground (e.g. 180 for south-facing solar), if any
    #[serde(default)]
    pub preferred_aspect_deg: Option<f64>,
    /// Minimum footprint gap to another asset of the same kind
    pub same_type_spacing_m: f64,
    /// Minimum footprint gap to an asset of a different kind
    pub cross_type_spacing_m: f64,
}

impl AssetTypeSpec {
    /// Check that the asset type's values are consistent
    pub fn validate(&self) -> Result<()> {
        let kind = self.kind;
        ensure!(
            self.min_capacity_kw.value() >= 0.0
                && self.min_capacity_kw <= self.max_capacity_kw
                && self.max_capacity_kw.is_finite(),
            "Invalid capacity range for {kind}: {} to {}",
            self.min_capacity_kw,
            self.max_capacity_kw
        );
        ensure!(
            kind == AssetKind::Substation || self.max_capacity_kw.value() > 0.0,
            "Asset type {kind} must have a positive maximum capacity"
        );
        ensure!(
            self.length_m > 0.0 && self.width_m > 0.0,
            "Footprint of {kind} must have positive dimensions"
        );
        ensure!(
            self.max_slope_deg > 0.0 && self.max_slope_deg < 90.0,
            "Maximum slope for {kind} must be between 0 and 90 degrees"
        );
        ensure!(
            self.same_type_spacing_m >= 0.0 && self.cross_type_spacing_m >= 0.0,
            "Spacings for {kind} must be non-negative"
        );

        Ok(())
    }

    /// Whether this type contributes towards the capacity target
    pub fn has_capacity(&self) -> bool {
        self.max_capacity_kw.value() > 0.0
    }

    /// Footprint of this type at a location
    pub fn footprint(&self, center: Point, bearing_deg: f64) -> Footprint {
        Footprint::new(center, self.length_m, self.width_m, bearing_deg)
    }
}

/// Minimum footprint gap between assets of two types
pub fn required_spacing(a: &AssetTypeSpec, b: &AssetTypeSpec) -> f64 {
    if a.kind == b.kind {
        a.same_type_spacing_m
    } else {
        a.cross_type_spacing_m.max(b.cross_type_spacing_m)
    }
}

/// The set of asset types available for placement
#[derive(Debug, Clone, PartialEq)]
pub struct AssetCatalogue(IndexMap<AssetKind, AssetTypeSpec>);

impl AssetCatalogue {
    /// Build a catalogue from a list of specs, checking each and rejecting duplicates
    pub fn from_specs<I>(specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = AssetTypeSpec>,
    {
        let mut map = IndexMap::new();
        for spec in specs {
            spec.validate()?;
            let kind = spec.kind;
            ensure!(
                map.insert(kind, spec).is_none(),
                "Asset type {kind} defined more than once"
            );
        }
        ensure!(!map.is_empty(), "Asset catalogue is empty");

        Ok(Self(map))
    }

    /// Get the spec for a kind
    pub fn get(&self, kind: AssetKind) -> Option<&AssetTypeSpec> {
        self.0.get(&kind)
    }

    /// Iterate over the specs in the catalogue
    pub fn iter(&self) -> impl Iterator<Item = &AssetTypeSpec> {
        self.0.values()
    }
}

impl Default for AssetCatalogue {
    fn default() -> Self {
        let specs = AssetKind::iter().map(|kind| {
            let (min, max, length, width, slope, aspect, same, cross) = match kind {
                AssetKind::Solar => (50.0, 250.0, 60.0, 30.0, 15.0, Some(180.0), 5.0, 10.0),
                AssetKind::Battery => (100.0, 500.0, 15.0, 5.0, 5.0, None, 3.0, 10.0),
                AssetKind::Generator => (250.0, 1000.0, 12.0, 4.0, 5.0, None, 5.0, 15.0),
                AssetKind::Substation => (0.0, 0.0, 30.0, 25.0, 3.0, None, 10.0, 15.0),
                AssetKind::WindTurbine => (1500.0, 3000.0, 20.0, 20.0, 10.0, None, 250.0, 50.0),
            };
            (
                kind,
                AssetTypeSpec {
                    kind,
                    min_capacity_kw: Kilowatts(min),
                    max_capacity_kw: Kilowatts(max),
                    length_m: length,
                    width_m: width,
                    max_slope_deg: slope,
                    preferred_aspect_deg: aspect,
                    same_type_spacing_m: same,
                    cross_type_spacing_m: cross,
                },
            )
        });

        Self(specs.collect())
    }
}

/// An asset placed on a site
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// Unique identifier within the layout, e.g. `solar-003`
    pub id: AssetID,
    /// The kind of asset
    pub kind: AssetKind,
    /// Rotated rectangle occupied by the asset
    pub footprint: Footprint,
    /// The footprint as a polygon in local metres
    pub polygon: Polygon,
    /// Rated capacity of this asset
    pub capacity: Kilowatts,
    /// Terrain elevation at the asset centre
    pub elevation_m: f64,
    /// Mean terrain slope under the footprint
    pub slope_deg: f64,
    /// Terrain aspect at the asset centre, `None` if flat
    pub aspect_deg: Option<f64>,
    /// Suitability score of the chosen location
    pub suitability: f64,
    /// Whether the location is a poor fit for the asset type
    pub low_suitability: bool,
    /// Design elevation of the graded pad
    pub pad_elevation_m: f64,
    /// Cut and fill needed to grade the pad
    pub earthwork: Earthwork,
}
define_id_getter! {Asset, AssetID}

impl Asset {
    /// Position of the asset centre in local metres
    pub fn position(&self) -> Point {
        self.footprint.center
    }

    /// Rotation of the footprint's long axis as a compass bearing
    pub fn rotation_deg(&self) -> f64 {
        self.footprint.bearing_deg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use std::str::FromStr;

    #[test]
    fn test_kind_strings() {
        assert_eq!(AssetKind::WindTurbine.to_string(), "wind_turbine");
        assert_eq!(AssetKind::from_str("battery").unwrap(), AssetKind::Battery);
        assert!(AssetKind::from_str("nuclear").is_err());
    }

    #[test]
    fn test_default_catalogue() {
        let catalogue = AssetCatalogue::default();
        assert_eq!(catalogue.iter().count(), 5);
        for spec in catalogue.iter() {
            spec.validate().unwrap();
        }
        assert!(!catalogue.get(AssetKind::Substation).unwrap().has_capacity());
    }

    #[test]
    fn test_required_spacing() {
        let catalogue = AssetCatalogue::default();
        let solar = catalogue.get(AssetKind::Solar).unwrap();
        let battery = catalogue.get(AssetKind::Battery).unwrap();
        let generator = catalogue.get(AssetKind::Generator).unwrap();
        assert_eq!(required_spacing(solar, solar), 5.0);
        assert_eq!(required_spacing(solar, battery), 10.0);
        assert_eq!(required_spacing(battery, generator), 15.0);
    }

    #[test]
    fn test_duplicate_kind() {
        let catalogue = AssetCatalogue::default();
        let solar = catalogue.get(AssetKind::Solar).unwrap().clone();
        assert_error!(
            AssetCatalogue::from_specs([solar.clone(), solar]),
            "Asset type solar defined more than once"
        );
    }

    #[test]
    fn test_invalid_capacity_range() {
        let mut spec = AssetCatalogue::default()
            .get(AssetKind::Battery)
            .unwrap()
            .clone();
        spec.min_capacity_kw = Kilowatts(600.0);
        assert!(spec.validate().is_err());
    }
}
