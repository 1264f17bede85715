//! Post-hoc checking of a layout against jurisdiction siting rules.
//!
//! Evaluation is pure: the same layout and rules always give the same violations, in the same
//! order (by rule type, then by asset or road order within the layout).
use crate::exclusion::{ExclusionZone, ZoneType};
use crate::geometry::{polygon_distance, polygon_line_distance};
use crate::id::{AssetID, JurisdictionID, RoadID};
use crate::layout::Layout;
use crate::site::SiteData;
use geo::Intersects;
use itertools::Itertools;
use std::fmt::Display;

pub mod jurisdiction;
pub use jurisdiction::{DEFAULT_JURISDICTION, RuleBook, RuleSet};
pub mod rules;
pub use rules::{ComplianceRule, RuleOverride, RuleType, Severity};

/// The part of a layout a violation refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Entity {
    /// A placed asset
    Asset(AssetID),
    /// A road segment
    Road(RoadID),
}

impl Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Asset(id) => write!(f, "asset {id}"),
            Entity::Road(id) => write!(f, "road {id}"),
        }
    }
}

/// A breach of a compliance rule
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// The rule breached
    pub rule_type: RuleType,
    /// The jurisdiction whose rules were applied
    pub jurisdiction: JurisdictionID,
    /// What breached it
    pub entity: Entity,
    /// The measured value
    pub measured: f64,
    /// The rule's limit
    pub threshold: f64,
    /// How serious the breach is
    pub severity: Severity,
    /// Human-readable description
    pub message: String,
}

/// Collects violations for one rule
struct Checker<'a> {
    rule: &'a ComplianceRule,
    jurisdiction: &'a JurisdictionID,
    violations: Vec<Violation>,
}

impl Checker<'_> {
    fn report(&mut self, entity: Entity, measured: f64, threshold: f64, detail: &str) {
        let unit = self.rule.rule_type.unit();
        self.violations.push(Violation {
            rule_type: self.rule.rule_type,
            jurisdiction: self.jurisdiction.clone(),
            message: format!(
                "{entity} {detail}: {measured:.2}{unit} (limit {threshold:.2}{unit})"
            ),
            entity,
            measured,
            threshold,
            severity: self.rule.severity(),
        });
    }

    /// Report when the measured value exceeds the threshold
    fn check_max(&mut self, entity: Entity, measured: f64, detail: &str) {
        if measured > self.rule.threshold {
            self.report(entity, measured, self.rule.threshold, detail);
        }
    }

    /// Report when the measured value falls short of the threshold
    fn check_min(&mut self, entity: Entity, measured: f64, detail: &str) {
        if measured < self.rule.threshold {
            self.report(entity, measured, self.rule.threshold, detail);
        }
    }
}

/// Check a layout against a rule set
pub fn evaluate(layout: &Layout, site_data: &SiteData, rules: &RuleSet) -> Vec<Violation> {
    let boundary = site_data.site.boundary.exterior();
    let wetlands: Vec<_> = site_data
        .zones
        .iter()
        .filter(|z| z.zone_type == ZoneType::Wetland)
        .collect();

    let mut violations = Vec::new();
    for rule in rules.iter().filter(|r| r.enabled) {
        let mut checker = Checker {
            rule,
            jurisdiction: &rules.jurisdiction,
            violations: Vec::new(),
        };

        match rule.rule_type {
            RuleType::SlopeLimit => {
                for asset in &layout.assets {
                    let entity = Entity::Asset(asset.id.clone());
                    checker.check_max(entity, asset.slope_deg, "sits on steep ground");
                }
            }
            RuleType::Spacing => {
                for (i, j) in (0..layout.assets.len()).tuple_combinations() {
                    let (a, b) = (&layout.assets[i], &layout.assets[j]);
                    let gap = polygon_distance(&a.polygon, &b.polygon);
                    let detail = format!("is too close to {}", a.id);
                    checker.check_min(Entity::Asset(b.id.clone()), gap, &detail);
                }
            }
            RuleType::Setback => {
                for asset in &layout.assets {
                    let d = polygon_line_distance(&asset.polygon, boundary);
                    let entity = Entity::Asset(asset.id.clone());
                    checker.check_min(entity, d, "is too close to the site boundary");
                }
            }
            RuleType::RoadGrade => {
                for segment in &layout.roads.segments {
                    let entity = Entity::Road(segment.id.clone());
                    checker.check_max(entity, segment.max_grade_pct, "is too steep");
                }
            }
            RuleType::WetlandBuffer => {
                let to_assets = |z: &ExclusionZone| -> Vec<f64> {
                    layout
                        .assets
                        .iter()
                        .map(|a| z.distance_to(&a.polygon))
                        .collect()
                };
                if let Some(d) = nearest_wetland(&wetlands, to_assets) {
                    for (asset, d) in layout.assets.iter().zip(d) {
                        let entity = Entity::Asset(asset.id.clone());
                        checker.check_min(entity, d, "is too close to a wetland");
                    }
                }
                let to_roads = |z: &ExclusionZone| -> Vec<f64> {
                    layout
                        .roads
                        .segments
                        .iter()
                        .map(|s| polygon_line_distance(&z.geometry, &s.geometry))
                        .collect()
                };
                if let Some(d) = nearest_wetland(&wetlands, to_roads) {
                    for (segment, d) in layout.roads.segments.iter().zip(d) {
                        let entity = Entity::Road(segment.id.clone());
                        checker.check_min(entity, d, "is too close to a wetland");
                    }
                }
            }
            RuleType::ZoneBuffer => {
                for asset in &layout.assets {
                    for zone in &site_data.zones {
                        let d = zone.distance_to(&asset.polygon);
                        let limit = zone.buffer_m + rule.threshold;
                        if zone.geometry.intersects(&asset.polygon) || d < limit {
                            let detail = format!("lies within the buffer of zone {}", zone.id);
                            checker.report(Entity::Asset(asset.id.clone()), d, limit, &detail);
                        }
                    }
                }
            }
        }

        violations.append(&mut checker.violations);
    }

    violations
}

/// Per-entity minimum over all wetlands of the distances computed by `f`, or `None` with no
/// wetlands
fn nearest_wetland<F>(wetlands: &[&ExclusionZone], f: F) -> Option<Vec<f64>>
where
    F: Fn(&ExclusionZone) -> Vec<f64>,
{
    wetlands.iter().map(|z| f(z)).reduce(|acc, d| {
        acc.into_iter()
            .zip(d)
            .map(|(a, b)| a.min(b))
            .collect()
    })
}
