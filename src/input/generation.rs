//! Code for reading generation settings from `generation.toml`.
use super::{input_err_msg, read_toml};
use crate::compliance::RuleOverride;
use crate::earthwork::{EarthworkParameters, PadGrade};
use crate::generation::GenerationRequest;
use crate::id::{LayoutID, SiteID};
use crate::placement::{AllocationPolicy, PlacementParameters};
use crate::roads::RoadParameters;
use crate::strategy::Strategy;
use crate::units::Kilowatts;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::Deserialize;
use std::path::Path;
use strum::IntoEnumIterator;

const GENERATION_FILE_NAME: &str = "generation.toml";

/// Generate variants for every strategy unless told otherwise
fn default_strategies() -> Vec<Strategy> {
    Strategy::iter().collect()
}

/// Generation settings for a project
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// ID for generated layouts (defaults to the site ID)
    #[serde(default)]
    pub layout_id: Option<LayoutID>,
    /// Capacity to place
    pub target_capacity_kw: f64,
    /// How capacity is split between asset kinds
    #[serde(default)]
    pub allocation: AllocationPolicy,
    /// Strategies for the `variants` command
    #[serde(default = "default_strategies")]
    pub strategies: Vec<Strategy>,
    /// Jurisdiction whose rules apply
    #[serde(default)]
    pub jurisdiction: Option<String>,
    /// Placement settings
    #[serde(default)]
    pub placement: PlacementParameters,
    /// Road settings
    #[serde(default)]
    pub roads: RoadParameters,
    /// Earthwork settings
    #[serde(default)]
    pub earthwork: EarthworkParameters,
    /// Project-level changes to the jurisdiction's rules
    #[serde(default, rename = "rule_override")]
    pub rule_overrides: Vec<RuleOverride>,
}

/// Check that a value is finite and strictly positive
fn check_positive(value: f64, name: &str) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "{name} must be a positive number (got {value})"
    );
    Ok(())
}

impl GenerationConfig {
    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        check_positive(self.target_capacity_kw, "target_capacity_kw")?;
        self.allocation.validate()?;
        ensure!(!self.strategies.is_empty(), "At least one strategy is required");
        ensure!(
            self.strategies.iter().all_unique(),
            "Strategies must not be repeated"
        );

        check_positive(
            self.placement.candidate_spacing_m,
            "placement.candidate_spacing_m",
        )?;
        ensure!(
            self.placement.default_bearing_deg.is_finite(),
            "placement.default_bearing_deg must be a finite number"
        );
        check_positive(self.roads.width_m, "roads.width_m")?;
        check_positive(self.roads.max_grade_pct, "roads.max_grade_pct")?;
        check_positive(self.roads.sample_step_m, "roads.sample_step_m")?;
        check_positive(self.earthwork.pad_sample_m, "earthwork.pad_sample_m")?;
        check_positive(self.earthwork.road_sample_m, "earthwork.road_sample_m")?;
        check_positive(self.earthwork.profile_window_m, "earthwork.profile_window_m")?;
        if let PadGrade::Fixed { elevation_m } = self.earthwork.pad_grade {
            ensure!(
                elevation_m.is_finite(),
                "earthwork.pad_grade.elevation_m must be a finite number"
            );
        }
        for o in &self.rule_overrides {
            if let Some(threshold) = o.threshold {
                ensure!(
                    threshold.is_finite() && threshold >= 0.0,
                    "Threshold for {} override must be a non-negative number",
                    o.rule_type
                );
            }
        }

        Ok(())
    }

    /// The generation request for a site
    pub fn request(&self, site_id: &SiteID) -> GenerationRequest {
        let layout_id = self
            .layout_id
            .clone()
            .unwrap_or_else(|| site_id.as_str().into());
        GenerationRequest {
            layout_id,
            target_capacity: Kilowatts(self.target_capacity_kw),
            allocation: self.allocation.clone(),
            placement: self.placement.clone(),
            roads: self.roads,
            earthwork: self.earthwork,
            jurisdiction: self.jurisdiction.clone(),
            rule_overrides: self.rule_overrides.clone(),
        }
    }
}

/// Read generation settings from `generation.toml` in the project directory
pub fn read_generation_config(project_dir: &Path) -> Result<GenerationConfig> {
    let file_path = project_dir.join(GENERATION_FILE_NAME);
    let config: GenerationConfig = read_toml(&file_path)?;
    config.validate().with_context(|| input_err_msg(&file_path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetKind;
    use crate::roads::RoadTopology;
    use rstest::rstest;

    fn parse(toml_str: &str) -> GenerationConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_minimal_config() {
        let config = parse("target_capacity_kw = 5000.0");
        config.validate().unwrap();
        assert_eq!(config.strategies.len(), 4);
        assert_eq!(config.allocation, AllocationPolicy::default());
        assert_eq!(config.roads, RoadParameters::default());

        let request = config.request(&"site1".into());
        assert_eq!(request.layout_id.as_str(), "site1");
        assert_eq!(request.target_capacity, Kilowatts(5000.0));
        assert_eq!(request.jurisdiction, None);
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
layout_id = "north_field"
target_capacity_kw = 8000.0
strategies = ["balanced", "minimize_earthwork"]
jurisdiction = "ca"

[allocation]
policy = "fixed_ratio"
ratios = [{kind = "solar", weight = 3.0}, {kind = "battery", weight = 1.0}]

[placement]
include_substation = true
terrain_aware = false

[roads]
width_m = 5.0
topology = "star"

[earthwork]
pad_grade = {kind = "fixed", elevation_m = 120.0}

[[rule_override]]
rule_type = "setback"
threshold = 40.0
"#,
        );
        config.validate().unwrap();
        assert_eq!(
            config.strategies,
            [Strategy::Balanced, Strategy::MinimizeEarthwork]
        );
        assert_eq!(
            config.allocation.kinds(),
            [AssetKind::Solar, AssetKind::Battery]
        );
        assert!(config.placement.include_substation);
        assert!(!config.placement.terrain_aware);
        assert_eq!(config.placement.candidate_spacing_m, 10.0);
        assert_eq!(config.roads.topology, Some(RoadTopology::Star));
        assert_eq!(config.roads.max_grade_pct, 15.0);
        assert_eq!(
            config.earthwork.pad_grade,
            PadGrade::Fixed { elevation_m: 120.0 }
        );
        assert_eq!(config.rule_overrides.len(), 1);

        let request = config.request(&"site1".into());
        assert_eq!(request.layout_id.as_str(), "north_field");
        assert_eq!(request.jurisdiction.as_deref(), Some("ca"));
    }

    #[rstest]
    #[case("target_capacity_kw = 0.0")]
    #[case("target_capacity_kw = 100.0\nstrategies = []")]
    #[case("target_capacity_kw = 100.0\nstrategies = [\"balanced\", \"balanced\"]")]
    #[case("target_capacity_kw = 100.0\n[roads]\nwidth_m = -1.0")]
    #[case("target_capacity_kw = 100.0\n[allocation]\npolicy = \"round_robin\"\nkinds = []")]
    #[case("target_capacity_kw = 100.0\n[[rule_override]]\nrule_type = \"spacing\"\nthreshold = -2.0")]
    fn test_invalid_config(#[case] toml_str: &str) {
        assert!(parse(toml_str).validate().is_err());
    }

    #[test]
    fn test_unknown_field() {
        assert!(toml::from_str::<GenerationConfig>("target_kw = 10.0").is_err());
    }
}
