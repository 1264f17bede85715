//! Generation strategies and the tuning each one applies to the shared pipeline.
use crate::roads::RoadTopology;
use crate::terrain::SuitabilityWeights;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A named trade-off for layout generation
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// A compromise between the other strategies
    #[default]
    Balanced,
    /// Fit as much capacity as possible
    MaximizeCapacity,
    /// Favour flat ground to reduce grading
    MinimizeEarthwork,
    /// Keep assets close to the entry point
    MinimizeRoadLength,
}

/// Parameters which vary between strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyPolicy {
    /// Weights of the terrain suitability score
    pub suitability: SuitabilityWeights,
    /// How strongly candidates near the entry point are preferred (0 to 1)
    pub proximity_weight: f64,
    /// Multiplier (at least 1) applied to minimum spacings between assets
    pub spacing_factor: f64,
    /// Shape of the road network
    pub topology: RoadTopology,
}

impl Strategy {
    /// The policy applied by this strategy
    pub fn policy(self) -> StrategyPolicy {
        let (slope, aspect, slope_exponent, proximity_weight, spacing_factor) = match self {
            Strategy::Balanced => (0.7, 0.3, 1.0, 0.1, 1.25),
            Strategy::MaximizeCapacity => (0.5, 0.5, 1.0, 0.0, 1.0),
            Strategy::MinimizeEarthwork => (1.0, 0.0, 2.0, 0.0, 1.25),
            Strategy::MinimizeRoadLength => (0.6, 0.2, 1.0, 0.5, 1.0),
        };

        StrategyPolicy {
            suitability: SuitabilityWeights {
                slope,
                aspect,
                slope_exponent,
            },
            proximity_weight,
            spacing_factor,
            topology: RoadTopology::MinimumSpanningTree,
        }
    }
}

impl Default for StrategyPolicy {
    fn default() -> Self {
        Strategy::default().policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_strategy_names() {
        let names: Vec<_> = Strategy::iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            [
                "balanced",
                "maximize_capacity",
                "minimize_earthwork",
                "minimize_road_length"
            ]
        );
        assert_eq!(
            Strategy::from_str("minimize_earthwork").unwrap(),
            Strategy::MinimizeEarthwork
        );
    }

    #[test]
    fn test_policies_are_valid() {
        for strategy in Strategy::iter() {
            let policy = strategy.policy();
            assert!(policy.spacing_factor >= 1.0, "{strategy}");
            assert!((0.0..=1.0).contains(&policy.proximity_weight), "{strategy}");
            assert!(policy.suitability.slope + policy.suitability.aspect > 0.0);
        }
    }
}
