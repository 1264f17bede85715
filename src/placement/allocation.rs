//! Policies deciding which asset kind is placed next.
use crate::asset::AssetKind;
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Deserialize;

/// The relative share of capacity assigned to one asset kind
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct KindWeight {
    /// The asset kind
    pub kind: AssetKind,
    /// Relative weight (need not sum to one across kinds)
    pub weight: f64,
}

/// How capacity is split between asset kinds
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Each kind receives a fixed share of the target capacity
    FixedRatio {
        /// Weight per kind
        ratios: Vec<KindWeight>,
    },
    /// Kinds take turns, one asset at a time
    RoundRobin {
        /// Kinds in turn order
        kinds: Vec<AssetKind>,
    },
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self::FixedRatio {
            ratios: vec![KindWeight {
                kind: AssetKind::Solar,
                weight: 1.0,
            }],
        }
    }
}

impl AllocationPolicy {
    /// A policy placing only one kind of asset
    pub fn single(kind: AssetKind) -> Self {
        Self::FixedRatio {
            ratios: vec![KindWeight { kind, weight: 1.0 }],
        }
    }

    /// The kinds named by the policy, in order
    pub fn kinds(&self) -> Vec<AssetKind> {
        match self {
            Self::FixedRatio { ratios } => ratios.iter().map(|r| r.kind).collect(),
            Self::RoundRobin { kinds } => kinds.clone(),
        }
    }

    /// Check the policy names at least one kind, without duplicates, and has usable weights
    pub fn validate(&self) -> Result<()> {
        let kinds = self.kinds();
        ensure!(!kinds.is_empty(), "Allocation policy names no asset kinds");
        ensure!(
            kinds.iter().all_unique(),
            "Allocation policy names an asset kind more than once"
        );
        ensure!(
            !kinds.contains(&AssetKind::Substation),
            "Substations carry no capacity and cannot be allocated; use include_substation"
        );
        if let Self::FixedRatio { ratios } = self {
            ensure!(
                ratios.iter().all(|r| r.weight.is_finite() && r.weight >= 0.0),
                "Allocation weights must be finite and non-negative"
            );
            ensure!(
                ratios.iter().any(|r| r.weight > 0.0),
                "At least one allocation weight must be positive"
            );
        }

        Ok(())
    }
}

/// Tracks placed capacity per kind and picks the next kind to place
#[derive(Debug, Clone)]
pub struct Allocator {
    policy: AllocationPolicy,
    target_kw: f64,
    placed_kw: IndexMap<AssetKind, f64>,
    next_turn: usize,
}

impl Allocator {
    /// Create an allocator for a capacity target
    pub fn new(policy: AllocationPolicy, target_kw: f64) -> Self {
        let placed_kw = policy.kinds().into_iter().map(|k| (k, 0.0)).collect();
        Self {
            policy,
            target_kw,
            placed_kw,
            next_turn: 0,
        }
    }

    /// Record a placed asset
    pub fn record(&mut self, kind: AssetKind, capacity_kw: f64) {
        *self.placed_kw.entry(kind).or_default() += capacity_kw;
    }

    /// The next kind to place, considering only kinds for which `available` returns true
    pub fn next_kind<F>(&mut self, available: F) -> Option<AssetKind>
    where
        F: Fn(AssetKind) -> bool,
    {
        match &self.policy {
            AllocationPolicy::FixedRatio { ratios } => {
                let total_weight: f64 = ratios.iter().map(|r| r.weight).sum();

                // The kind furthest behind its share of the target; earlier kinds win ties
                let mut best: Option<(AssetKind, f64)> = None;
                for ratio in ratios.iter().filter(|r| r.weight > 0.0 && available(r.kind)) {
                    let share = self.target_kw * ratio.weight / total_weight;
                    let deficit = share - self.placed_kw.get(&ratio.kind).copied().unwrap_or(0.0);
                    if best.is_none_or(|(_, best_deficit)| deficit > best_deficit) {
                        best = Some((ratio.kind, deficit));
                    }
                }
                best.map(|(kind, _)| kind)
            }
            AllocationPolicy::RoundRobin { kinds } => {
                let n = kinds.len();
                let offset = (0..n).find(|i| available(kinds[(self.next_turn + i) % n]))?;
                let kind = kinds[(self.next_turn + offset) % n];
                self.next_turn = (self.next_turn + offset + 1) % n;
                Some(kind)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    fn solar_battery(solar: f64, battery: f64) -> AllocationPolicy {
        AllocationPolicy::FixedRatio {
            ratios: vec![
                KindWeight {
                    kind: AssetKind::Solar,
                    weight: solar,
                },
                KindWeight {
                    kind: AssetKind::Battery,
                    weight: battery,
                },
            ],
        }
    }

    #[test]
    fn test_fixed_ratio_follows_deficit() {
        let mut allocator = Allocator::new(solar_battery(3.0, 1.0), 1000.0);
        assert_eq!(allocator.next_kind(|_| true), Some(AssetKind::Solar));
        allocator.record(AssetKind::Solar, 600.0);

        // Solar is 150 kW over its share; battery is 250 kW short
        assert_eq!(allocator.next_kind(|_| true), Some(AssetKind::Battery));
        assert_eq!(
            allocator.next_kind(|k| k != AssetKind::Battery),
            Some(AssetKind::Solar)
        );
        assert_eq!(allocator.next_kind(|_| false), None);
    }

    #[test]
    fn test_round_robin_skips_unavailable() {
        let policy = AllocationPolicy::RoundRobin {
            kinds: vec![AssetKind::Solar, AssetKind::Battery, AssetKind::Generator],
        };
        let mut allocator = Allocator::new(policy, 1000.0);
        let mut next = || allocator.next_kind(|k| k != AssetKind::Battery);
        assert_eq!(next(), Some(AssetKind::Solar));
        assert_eq!(next(), Some(AssetKind::Generator));
        assert_eq!(next(), Some(AssetKind::Solar));
    }

    #[test]
    fn test_validate() {
        assert!(AllocationPolicy::default().validate().is_ok());
        assert_error!(
            solar_battery(0.0, 0.0).validate(),
            "At least one allocation weight must be positive"
        );
        assert_error!(
            AllocationPolicy::RoundRobin {
                kinds: vec![AssetKind::Solar, AssetKind::Solar]
            }
            .validate(),
            "Allocation policy names an asset kind more than once"
        );
        assert_error!(
            AllocationPolicy::RoundRobin { kinds: vec![] }.validate(),
            "Allocation policy names no asset kinds"
        );
    }

    #[test]
    fn test_deserialize() {
        let policy: AllocationPolicy = toml::from_str(
            r#"
            policy = "fixed_ratio"
            ratios = [{kind = "solar", weight = 0.8}, {kind = "battery", weight = 0.2}]
            "#,
        )
        .unwrap();
        assert_eq!(policy, solar_battery(0.8, 0.2));

        let policy: AllocationPolicy =
            toml::from_str("policy = \"round_robin\"\nkinds = [\"wind_turbine\"]").unwrap();
        assert_eq!(
            policy,
            AllocationPolicy::RoundRobin {
                kinds: vec![AssetKind::WindTurbine]
            }
        );
    }
}
