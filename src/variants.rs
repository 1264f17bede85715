//! Generating one layout per strategy and comparing the results.
use crate::generation::{CancellationToken, GenerationRequest, LayoutEngine};
use crate::id::LayoutID;
use crate::layout::{Layout, LayoutStatus};
use crate::site::SiteData;
use crate::strategy::Strategy;
use crate::units::{CubicMeters, Kilowatts, Meters};
use itertools::Itertools;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;

/// A layout generated under one strategy
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutVariant {
    /// The strategy used
    pub strategy: Strategy,
    /// The generated layout
    pub layout: Layout,
}

/// The key figures of one variant, as shown in comparisons
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantRow {
    /// ID of the variant's layout
    pub layout_id: LayoutID,
    /// The strategy used
    pub strategy: Strategy,
    /// Final status of the layout
    pub status: LayoutStatus,
    /// Capacity placed
    pub total_capacity_kw: Kilowatts,
    /// Fraction of the target placed
    pub achieved_fraction: f64,
    /// Number of assets
    pub asset_count: usize,
    /// Cut minus fill
    pub net_earthwork_m3: CubicMeters,
    /// Total road length
    pub road_length_m: Meters,
    /// Steepest road grade (%)
    pub max_road_grade_pct: f64,
}

impl VariantRow {
    fn new(variant: &LayoutVariant) -> Self {
        let layout = &variant.layout;
        let m = &layout.metrics;
        Self {
            layout_id: layout.id.clone(),
            strategy: variant.strategy,
            status: layout.status(),
            total_capacity_kw: m.total_capacity_kw,
            achieved_fraction: m.achieved_fraction,
            asset_count: m.asset_count,
            net_earthwork_m3: m.net_earthwork_m3,
            road_length_m: m.road_length_m,
            max_road_grade_pct: m.max_road_grade_pct,
        }
    }

    fn is_completed(&self) -> bool {
        self.status == LayoutStatus::Completed
    }
}

/// The best variant for each metric, plus a row per variant.
///
/// Failed variants appear in the rows but are never chosen as best. A best ID is `None` only
/// if every variant failed.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantComparison {
    /// The variant with the most capacity
    pub best_capacity_id: Option<LayoutID>,
    /// The variant whose net earthwork is closest to balanced
    pub best_earthwork_id: Option<LayoutID>,
    /// The variant with the shortest road network
    pub best_road_network_id: Option<LayoutID>,
    /// One row per variant, in generation order
    pub rows: Vec<VariantRow>,
}

/// The first completed row which is best according to `cmp` (ties keep the earlier row)
fn best_by<F>(rows: &[VariantRow], mut cmp: F) -> Option<LayoutID>
where
    F: FnMut(&VariantRow, &VariantRow) -> Ordering,
{
    rows.iter()
        .filter(|row| row.is_completed())
        .reduce(|best, row| {
            if cmp(row, best) == Ordering::Less {
                row
            } else {
                best
            }
        })
        .map(|row| row.layout_id.clone())
}

impl VariantComparison {
    /// Compare a set of variants
    pub fn compare(variants: &[LayoutVariant]) -> Self {
        let rows: Vec<_> = variants.iter().map(VariantRow::new).collect();

        Self {
            best_capacity_id: best_by(&rows, |a, b| {
                b.total_capacity_kw.value().total_cmp(&a.total_capacity_kw.value())
            }),
            best_earthwork_id: best_by(&rows, |a, b| {
                a.net_earthwork_m3
                    .value()
                    .abs()
                    .total_cmp(&b.net_earthwork_m3.value().abs())
            }),
            best_road_network_id: best_by(&rows, |a, b| {
                a.road_length_m.value().total_cmp(&b.road_length_m.value())
            }),
            rows,
        }
    }
}

/// The layouts generated for several strategies and their comparison
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSet {
    /// One variant per strategy, in the order requested
    pub variants: Vec<LayoutVariant>,
    /// How the variants compare
    pub comparison: VariantComparison,
}

impl VariantSet {
    /// The variant with the given layout ID
    pub fn get(&self, id: &LayoutID) -> Option<&LayoutVariant> {
        self.variants.iter().find(|v| &v.layout.id == id)
    }
}

/// The layout ID used for a strategy's variant
pub fn variant_id(layout_id: &LayoutID, strategy: Strategy) -> LayoutID {
    format!("{layout_id}-{strategy}").into()
}

impl LayoutEngine {
    /// Generate one layout per strategy.
    ///
    /// Terrain is fetched once and shared. Each strategy then runs the whole pipeline
    /// independently, in parallel. If terrain is unavailable, every variant fails. A strategy
    /// listed more than once is generated once, at its first position.
    pub fn generate_variants(
        &self,
        site_data: &SiteData,
        request: &GenerationRequest,
        strategies: &[Strategy],
        cancel: &CancellationToken,
    ) -> VariantSet {
        let requested = strategies.len();
        let strategies: Vec<_> = strategies.iter().copied().unique().collect();
        if strategies.len() < requested {
            warn!(
                "Ignoring repeated strategies for layout {}",
                request.layout_id
            );
        }
        info!(
            "Generating {} variants of layout {}",
            strategies.len(),
            request.layout_id
        );
        let terrain = self.terrain_store().get_or_build(&site_data.site);

        let variants: Vec<_> = strategies
            .par_iter()
            .map(|&strategy| {
                let request = request.with_layout_id(variant_id(&request.layout_id, strategy));
                let layout =
                    self.generate_on(site_data, terrain.as_deref(), &request, strategy, cancel);
                LayoutVariant { strategy, layout }
            })
            .collect();

        let comparison = VariantComparison::compare(&variants);
        info!(
            "Best variants: capacity {}, earthwork {}, road network {}",
            display_best(comparison.best_capacity_id.as_ref()),
            display_best(comparison.best_earthwork_id.as_ref()),
            display_best(comparison.best_road_network_id.as_ref())
        );

        VariantSet {
            variants,
            comparison,
        }
    }
}

fn display_best(id: Option<&LayoutID>) -> &str {
    id.map_or("none", LayoutID::as_str)
}
