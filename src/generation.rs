//! The layout generation pipeline.
//!
//! A single parameterised pipeline serves every strategy: place assets, route roads, then
//! estimate earthwork. Cancellation is checked between each phase.
use crate::asset::{Asset, AssetCatalogue};
use crate::compliance::{RuleBook, RuleOverride, RuleSet, RuleType, Violation, evaluate};
use crate::earthwork::{EarthworkParameters, grade_asset, road_earthwork};
use crate::error::EngineError;
use crate::exclusion::ExclusionFilter;
use crate::id::LayoutID;
use crate::layout::{FailureReason, Layout, LayoutStatus};
use crate::placement::{AllocationPolicy, PlacementContext, PlacementParameters, place_assets};
use crate::roads::{RoadNetwork, RoadParameters, build_road_network};
use crate::site::SiteData;
use crate::strategy::Strategy;
use crate::terrain::{TerrainModel, TerrainStore};
use crate::units::Kilowatts;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything needed to generate a layout for a site
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// ID for the generated layout
    pub layout_id: LayoutID,
    /// Capacity to place
    pub target_capacity: Kilowatts,
    /// How capacity is split between asset kinds
    pub allocation: AllocationPolicy,
    /// Placement settings
    pub placement: PlacementParameters,
    /// Road settings
    pub roads: RoadParameters,
    /// Earthwork settings
    pub earthwork: EarthworkParameters,
    /// Jurisdiction whose rules apply (the default rules if `None`)
    pub jurisdiction: Option<String>,
    /// Project-level changes to the jurisdiction's rules
    pub rule_overrides: Vec<RuleOverride>,
}

impl GenerationRequest {
    /// A request for solar capacity with default settings
    pub fn new(layout_id: LayoutID, target_capacity_kw: f64) -> Self {
        Self {
            layout_id,
            target_capacity: Kilowatts(target_capacity_kw),
            allocation: AllocationPolicy::default(),
            placement: PlacementParameters::default(),
            roads: RoadParameters::default(),
            earthwork: EarthworkParameters::default(),
            jurisdiction: None,
            rule_overrides: Vec::new(),
        }
    }

    /// The same request under a different layout ID
    pub fn with_layout_id(&self, layout_id: LayoutID) -> Self {
        Self {
            layout_id,
            ..self.clone()
        }
    }
}

/// A flag for cooperatively cancelling a generation run.
///
/// Clones share the flag, so one can be handed to the worker and another kept to cancel it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token which is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`EngineError::CancelledGeneration`] if cancellation has been requested
    pub fn check(&self, layout_id: &LayoutID) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::CancelledGeneration(layout_id.clone()))
        } else {
            Ok(())
        }
    }
}

/// Generates layouts and checks their compliance.
///
/// Holds the terrain cache, so a single engine should be shared between generations.
pub struct LayoutEngine {
    terrain: TerrainStore,
    catalogue: AssetCatalogue,
    rules: RuleBook,
}

impl LayoutEngine {
    /// Create a new engine
    pub fn new(terrain: TerrainStore, catalogue: AssetCatalogue, rules: RuleBook) -> Self {
        Self {
            terrain,
            catalogue,
            rules,
        }
    }

    /// The terrain cache
    pub fn terrain_store(&self) -> &TerrainStore {
        &self.terrain
    }

    /// The asset types available
    pub fn catalogue(&self) -> &AssetCatalogue {
        &self.catalogue
    }

    /// The jurisdiction rule sets
    pub fn rule_book(&self) -> &RuleBook {
        &self.rules
    }

    /// The rules applying to a request
    pub fn resolve_rules(&self, request: &GenerationRequest) -> Result<RuleSet, EngineError> {
        self.rules
            .resolve(request.jurisdiction.as_deref(), &request.rule_overrides)
    }

    /// Generate a layout for a site.
    ///
    /// Always returns a layout: failures (no terrain, cancellation, an invalid request) give a
    /// layout with status `failed` and the reason recorded.
    pub fn generate(
        &self,
        site_data: &SiteData,
        request: &GenerationRequest,
        strategy: Strategy,
        cancel: &CancellationToken,
    ) -> Layout {
        let terrain = self.terrain.get_or_build(&site_data.site);
        self.generate_on(site_data, terrain.as_deref(), request, strategy, cancel)
    }

    /// Generate a layout on terrain that has already been fetched (or failed to be)
    pub(crate) fn generate_on(
        &self,
        site_data: &SiteData,
        terrain: Result<&TerrainModel, &EngineError>,
        request: &GenerationRequest,
        strategy: Strategy,
        cancel: &CancellationToken,
    ) -> Layout {
        let mut layout = Layout::new(
            request.layout_id.clone(),
            site_data.site.id.clone(),
            strategy,
            request.target_capacity,
        );
        info!(
            "Generating layout {} for site {} ({strategy}, target {})",
            layout.id, site_data.site.id, request.target_capacity
        );

        let result = layout
            .transition(LayoutStatus::Processing)
            .and_then(|()| terrain.map_err(|err| err.clone()))
            .and_then(|terrain| self.run_pipeline(site_data, terrain, request, strategy, cancel));
        let outcome = match result {
            Ok((assets, roads)) => layout.complete(assets, roads),
            Err(err) => {
                warn!("Layout {} failed: {err}", layout.id);
                layout.fail(FailureReason::from_error(&err), err.to_string())
            }
        };
        if let Err(err) = outcome {
            warn!("{err}");
        }

        if layout.status() == LayoutStatus::Completed {
            let m = &layout.metrics;
            info!(
                "Layout {} completed: {} assets, {} placed, {} of roads, net earthwork {}",
                layout.id, m.asset_count, m.total_capacity_kw, m.road_length_m, m.net_earthwork_m3
            );
        }

        layout
    }

    /// Place assets, route roads and estimate earthwork
    fn run_pipeline(
        &self,
        site_data: &SiteData,
        terrain: &TerrainModel,
        request: &GenerationRequest,
        strategy: Strategy,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Asset>, RoadNetwork), EngineError> {
        let id = &request.layout_id;
        let rules = self.resolve_rules(request)?;
        let setback_m = rules.threshold(RuleType::Setback).unwrap_or(0.0);
        let policy = strategy.policy();

        cancel.check(id)?;
        let filter = ExclusionFilter::new(site_data, setback_m);
        let ctx = PlacementContext {
            site_data,
            terrain,
            catalogue: &self.catalogue,
            filter: &filter,
        };
        let placement = place_assets(
            &ctx,
            request.target_capacity,
            &request.allocation,
            &request.placement,
            &policy,
        );

        cancel.check(id)?;
        let topology = request.roads.topology.unwrap_or(policy.topology);
        let mut roads = build_road_network(
            terrain,
            site_data.site.entry_point,
            &placement.assets,
            &request.roads,
            topology,
        );
        debug!(
            "Layout {id}: {} road segments, {} over the grade limit",
            roads.segments.len(),
            roads.over_grade_count()
        );

        cancel.check(id)?;
        let mut assets = placement.assets;
        for asset in &mut assets {
            grade_asset(asset, terrain, &request.earthwork);
        }
        for segment in &mut roads.segments {
            segment.earthwork =
                road_earthwork(terrain, &segment.geometry, segment.width_m, &request.earthwork);
        }

        cancel.check(id)?;
        Ok((assets, roads))
    }

    /// Check a layout against the rules applying to its request
    pub fn check_compliance(
        &self,
        layout: &Layout,
        site_data: &SiteData,
        request: &GenerationRequest,
    ) -> Result<Vec<Violation>, EngineError> {
        let rules = self.resolve_rules(request)?;
        Ok(evaluate(layout, site_data, &rules))
    }
}
