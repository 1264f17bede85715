//! Layouts: the product of one generation run, with their status and summary metrics.
use crate::asset::Asset;
use crate::earthwork::Earthwork;
use crate::error::EngineError;
use crate::id::{LayoutID, SiteID, define_id_getter};
use crate::roads::RoadNetwork;
use crate::strategy::Strategy;
use crate::units::{CubicMeters, Kilowatts, Meters};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where a layout is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LayoutStatus {
    /// Waiting for a worker
    Queued,
    /// Being generated
    Processing,
    /// Generated successfully (possibly with less capacity than requested)
    Completed,
    /// Generation did not finish
    Failed,
}

impl LayoutStatus {
    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, LayoutStatus::Completed | LayoutStatus::Failed)
    }

    /// Whether the state machine allows moving from this status to `next`
    pub fn can_transition_to(self, next: LayoutStatus) -> bool {
        use LayoutStatus::{Completed, Failed, Processing, Queued};
        matches!(
            (self, next),
            (Queued, Processing | Failed) | (Processing, Completed | Failed)
        )
    }
}

/// Why a layout failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Generation was cancelled or superseded
    Cancelled,
    /// No elevation data could be obtained for the site
    TerrainUnavailable,
    /// The request could not be carried out as given (e.g. an unknown rule override)
    InvalidRequest,
}

impl FailureReason {
    /// The failure reason corresponding to an engine error
    pub fn from_error(error: &EngineError) -> Self {
        match error {
            EngineError::CancelledGeneration(_) => Self::Cancelled,
            EngineError::TerrainUnavailable { .. } => Self::TerrainUnavailable,
            _ => Self::InvalidRequest,
        }
    }
}

/// Summary figures for a layout, used to compare variants
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LayoutMetrics {
    /// Capacity of all placed assets
    pub total_capacity_kw: Kilowatts,
    /// Fraction of the target capacity placed
    pub achieved_fraction: f64,
    /// Number of placed assets (including any substation)
    pub asset_count: usize,
    /// Assets flagged as poorly sited
    pub low_suitability_assets: usize,
    /// Total cut for pads and roads
    pub cut_volume_m3: CubicMeters,
    /// Total fill for pads and roads
    pub fill_volume_m3: CubicMeters,
    /// Cut minus fill
    pub net_earthwork_m3: CubicMeters,
    /// Combined length of all road segments
    pub road_length_m: Meters,
    /// Steepest road grade, in percent
    pub max_road_grade_pct: f64,
    /// Road segments steeper than the grade limit
    pub over_grade_segments: usize,
}

impl LayoutMetrics {
    /// Aggregate the metrics of a set of assets and roads
    pub fn compute(target: Kilowatts, assets: &[Asset], roads: &RoadNetwork) -> Self {
        let total_capacity_kw: Kilowatts = assets.iter().map(|a| a.capacity).sum();
        let earthwork: Earthwork = assets
            .iter()
            .map(|a| a.earthwork)
            .chain(roads.segments.iter().map(|s| s.earthwork))
            .sum();

        Self {
            total_capacity_kw,
            achieved_fraction: if target.value() > 0.0 {
                total_capacity_kw.value() / target.value()
            } else {
                1.0
            },
            asset_count: assets.len(),
            low_suitability_assets: assets.iter().filter(|a| a.low_suitability).count(),
            cut_volume_m3: earthwork.cut,
            fill_volume_m3: earthwork.fill,
            net_earthwork_m3: earthwork.net(),
            road_length_m: roads.total_length(),
            max_road_grade_pct: roads.max_grade_pct(),
            over_grade_segments: roads.over_grade_count(),
        }
    }
}

/// A generated (or pending) layout for a site
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    /// Unique identifier for the layout
    pub id: LayoutID,
    /// The site the layout is for
    pub site_id: SiteID,
    /// The strategy used to generate it
    pub strategy: Strategy,
    /// Lifecycle status
    status: LayoutStatus,
    /// The capacity requested
    pub target_capacity: Kilowatts,
    /// Placed assets, in placement order
    pub assets: Vec<Asset>,
    /// Access roads
    pub roads: RoadNetwork,
    /// Summary figures
    pub metrics: LayoutMetrics,
    /// Why the layout failed, if it did
    pub failure_reason: Option<FailureReason>,
    /// Human-readable failure description
    pub error_message: Option<String>,
    /// When the layout was created
    pub created_at: DateTime<Utc>,
    /// When the layout last changed
    pub updated_at: DateTime<Utc>,
}
define_id_getter! {Layout, LayoutID}

impl Layout {
    /// Create a new, queued layout
    pub fn new(id: LayoutID, site_id: SiteID, strategy: Strategy, target: Kilowatts) -> Self {
        let now = Utc::now();
        Self {
            id,
            site_id,
            strategy,
            status: LayoutStatus::Queued,
            target_capacity: target,
            assets: Vec::new(),
            roads: RoadNetwork::default(),
            metrics: LayoutMetrics::default(),
            failure_reason: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The layout's lifecycle status
    pub fn status(&self) -> LayoutStatus {
        self.status
    }

    /// Move to a new status, if the state machine allows it
    pub fn transition(&mut self, to: LayoutStatus) -> Result<(), EngineError> {
        if !self.status.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to,
            });
        }

        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record the generated assets and roads and mark the layout completed
    pub fn complete(&mut self, assets: Vec<Asset>, roads: RoadNetwork) -> Result<(), EngineError> {
        self.transition(LayoutStatus::Completed)?;
        self.metrics = LayoutMetrics::compute(self.target_capacity, &assets, &roads);
        self.assets = assets;
        self.roads = roads;
        Ok(())
    }

    /// Mark the layout failed
    pub fn fail(&mut self, reason: FailureReason, message: String) -> Result<(), EngineError> {
        self.transition(LayoutStatus::Failed)?;
        self.failure_reason = Some(reason);
        self.error_message = Some(message);
        Ok(())
    }

    /// Whether the layout completed with less capacity than requested
    pub fn is_partial(&self) -> bool {
        self.status == LayoutStatus::Completed && self.metrics.achieved_fraction < 1.0 - 1e-9
    }
}
