//! Errors raised by the layout engine.
//!
//! Partial placements and over-grade roads are not errors: they are reported through
//! [`crate::placement::PlacementOutcome::is_partial`] and
//! [`crate::roads::RoadSegment::over_grade_limit`] respectively.
use crate::id::{LayoutID, SiteID};
use crate::layout::LayoutStatus;
use thiserror::Error;

/// An error raised by the layout engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// No usable elevation data for the site. Safe to retry later.
    #[error("Terrain unavailable for site {site_id}: {reason}")]
    TerrainUnavailable {
        /// The site for which terrain was requested
        site_id: SiteID,
        /// Why the terrain could not be obtained
        reason: String,
    },
    /// Generation was aborted cooperatively
    #[error("Generation of layout {0} was cancelled")]
    CancelledGeneration(LayoutID),
    /// A project-level rule override names a rule type that doesn't exist
    #[error("Invalid rule override: unknown rule type \"{0}\"")]
    InvalidRuleOverride(String),
    /// A second generation was requested for a layout which already has one in flight
    #[error("Layout {0} already has a generation in progress")]
    GenerationInProgress(LayoutID),
    /// A layout status change that the state machine does not allow
    #[error("Layout {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The layout
        id: LayoutID,
        /// Current status
        from: LayoutStatus,
        /// Requested status
        to: LayoutStatus,
    },
    /// The layout ID is not known to the queue
    #[error("Unknown layout {0}")]
    UnknownLayout(LayoutID),
}

impl EngineError {
    /// Shorthand for a [`EngineError::TerrainUnavailable`] error
    pub fn terrain_unavailable(site_id: &SiteID, reason: impl Into<String>) -> Self {
        Self::TerrainUnavailable {
            site_id: site_id.clone(),
            reason: reason.into(),
        }
    }
}
