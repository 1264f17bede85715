//! Publishing finished layouts.
//!
//! Generation never publishes by itself: callers hand finished layouts to a publisher. A CSV
//! implementation lives in [`crate::output`].
use crate::layout::{Layout, LayoutStatus};
use crate::site::SiteData;
use anyhow::Result;
use log::{info, warn};

/// Something which receives finished layouts
pub trait LayoutPublisher {
    /// Publish a layout generated for the given site
    fn publish(&mut self, site_data: &SiteData, layout: &Layout) -> Result<()>;

    /// Make sure everything published so far has been written out
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes a summary of each layout to the program log
#[derive(Debug, Default)]
pub struct LoggingPublisher;

impl LayoutPublisher for LoggingPublisher {
    fn publish(&mut self, site_data: &SiteData, layout: &Layout) -> Result<()> {
        if layout.status() != LayoutStatus::Completed {
            warn!(
                "Layout {} for site {} {}: {}",
                layout.id,
                site_data.site.id,
                layout.status(),
                layout.error_message.as_deref().unwrap_or("no reason given")
            );
            return Ok(());
        }

        let m = &layout.metrics;
        info!(
            "Layout {} ({}): {} of {} placed in {} assets, {} of roads",
            layout.id,
            layout.strategy,
            m.total_capacity_kw,
            layout.target_capacity,
            m.asset_count,
            m.road_length_m
        );
        info!(
            "Layout {}: cut {}, fill {}, net {}; steepest road {:.1}%",
            layout.id, m.cut_volume_m3, m.fill_volume_m3, m.net_earthwork_m3, m.max_road_grade_pct
        );
        if layout.is_partial() {
            warn!(
                "Layout {} only reached {:.0}% of its target capacity",
                layout.id,
                m.achieved_fraction * 100.0
            );
        }
        if m.over_grade_segments > 0 {
            warn!(
                "Layout {} has {} road segments steeper than the grade limit",
                layout.id, m.over_grade_segments
            );
        }

        Ok(())
    }
}

/// Keeps published layouts in memory
#[derive(Debug, Default)]
pub struct InMemoryPublisher {
    layouts: Vec<Layout>,
}

impl InMemoryPublisher {
    /// Create an empty publisher
    pub fn new() -> Self {
        Self::default()
    }

    /// The layouts published so far, in order
    pub fn layouts(&self) -> &[Layout] {
        &self.layouts
    }
}

impl LayoutPublisher for InMemoryPublisher {
    fn publish(&mut self, _site_data: &SiteData, layout: &Layout) -> Result<()> {
        self.layouts.push(layout.clone());
        Ok(())
    }
}
