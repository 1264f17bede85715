//! A per-site cache of terrain models.
use super::{ElevationProvider, ElevationRequest, TerrainModel};
use crate::error::EngineError;
use crate::id::SiteID;
use crate::site::Site;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// One cache slot. The slot's own lock is held while its terrain is being built, so concurrent
/// requests for the same site wait for a single fetch instead of issuing their own.
type Slot = Arc<Mutex<Option<Arc<TerrainModel>>>>;

/// Builds terrain models on demand and shares them between generations.
///
/// Failed fetches are not cached, so a later request retries the provider.
pub struct TerrainStore {
    provider: Box<dyn ElevationProvider>,
    cell_size_m: f64,
    slots: Mutex<HashMap<SiteID, Slot>>,
}

impl TerrainStore {
    /// Create a store backed by the given provider
    pub fn new(provider: Box<dyn ElevationProvider>, cell_size_m: f64) -> Self {
        Self {
            provider,
            cell_size_m,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The cell size of terrain built by this store
    pub fn cell_size_m(&self) -> f64 {
        self.cell_size_m
    }

    fn slot(&self, site_id: &SiteID) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(site_id.clone()).or_default())
    }

    /// Get the terrain for a site, building it if needed
    pub fn get_or_build(&self, site: &Site) -> Result<Arc<TerrainModel>, EngineError> {
        let slot = self.slot(&site.id);
        let mut cached = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(terrain) = cached.as_ref() {
            debug!("Using cached terrain for site {}", site.id);
            return Ok(Arc::clone(terrain));
        }

        let request = ElevationRequest {
            site_id: site.id.clone(),
            bounds: site.bounds(),
            projection: site.projection,
            cell_size_m: self.cell_size_m,
        };
        let grid = self.provider.fetch_elevation(&request)?;
        let terrain = Arc::new(TerrainModel::build(site, grid)?);
        info!(
            "Built {}x{} terrain model for site {} from {} elevation data",
            terrain.n_cols(),
            terrain.n_rows(),
            site.id,
            self.provider.name()
        );
        *cached = Some(Arc::clone(&terrain));

        Ok(terrain)
    }

    /// Whether terrain for a site is currently cached
    pub fn is_cached(&self, site_id: &SiteID) -> bool {
        self.slot(site_id)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drop the cached terrain for a site (e.g. after its boundary is edited)
    pub fn invalidate(&self, site_id: &SiteID) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(site_id);
    }
}
