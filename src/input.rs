//! Common routines for handling input data.
//!
//! A project is a directory containing:
//!
//! * `site.toml`: the site boundary, its terrain source and its exclusion zones
//! * `generation.toml`: target capacity, strategies, jurisdiction and generation parameters
//! * `asset_types.toml` (optional): replaces the built-in asset catalogue
//! * `jurisdictions.toml` (optional): adds to or replaces the built-in jurisdiction rules
use crate::generation::{GenerationRequest, LayoutEngine};
use crate::site::SiteData;
use crate::strategy::Strategy;
use crate::terrain::TerrainStore;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub mod asset_types;
use asset_types::read_asset_types;
pub mod generation;
use generation::{GenerationConfig, read_generation_config};
pub mod jurisdictions;
use jurisdictions::read_jurisdictions;
pub mod site;
use site::read_site;

/// Format an error message to include the file path
fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Parse a TOML file if it exists
pub fn read_optional_toml<T: DeserializeOwned>(file_path: &Path) -> Result<Option<T>> {
    if !file_path.is_file() {
        debug!("{} not found", file_path.display());
        return Ok(None);
    }

    read_toml(file_path).map(Some)
}

/// Everything needed to generate layouts for a project
pub struct Project {
    /// The site and its exclusion zones
    pub site_data: SiteData,
    /// Generation settings
    pub config: GenerationConfig,
    /// An engine set up with the project's terrain, asset types and rules
    pub engine: LayoutEngine,
}

impl Project {
    /// The generation request described by the project
    pub fn request(&self) -> GenerationRequest {
        self.config.request(&self.site_data.site.id)
    }

    /// The strategies to generate variants for
    pub fn strategies(&self) -> &[Strategy] {
        &self.config.strategies
    }
}

/// Load a project from the specified directory.
///
/// All files are validated, including any rule overrides against the jurisdiction's rules.
pub fn load_project(project_dir: &Path) -> Result<Project> {
    let (site_data, terrain) = read_site(project_dir)?;
    let config = read_generation_config(project_dir)?;
    let catalogue = read_asset_types(project_dir)?;
    let rules = read_jurisdictions(project_dir)?;

    let engine = LayoutEngine::new(
        TerrainStore::new(terrain.provider, terrain.cell_size_m),
        catalogue,
        rules,
    );
    let project = Project {
        site_data,
        config,
        engine,
    };

    let rules = project
        .engine
        .resolve_rules(&project.request())
        .context("Invalid rule overrides in generation.toml")?;
    info!(
        "Loaded site {} ({} exclusion zones), applying {} rules",
        project.site_data.site.id,
        project.site_data.zones.len(),
        rules.jurisdiction
    );

    Ok(project)
}
