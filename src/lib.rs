//! Layout generation and compliance checking for renewable energy sites.
//!
//! Given a site boundary, its terrain and its exclusion zones, the [`generation::LayoutEngine`]
//! places assets, connects them with access roads, estimates earthwork and reports how the
//! result measures up against a jurisdiction's siting rules.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod asset;
pub mod cli;
pub mod compliance;
pub mod earthwork;
pub mod error;
pub mod exclusion;
pub mod generation;
pub mod geometry;
pub mod id;
pub mod input;
pub mod jobs;
pub mod layout;
pub mod log;
pub mod output;
pub mod placement;
pub mod publish;
pub mod roads;
pub mod settings;
pub mod site;
pub mod strategy;
pub mod terrain;
pub mod units;
pub mod variants;

#[cfg(test)]
mod fixture;

/// Get the directory where program settings are stored
pub fn get_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("sitelayout");

    path
}
