//! The `metadata.toml` record written beside a run's outputs.
//!
//! It ties the CSV files back to the project, site and request that produced them, and to the
//! build of the program that ran.
use crate::input::Project;
use crate::layout::{Layout, LayoutStatus};
use crate::strategy::Strategy;
use crate::units::Kilowatts;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local, SecondsFormat};
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for metadata
const METADATA_FILE_NAME: &str = "metadata.toml";

/// Build information generated by `build.rs`
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// The command which produced a set of outputs
pub struct RunInfo<'a> {
    /// Subcommand name, e.g. `generate`
    pub command: &'a str,
    /// The project directory
    pub project_path: &'a Path,
    /// When the run started
    pub started: DateTime<Local>,
    /// Worker threads used
    pub workers: usize,
}

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunSection<'a>,
    site: SiteSection<'a>,
    program: ProgramSection,
    platform: PlatformSection,
    layouts: Vec<LayoutSection<'a>>,
}

#[derive(Serialize)]
struct RunSection<'a> {
    command: &'a str,
    project_path: &'a Path,
    started: String,
    finished: String,
    workers: usize,
}

#[derive(Serialize)]
struct SiteSection<'a> {
    id: &'a str,
    description: &'a str,
    area_ha: f64,
    exclusion_zones: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    jurisdiction: Option<&'a str>,
    rule_overrides: usize,
    target_capacity_kw: Kilowatts,
}

/// One row per layout in the outputs
#[derive(Serialize)]
struct LayoutSection<'a> {
    id: &'a str,
    strategy: Strategy,
    status: LayoutStatus,
    capacity_kw: Kilowatts,
    assets: usize,
    road_segments: usize,
}

impl<'a> From<&'a Layout> for LayoutSection<'a> {
    fn from(layout: &'a Layout) -> Self {
        Self {
            id: layout.id.as_str(),
            strategy: layout.strategy,
            status: layout.status(),
            capacity_kw: layout.metrics.total_capacity_kw,
            assets: layout.assets.len(),
            road_segments: layout.roads.segments.len(),
        }
    }
}

#[derive(Serialize)]
struct ProgramSection {
    name: &'static str,
    version: &'static str,
    /// Short commit hash, suffixed `-dirty` for uncommitted changes
    git_commit: String,
    /// `debug` or `release`
    profile: &'static str,
    target: &'static str,
    rustc_version: &'static str,
}

impl ProgramSection {
    fn current() -> Self {
        let git_commit = match built_info::GIT_COMMIT_HASH_SHORT {
            Some(hash) if built_info::GIT_DIRTY == Some(true) => format!("{hash}-dirty"),
            Some(hash) => hash.to_string(),
            None => "unknown".to_string(),
        };

        Self {
            name: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            git_commit,
            profile: if built_info::DEBUG { "debug" } else { "release" },
            target: built_info::TARGET,
            rustc_version: built_info::RUSTC_VERSION,
        }
    }
}

#[derive(Serialize)]
struct PlatformSection {
    os: String,
    release: String,
    machine: String,
}

impl PlatformSection {
    fn current() -> Result<Self> {
        let info = PlatformInfo::new()
            .map_err(|err| anyhow!("{err}"))
            .context("Unable to determine platform info")?;

        Ok(Self {
            os: info.osname().to_string_lossy().into(),
            release: info.release().to_string_lossy().into(),
            machine: info.machine().to_string_lossy().into(),
        })
    }
}

/// Write `metadata.toml` for a finished run
pub fn write_metadata<'a, I>(
    output_path: &Path,
    run: &RunInfo,
    project: &Project,
    layouts: I,
) -> Result<()>
where
    I: IntoIterator<Item = &'a Layout>,
{
    let site = &project.site_data.site;
    let config = &project.config;
    let metadata = Metadata {
        run: RunSection {
            command: run.command,
            project_path: run.project_path,
            started: run.started.to_rfc3339_opts(SecondsFormat::Secs, false),
            finished: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            workers: run.workers,
        },
        site: SiteSection {
            id: site.id.as_str(),
            description: &site.description,
            area_ha: site.area.value() / 10_000.0,
            exclusion_zones: project.site_data.zones.len(),
            jurisdiction: config.jurisdiction.as_deref(),
            rule_overrides: config.rule_overrides.len(),
            target_capacity_kw: Kilowatts(config.target_capacity_kw),
        },
        program: ProgramSection::current(),
        platform: PlatformSection::current()?,
        layouts: layouts.into_iter().map(LayoutSection::from).collect(),
    };

    let file_path = output_path.join(METADATA_FILE_NAME);
    let contents = toml::to_string(&metadata).context("Could not convert metadata to TOML")?;
    fs::write(&file_path, contents)
        .with_context(|| format!("Failed to write {}", file_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::load_project;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn hillside_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/hillside")
    }

    #[test]
    fn test_write_metadata() {
        let project_path = hillside_dir();
        let project = load_project(&project_path).unwrap();
        let request = project.request();
        let layout = Layout::new(
            request.layout_id.clone(),
            project.site_data.site.id.clone(),
            Strategy::MinimizeEarthwork,
            request.target_capacity,
        );
        let run = RunInfo {
            command: "generate",
            project_path: &project_path,
            started: Local::now(),
            workers: 2,
        };

        let dir = tempdir().unwrap();
        write_metadata(dir.path(), &run, &project, [&layout]).unwrap();

        let contents = fs::read_to_string(dir.path().join(METADATA_FILE_NAME)).unwrap();
        let value: toml::Table = toml::from_str(&contents).unwrap();
        assert_eq!(value["run"]["command"].as_str(), Some("generate"));
        assert_eq!(value["run"]["workers"].as_integer(), Some(2));
        assert_eq!(value["site"]["jurisdiction"].as_str(), Some("ca"));
        assert_eq!(value["program"]["name"].as_str(), Some("sitelayout"));
        assert!(value["platform"]["os"].is_str());

        let layouts = value["layouts"].as_array().unwrap();
        assert_eq!(layouts.len(), 1);
        assert_eq!(layouts[0]["id"].as_str(), Some("hillside_v1"));
        assert_eq!(layouts[0]["strategy"].as_str(), Some("minimize_earthwork"));
        assert_eq!(layouts[0]["status"].as_str(), Some("queued"));
    }
}
