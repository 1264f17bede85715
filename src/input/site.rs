//! Code for reading the site boundary, terrain source and exclusion zones from `site.toml`.
use super::{input_err_msg, read_toml};
use crate::exclusion::{ExclusionZone, ZoneType};
use crate::geometry::LocalProjection;
use crate::id::{SiteID, ZoneID, check_unique_ids};
use crate::site::{Site, SiteData};
use crate::terrain::{
    DEFAULT_CELL_SIZE_M, ElevationGrid, ElevationProvider, Hill, InMemoryElevationProvider,
    LoggingElevationProvider, SyntheticElevationProvider,
};
use anyhow::{Context, Result, anyhow, ensure};
use geo::{Coord, LineString, Point, Polygon};
use itertools::Itertools;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const SITE_FILE_NAME: &str = "site.toml";

/// Default display colour for exclusion zones
const DEFAULT_ZONE_COLOR: &str = "#888888";

/// A lon/lat pair
type LonLat = [f64; 2];

fn default_cell_size() -> f64 {
    DEFAULT_CELL_SIZE_M
}

/// The contents of `site.toml`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SiteFile {
    id: SiteID,
    #[serde(default)]
    description: String,
    /// Boundary ring in lon/lat
    boundary: Vec<LonLat>,
    /// Where the access road network starts (snapped onto the boundary)
    entry_point: Option<LonLat>,
    terrain: TerrainConfig,
    #[serde(default, rename = "exclusion_zone")]
    zones: Vec<ZoneRaw>,
}

/// Where a site's elevation data comes from
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TerrainConfig {
    /// Analytic terrain: an inclined plane plus hills
    Synthetic {
        #[serde(default = "default_cell_size")]
        cell_size_m: f64,
        #[serde(default)]
        base_elevation_m: f64,
        #[serde(default)]
        gradient_east_pct: f64,
        #[serde(default)]
        gradient_north_pct: f64,
        #[serde(default, rename = "hill")]
        hills: Vec<Hill>,
    },
    /// A header-less CSV raster whose first row is the northernmost
    GridFile {
        /// Path relative to the project directory
        file: PathBuf,
        /// Lon/lat of the grid's south-west corner
        origin: LonLat,
        cell_size_m: f64,
    },
}

/// An exclusion zone as written in `site.toml`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ZoneRaw {
    id: ZoneID,
    zone_type: ZoneType,
    /// Outline in lon/lat
    boundary: Vec<LonLat>,
    #[serde(default)]
    buffer_m: f64,
    label: Option<String>,
    color: Option<String>,
}

/// The elevation source for a site
pub struct TerrainSource {
    /// Provides the site's elevation grid
    pub provider: Box<dyn ElevationProvider>,
    /// Cell size requested from the provider
    pub cell_size_m: f64,
}

fn lon_lat_polygon(ring: &[LonLat]) -> Polygon {
    let coords: Vec<_> = ring.iter().map(|&[x, y]| Coord { x, y }).collect();
    Polygon::new(LineString::from(coords), Vec::new())
}

/// Read a header-less CSV raster, returning it with row 0 as the southernmost row
fn read_grid_csv(file_path: &Path) -> Result<(usize, usize, Vec<f64>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| input_err_msg(file_path))?;
        let row: Vec<f64> = record
            .iter()
            .map(str::parse::<f64>)
            .try_collect()
            .with_context(|| format!("Invalid elevation on line {} of grid file", i + 1))
            .with_context(|| input_err_msg(file_path))?;
        rows.push(row);
    }

    ensure!(!rows.is_empty(), "Grid file {} is empty", file_path.display());
    let n_cols = rows[0].len();
    ensure!(
        rows.iter().all(|row| row.len() == n_cols),
        "Rows of grid file {} have different lengths",
        file_path.display()
    );

    // The file is written north to south
    let n_rows = rows.len();
    let elevations = rows.into_iter().rev().flatten().collect();

    Ok((n_cols, n_rows, elevations))
}

impl TerrainConfig {
    fn into_source(
        self,
        project_dir: &Path,
        site_id: &SiteID,
        projection: &LocalProjection,
    ) -> Result<TerrainSource> {
        let (provider, cell_size_m): (Box<dyn ElevationProvider>, f64) = match self {
            Self::Synthetic {
                cell_size_m,
                base_elevation_m,
                gradient_east_pct,
                gradient_north_pct,
                hills,
            } => {
                for hill in &hills {
                    ensure!(hill.radius_m > 0.0, "Hill radius must be positive");
                }
                let provider = SyntheticElevationProvider {
                    base_elevation_m,
                    gradient_east_pct,
                    gradient_north_pct,
                    hills,
                };
                (Box::new(provider), cell_size_m)
            }
            Self::GridFile {
                file,
                origin: [lon, lat],
                cell_size_m,
            } => {
                let file_path = project_dir.join(file);
                let (n_cols, n_rows, elevations) = read_grid_csv(&file_path)?;
                let origin = projection.to_local(Coord { x: lon, y: lat });
                let grid = ElevationGrid::new(origin, cell_size_m, n_cols, n_rows, elevations)
                    .map_err(|msg| anyhow!(msg))
                    .with_context(|| input_err_msg(&file_path))?;
                let provider = InMemoryElevationProvider::new();
                provider.insert(site_id.clone(), grid);
                (Box::new(provider), cell_size_m)
            }
        };

        ensure!(
            cell_size_m.is_finite() && cell_size_m > 0.0,
            "Terrain cell size must be a positive number"
        );

        Ok(TerrainSource {
            provider: Box::new(LoggingElevationProvider::new(provider)),
            cell_size_m,
        })
    }
}

impl ZoneRaw {
    fn into_zone(self, projection: &LocalProjection) -> Result<ExclusionZone> {
        let label = self.label.unwrap_or_else(|| self.id.to_string());
        let zone = ExclusionZone {
            geometry: projection.polygon_to_local(&lon_lat_polygon(&self.boundary)),
            id: self.id,
            zone_type: self.zone_type,
            buffer_m: self.buffer_m,
            label,
            color: self.color.unwrap_or_else(|| DEFAULT_ZONE_COLOR.into()),
        };
        zone.validate()?;

        Ok(zone)
    }
}

/// Read the site definition from `site.toml` in the project directory.
///
/// # Returns
///
/// The site, its exclusion zones (in local metres) and its terrain source.
pub fn read_site(project_dir: &Path) -> Result<(SiteData, TerrainSource)> {
    let file_path = project_dir.join(SITE_FILE_NAME);
    let raw: SiteFile = read_toml(&file_path)?;
    read_site_file(project_dir, raw).with_context(|| input_err_msg(&file_path))
}

fn read_site_file(project_dir: &Path, raw: SiteFile) -> Result<(SiteData, TerrainSource)> {
    let site = Site::from_geographic(
        raw.id,
        raw.description,
        &lon_lat_polygon(&raw.boundary),
        raw.entry_point.map(|[x, y]| Point::new(x, y)),
    )?;

    let zones: Vec<_> = raw
        .zones
        .into_iter()
        .map(|zone| zone.into_zone(&site.projection))
        .try_collect()?;
    check_unique_ids::<ZoneID, _, _>(&zones).context("Exclusion zone IDs must be unique")?;

    let terrain = raw
        .terrain
        .into_source(project_dir, &site.id, &site.projection)?;

    Ok((SiteData { site, zones }, terrain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::ElevationRequest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const SITE_TOML: &str = r##"
id = "test_site"
description = "A small test site"
boundary = [[-119.5, 36.2], [-119.495, 36.2], [-119.495, 36.204], [-119.5, 36.204]]
entry_point = [-119.4975, 36.1999]

[terrain]
kind = "synthetic"
base_elevation_m = 100.0
gradient_north_pct = 2.0

[[terrain.hill]]
x_m = 0.0
y_m = 0.0
height_m = 10.0
radius_m = 50.0

[[exclusion_zone]]
id = "pond"
zone_type = "wetland"
boundary = [[-119.499, 36.201], [-119.498, 36.201], [-119.498, 36.202]]
buffer_m = 10.0
"##;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        write!(file, "{contents}").unwrap();
    }

    fn fetch(site: &Site, terrain: &TerrainSource) -> ElevationGrid {
        terrain
            .provider
            .fetch_elevation(&ElevationRequest {
                site_id: site.id.clone(),
                bounds: site.bounds(),
                projection: site.projection,
                cell_size_m: terrain.cell_size_m,
            })
            .unwrap()
    }

    #[test]
    fn test_read_site() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), SITE_FILE_NAME, SITE_TOML);
        let (site_data, terrain) = read_site(dir.path()).unwrap();

        let site = &site_data.site;
        assert_eq!(site.id.as_str(), "test_site");
        assert!(site.area.value() > 100_000.0);
        // Entry point is snapped onto the southern edge
        let bounds = site.bounds();
        assert!((site.entry_point.y() - bounds.min().y).abs() < 1e-6);

        assert_eq!(site_data.zones.len(), 1);
        let zone = &site_data.zones[0];
        assert_eq!(zone.zone_type, ZoneType::Wetland);
        assert_eq!(zone.label, "pond");
        assert_eq!(zone.color, DEFAULT_ZONE_COLOR);

        assert_eq!(terrain.cell_size_m, DEFAULT_CELL_SIZE_M);
        let grid = fetch(site, &terrain);
        assert!(grid.covers(&site.bounds()));
    }

    #[test]
    fn test_read_site_grid_file() {
        let dir = tempdir().unwrap();
        let site_toml = r#"
id = "grid_site"
boundary = [[-119.5, 36.2], [-119.4995, 36.2], [-119.4995, 36.2004], [-119.5, 36.2004]]

[terrain]
kind = "grid_file"
file = "elevation.csv"
origin = [-119.5005, 36.1995]
cell_size_m = 50.0
"#;
        write_file(dir.path(), SITE_FILE_NAME, site_toml);
        // North row first
        write_file(
            dir.path(),
            "elevation.csv",
            "130,130,130,130\n120,120,120,120\n110,110,110,110\n100,100,100,100\n",
        );

        let (site_data, terrain) = read_site(dir.path()).unwrap();
        let grid = fetch(&site_data.site, &terrain);
        assert_eq!((grid.n_cols, grid.n_rows), (4, 4));
        assert_eq!(grid.get(0, 0), 100.0);
        assert_eq!(grid.get(3, 3), 130.0);
    }

    #[test]
    fn test_read_site_ragged_grid() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "elevation.csv", "1,2,3\n4,5\n");
        assert!(read_grid_csv(&dir.path().join("elevation.csv")).is_err());
    }

    #[test]
    fn test_read_site_duplicate_zones() {
        let dir = tempdir().unwrap();
        let zone = SITE_TOML
            .split("[[exclusion_zone]]")
            .nth(1)
            .unwrap()
            .to_string();
        let contents = format!("{SITE_TOML}\n[[exclusion_zone]]{zone}");
        write_file(dir.path(), SITE_FILE_NAME, &contents);
        let Err(err) = read_site(dir.path()) else {
            panic!("expected read_site to fail");
        };
        let messages: Vec<_> = err.chain().map(ToString::to_string).collect();
        assert_eq!(
            messages[1..],
            ["Exclusion zone IDs must be unique", "Duplicate ID found: pond"]
        );
    }
}
