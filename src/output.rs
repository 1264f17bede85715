//! The module responsible for writing output data to disk.
use crate::compliance::Violation;
use crate::geometry::LocalProjection;
use crate::id::{AssetID, LayoutID, RoadID, SiteID};
use crate::layout::{FailureReason, Layout, LayoutStatus};
use crate::publish::LayoutPublisher;
use crate::site::SiteData;
use crate::strategy::Strategy;
use crate::variants::VariantComparison;
use anyhow::{Context, Result, ensure};
use geo::{LineString, Polygon};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which project-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "sitelayout_results";

/// The output file name for layout summaries
const LAYOUTS_FILE_NAME: &str = "layouts.csv";

/// The output file name for placed assets
const ASSETS_FILE_NAME: &str = "assets.csv";

/// The output file name for road segments
const ROADS_FILE_NAME: &str = "roads.csv";

/// The output file name for the variant comparison
const VARIANT_COMPARISON_FILE_NAME: &str = "variant_comparison.csv";

/// The output file name for compliance violations
const VIOLATIONS_FILE_NAME: &str = "violations.csv";

/// Decimal places for longitude and latitude (about 1 cm)
const WKT_PRECISION: usize = 7;

/// Get the default output directory for the project at `project_dir`
pub fn get_output_dir(project_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let project_dir = project_dir
        .canonicalize()
        .context("Could not resolve path to project")?;

    let project_name = project_dir
        .file_name()
        .context("Project cannot be in root folder")?
        .to_str()
        .context("Invalid chars in project dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, project_name].iter().collect())
}

/// Create a new output directory, deleting the old one if `allow_overwrite` is set.
///
/// Returns whether an existing, non-empty directory was overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Empty folder
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Format a sequence of lon/lat coordinates for WKT
fn wkt_coords<'a, I>(coords: I) -> String
where
    I: IntoIterator<Item = &'a geo::Coord>,
{
    coords
        .into_iter()
        .map(|c| format!("{:.p$} {:.p$}", c.x, c.y, p = WKT_PRECISION))
        .join(", ")
}

/// WKT for a polygon's exterior ring in lon/lat
fn polygon_wkt(projection: &LocalProjection, polygon: &Polygon) -> String {
    let polygon = projection.polygon_to_geographic(polygon);
    format!("POLYGON (({}))", wkt_coords(polygon.exterior()))
}

/// WKT for a line in lon/lat
fn line_string_wkt(projection: &LocalProjection, line: &LineString) -> String {
    let line = projection.line_string_to_geographic(line);
    format!("LINESTRING ({})", wkt_coords(&line))
}

/// Represents a row in the layouts CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct LayoutRow {
    layout_id: LayoutID,
    site_id: SiteID,
    strategy: Strategy,
    status: LayoutStatus,
    target_capacity_kw: f64,
    total_capacity_kw: f64,
    achieved_fraction: f64,
    asset_count: usize,
    low_suitability_assets: usize,
    cut_volume_m3: f64,
    fill_volume_m3: f64,
    net_earthwork_m3: f64,
    road_length_m: f64,
    max_road_grade_pct: f64,
    over_grade_segments: usize,
    failure_reason: Option<FailureReason>,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl LayoutRow {
    fn new(layout: &Layout) -> Self {
        let m = &layout.metrics;
        Self {
            layout_id: layout.id.clone(),
            site_id: layout.site_id.clone(),
            strategy: layout.strategy,
            status: layout.status(),
            target_capacity_kw: layout.target_capacity.value(),
            total_capacity_kw: m.total_capacity_kw.value(),
            achieved_fraction: m.achieved_fraction,
            asset_count: m.asset_count,
            low_suitability_assets: m.low_suitability_assets,
            cut_volume_m3: m.cut_volume_m3.value(),
            fill_volume_m3: m.fill_volume_m3.value(),
            net_earthwork_m3: m.net_earthwork_m3.value(),
            road_length_m: m.road_length_m.value(),
            max_road_grade_pct: m.max_road_grade_pct,
            over_grade_segments: m.over_grade_segments,
            failure_reason: layout.failure_reason,
            error_message: layout.error_message.clone(),
            created_at: layout.created_at.to_rfc3339(),
            updated_at: layout.updated_at.to_rfc3339(),
        }
    }
}

/// Represents a row in the assets CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct AssetRow {
    layout_id: LayoutID,
    asset_id: AssetID,
    kind: String,
    capacity_kw: f64,
    longitude: f64,
    latitude: f64,
    rotation_deg: f64,
    elevation_m: f64,
    slope_deg: f64,
    aspect_deg: Option<f64>,
    suitability: f64,
    low_suitability: bool,
    pad_elevation_m: f64,
    cut_m3: f64,
    fill_m3: f64,
    geometry: String,
}

/// Represents a row in the roads CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct RoadRow {
    layout_id: LayoutID,
    road_id: RoadID,
    from: String,
    to: String,
    length_m: f64,
    width_m: f64,
    max_grade_pct: f64,
    over_grade_limit: bool,
    detoured: bool,
    cut_m3: f64,
    fill_m3: f64,
    geometry: String,
}

/// Represents a row in the violations CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ViolationRow {
    layout_id: LayoutID,
    rule_type: String,
    jurisdiction: String,
    entity: String,
    measured: f64,
    threshold: f64,
    severity: String,
    message: String,
}

/// Writes layouts, their assets and their roads to CSV files in an output folder
pub struct CsvPublisher {
    layouts_writer: csv::Writer<File>,
    assets_writer: csv::Writer<File>,
    roads_writer: csv::Writer<File>,
}

impl CsvPublisher {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    pub fn create(output_path: &Path) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(&file_path)
                .with_context(|| format!("Could not create {}", file_path.display()))
        };

        Ok(Self {
            layouts_writer: new_writer(LAYOUTS_FILE_NAME)?,
            assets_writer: new_writer(ASSETS_FILE_NAME)?,
            roads_writer: new_writer(ROADS_FILE_NAME)?,
        })
    }
}

impl LayoutPublisher for CsvPublisher {
    fn publish(&mut self, site_data: &SiteData, layout: &Layout) -> Result<()> {
        let projection = &site_data.site.projection;
        self.layouts_writer.serialize(LayoutRow::new(layout))?;

        for asset in &layout.assets {
            let position = projection.point_to_geographic(asset.position());
            self.assets_writer.serialize(AssetRow {
                layout_id: layout.id.clone(),
                asset_id: asset.id.clone(),
                kind: asset.kind.to_string(),
                capacity_kw: asset.capacity.value(),
                longitude: position.x(),
                latitude: position.y(),
                rotation_deg: asset.rotation_deg(),
                elevation_m: asset.elevation_m,
                slope_deg: asset.slope_deg,
                aspect_deg: asset.aspect_deg,
                suitability: asset.suitability,
                low_suitability: asset.low_suitability,
                pad_elevation_m: asset.pad_elevation_m,
                cut_m3: asset.earthwork.cut.value(),
                fill_m3: asset.earthwork.fill.value(),
                geometry: polygon_wkt(projection, &asset.polygon),
            })?;
        }

        for segment in &layout.roads.segments {
            self.roads_writer.serialize(RoadRow {
                layout_id: layout.id.clone(),
                road_id: segment.id.clone(),
                from: segment.from.to_string(),
                to: segment.to.to_string(),
                length_m: segment.length.value(),
                width_m: segment.width_m,
                max_grade_pct: segment.max_grade_pct,
                over_grade_limit: segment.over_grade_limit,
                detoured: segment.detoured,
                cut_m3: segment.earthwork.cut.value(),
                fill_m3: segment.earthwork.fill.value(),
                geometry: line_string_wkt(projection, &segment.geometry),
            })?;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.layouts_writer.flush()?;
        self.assets_writer.flush()?;
        self.roads_writer.flush()?;

        Ok(())
    }
}

/// Write the comparison of a set of variants to `variant_comparison.csv`.
///
/// One row per variant, with flags marking the best variant for each metric.
pub fn write_variant_comparison(output_path: &Path, comparison: &VariantComparison) -> Result<()> {
    #[derive(Serialize)]
    struct Flags {
        best_capacity: bool,
        best_earthwork: bool,
        best_road_network: bool,
    }

    let file_path = output_path.join(VARIANT_COMPARISON_FILE_NAME);
    let mut writer = csv::Writer::from_path(&file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    let is_best = |best: &Option<LayoutID>, id: &LayoutID| best.as_ref() == Some(id);
    for row in &comparison.rows {
        let flags = Flags {
            best_capacity: is_best(&comparison.best_capacity_id, &row.layout_id),
            best_earthwork: is_best(&comparison.best_earthwork_id, &row.layout_id),
            best_road_network: is_best(&comparison.best_road_network_id, &row.layout_id),
        };
        writer.serialize((row, flags))?;
    }
    writer.flush()?;

    Ok(())
}

/// Write compliance violations for one or more layouts to `violations.csv`
pub fn write_violations<'a, I>(output_path: &Path, violations: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a LayoutID, &'a Violation)>,
{
    let file_path = output_path.join(VIOLATIONS_FILE_NAME);
    let mut writer = csv::Writer::from_path(&file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    for (layout_id, v) in violations {
        writer.serialize(ViolationRow {
            layout_id: layout_id.clone(),
            rule_type: v.rule_type.to_string(),
            jurisdiction: v.jurisdiction.to_string(),
            entity: v.entity.to_string(),
            measured: v.measured,
            threshold: v.threshold,
            severity: v.severity.to_string(),
            message: v.message.clone(),
        })?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::{Entity, RuleType, Severity};
    use crate::fixture::{flat_engine, flat_site, request};
    use crate::generation::{CancellationToken, GenerationRequest, LayoutEngine};
    use crate::variants::{LayoutVariant, VariantComparison};
    use rstest::rstest;
    use std::io::Write;
    use tempfile::tempdir;

    fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
        csv::Reader::from_path(path)
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap()
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results");

        // New folder
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());

        // Empty folder is reused
        assert!(!create_output_directory(&output_dir, false).unwrap());

        // Non-empty folder requires overwrite
        {
            let mut file = File::create(output_dir.join("file.txt")).unwrap();
            writeln!(file, "contents").unwrap();
        }
        assert!(create_output_directory(&output_dir, false).is_err());
        assert!(create_output_directory(&output_dir, true).unwrap());
        assert!(!output_dir.join("file.txt").exists());
    }

    #[test]
    fn test_wkt() {
        let projection = LocalProjection::new(geo::coord! {x: 0.0, y: 0.0});
        let line = LineString::from(vec![(0.0, 0.0), (0.0, 0.0)]);
        assert_eq!(
            line_string_wkt(&projection, &line),
            "LINESTRING (0.0000000 0.0000000, 0.0000000 0.0000000)"
        );
    }

    #[rstest]
    fn test_csv_publisher(
        flat_engine: LayoutEngine,
        flat_site: SiteData,
        request: GenerationRequest,
    ) {
        let layout = flat_engine.generate(
            &flat_site,
            &request,
            Strategy::Balanced,
            &CancellationToken::new(),
        );
        let dir = tempdir().unwrap();
        {
            let mut publisher = CsvPublisher::create(dir.path()).unwrap();
            publisher.publish(&flat_site, &layout).unwrap();
            publisher.flush().unwrap();
        }

        let layouts: Vec<LayoutRow> = read_rows(&dir.path().join(LAYOUTS_FILE_NAME));
        assert_eq!(layouts, [LayoutRow::new(&layout)]);

        let assets: Vec<AssetRow> = read_rows(&dir.path().join(ASSETS_FILE_NAME));
        assert_eq!(assets.len(), layout.assets.len());
        for row in &assets {
            assert!(row.geometry.starts_with("POLYGON (("));
            assert!((row.longitude + 119.5).abs() < 0.01);
            assert!((row.latitude - 36.2).abs() < 0.01);
        }

        let roads: Vec<RoadRow> = read_rows(&dir.path().join(ROADS_FILE_NAME));
        assert_eq!(roads.len(), layout.roads.segments.len());
        assert_eq!(roads[0].from, "entry");
    }

    #[rstest]
    fn test_write_variant_comparison(
        flat_engine: LayoutEngine,
        flat_site: SiteData,
        request: GenerationRequest,
    ) {
        let layout = flat_engine.generate(
            &flat_site,
            &request,
            Strategy::Balanced,
            &CancellationToken::new(),
        );
        let variants = [LayoutVariant {
            strategy: Strategy::Balanced,
            layout,
        }];
        let comparison = VariantComparison::compare(&variants);

        let dir = tempdir().unwrap();
        write_variant_comparison(dir.path(), &comparison).unwrap();
        let contents = fs::read_to_string(dir.path().join(VARIANT_COMPARISON_FILE_NAME)).unwrap();
        let mut lines = contents.lines();
        assert!(lines.next().unwrap().ends_with("best_capacity,best_earthwork,best_road_network"));
        assert!(lines.next().unwrap().ends_with("true,true,true"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_write_violations() {
        let layout_id: LayoutID = "layout1".into();
        let violation = Violation {
            rule_type: RuleType::Setback,
            jurisdiction: "ca".into(),
            entity: Entity::Asset("solar-001".into()),
            measured: 12.5,
            threshold: 30.0,
            severity: Severity::Error,
            message: "asset solar-001 is too close to the site boundary".into(),
        };

        let dir = tempdir().unwrap();
        write_violations(dir.path(), [(&layout_id, &violation)]).unwrap();
        let rows: Vec<ViolationRow> = read_rows(&dir.path().join(VIOLATIONS_FILE_NAME));
        assert_eq!(
            rows,
            [ViolationRow {
                layout_id,
                rule_type: "setback".into(),
                jurisdiction: "ca".into(),
                entity: "asset solar-001".into(),
                measured: 12.5,
                threshold: 30.0,
                severity: "error".into(),
                message: "asset solar-001 is too close to the site boundary".into(),
            }]
        );
    }
}
