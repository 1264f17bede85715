//! Cut/fill estimates for asset pads and road segments.
//!
//! These are planning-grade figures obtained by integrating the difference between terrain and a
//! design surface over sampled areas; they are not a substitute for a construction survey.
use crate::asset::Asset;
use crate::geometry::{Footprint, sample_along};
use crate::terrain::TerrainModel;
use crate::units::CubicMeters;
use geo::{LineString, Point};
use serde::Deserialize;

/// Elevation differences smaller than this (in metres) are ignored
const MIN_DEPTH_M: f64 = 1e-3;

/// Cut and fill volumes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Earthwork {
    /// Material removed
    pub cut: CubicMeters,
    /// Material added
    pub fill: CubicMeters,
}

impl Earthwork {
    /// Cut minus fill
    pub fn net(&self) -> CubicMeters {
        self.cut - self.fill
    }

    /// Account for one sample of `depth_m` (terrain minus design) over `area_m2`
    fn add_sample(&mut self, depth_m: f64, area_m2: f64) {
        if depth_m > MIN_DEPTH_M {
            self.cut += CubicMeters(depth_m * area_m2);
        } else if depth_m < -MIN_DEPTH_M {
            self.fill += CubicMeters(-depth_m * area_m2);
        }
    }
}

impl std::ops::Add for Earthwork {
    type Output = Earthwork;

    fn add(self, rhs: Earthwork) -> Earthwork {
        Earthwork {
            cut: self.cut + rhs.cut,
            fill: self.fill + rhs.fill,
        }
    }
}

impl std::iter::Sum for Earthwork {
    fn sum<I: Iterator<Item = Earthwork>>(iter: I) -> Earthwork {
        iter.fold(Earthwork::default(), |acc, e| acc + e)
    }
}

/// How the design elevation of an asset pad is chosen
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PadGrade {
    /// Level the pad at the mean terrain elevation under the footprint
    #[default]
    MeanTerrain,
    /// Level the pad at a fixed elevation
    Fixed {
        /// Target elevation in metres
        elevation_m: f64,
    },
}

/// Parameters for earthwork estimation
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct EarthworkParameters {
    /// Pad design grade
    pub pad_grade: PadGrade,
    /// Side of the sub-cells used to integrate pad volumes
    pub pad_sample_m: f64,
    /// Distance between samples along a road
    pub road_sample_m: f64,
    /// Window of the moving average forming the road design profile
    pub profile_window_m: f64,
}

impl Default for EarthworkParameters {
    fn default() -> Self {
        Self {
            pad_grade: PadGrade::default(),
            pad_sample_m: 2.0,
            road_sample_m: 5.0,
            profile_window_m: 40.0,
        }
    }
}

/// The design elevation of a pad, or `None` if there's no terrain under the footprint
pub fn pad_design_elevation(
    terrain: &TerrainModel,
    footprint: &Footprint,
    params: &EarthworkParameters,
) -> Option<f64> {
    match params.pad_grade {
        PadGrade::Fixed { elevation_m } => Some(elevation_m),
        PadGrade::MeanTerrain => {
            let (sum, area) = footprint
                .sample_cells(params.pad_sample_m)
                .into_iter()
                .filter_map(|(p, a)| terrain.elevation_at(p).map(|z| (z * a, a)))
                .fold((0.0, 0.0), |(s, t), (z, a)| (s + z, t + a));
            (area > 0.0).then_some(sum / area)
        }
    }
}

/// Cut and fill to level a footprint at a design elevation.
///
/// Sub-cells with no terrain contribute nothing.
pub fn pad_earthwork(
    terrain: &TerrainModel,
    footprint: &Footprint,
    design_elevation_m: f64,
    params: &EarthworkParameters,
) -> Earthwork {
    let mut earthwork = Earthwork::default();
    for (point, area) in footprint.sample_cells(params.pad_sample_m) {
        if let Some(z) = terrain.elevation_at(point) {
            earthwork.add_sample(z - design_elevation_m, area);
        }
    }

    earthwork
}

/// Attach a graded pad and its earthwork to an asset
pub fn grade_asset(asset: &mut Asset, terrain: &TerrainModel, params: &EarthworkParameters) {
    let design =
        pad_design_elevation(terrain, &asset.footprint, params).unwrap_or(asset.elevation_m);
    asset.pad_elevation_m = design;
    asset.earthwork = pad_earthwork(terrain, &asset.footprint, design, params);
}

/// The sampled terrain profile along a line: `(distance, elevation)` pairs
pub fn terrain_profile(
    terrain: &TerrainModel,
    line: &LineString,
    step_m: f64,
) -> Vec<(f64, Option<f64>)> {
    sample_along(line, step_m)
        .into_iter()
        .map(|(d, c)| (d, terrain.elevation_at(Point::from(c))))
        .collect()
}

/// Moving-average design profile over the known samples of a terrain profile.
///
/// The window shrinks symmetrically towards the ends, so the road meets the terrain at both ends.
fn design_profile(profile: &[(f64, Option<f64>)], window_m: f64) -> Vec<Option<f64>> {
    let (Some(&(start, _)), Some(&(end, _))) = (profile.first(), profile.last()) else {
        return Vec::new();
    };

    profile
        .iter()
        .map(|&(d, z)| {
            z?;
            let half = (window_m / 2.0).min(d - start).min(end - d) + 1e-9;
            let (sum, n) = profile
                .iter()
                .filter(|(d2, _)| (d2 - d).abs() <= half)
                .filter_map(|(_, z2)| *z2)
                .fold((0.0, 0usize), |(s, n), z2| (s + z2, n + 1));
            Some(sum / n as f64)
        })
        .collect()
}

/// Cut and fill to bring a road of the given width onto a smoothed design profile
pub fn road_earthwork(
    terrain: &TerrainModel,
    line: &LineString,
    width_m: f64,
    params: &EarthworkParameters,
) -> Earthwork {
    let profile = terrain_profile(terrain, line, params.road_sample_m);
    let design = design_profile(&profile, params.profile_window_m);

    // Each sample represents half the distance to each neighbour
    let mut earthwork = Earthwork::default();
    for (i, (&(d, z), design_z)) in profile.iter().zip(&design).enumerate() {
        let (Some(z), Some(design_z)) = (z, design_z) else {
            continue;
        };
        let prev = if i > 0 { profile[i - 1].0 } else { d };
        let next = profile.get(i + 1).map_or(d, |s| s.0);
        let ds = (next - prev) / 2.0;
        earthwork.add_sample(z - design_z, width_m * ds);
    }

    earthwork
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{flat_terrain, hill_terrain, sloped_terrain};
    use float_cmp::assert_approx_eq;
    use geo::{line_string, point};
    use rstest::rstest;

    #[rstest]
    fn test_flat_pad_has_no_earthwork(flat_terrain: TerrainModel) {
        let params = EarthworkParameters::default();
        let footprint = Footprint::new(point! {x: 200.0, y: 200.0}, 60.0, 30.0, 90.0);
        let design = pad_design_elevation(&flat_terrain, &footprint, &params).unwrap();
        assert_approx_eq!(f64, design, 100.0, epsilon = 1e-9);
        assert_eq!(
            pad_earthwork(&flat_terrain, &footprint, design, &params),
            Earthwork::default()
        );
    }

    #[rstest]
    fn test_sloped_pad_balances(sloped_terrain: TerrainModel) {
        let params = EarthworkParameters::default();
        let footprint = Footprint::new(point! {x: 200.0, y: 200.0}, 20.0, 20.0, 0.0);
        let design = pad_design_elevation(&sloped_terrain, &footprint, &params).unwrap();
        let earthwork = pad_earthwork(&sloped_terrain, &footprint, design, &params);

        // A 10% plane under a 20 m square: mean depth on each half is 0.5 m over 200 m²
        assert_approx_eq!(f64, earthwork.cut.value(), 100.0, epsilon = 1e-6);
        assert_approx_eq!(f64, earthwork.fill.value(), 100.0, epsilon = 1e-6);
        assert_approx_eq!(f64, earthwork.net().value(), 0.0, epsilon = 1e-6);
    }

    #[rstest]
    fn test_fixed_pad_grade(flat_terrain: TerrainModel) {
        let params = EarthworkParameters {
            pad_grade: PadGrade::Fixed { elevation_m: 99.0 },
            ..Default::default()
        };
        let footprint = Footprint::new(point! {x: 200.0, y: 200.0}, 10.0, 10.0, 0.0);
        let design = pad_design_elevation(&flat_terrain, &footprint, &params).unwrap();
        let earthwork = pad_earthwork(&flat_terrain, &footprint, design, &params);
        assert_approx_eq!(f64, earthwork.cut.value(), 100.0, epsilon = 1e-6);
        assert_eq!(earthwork.fill, CubicMeters(0.0));
    }

    #[rstest]
    fn test_road_on_uniform_grade_needs_no_earthwork(sloped_terrain: TerrainModel) {
        let params = EarthworkParameters::default();
        let road = line_string![(x: 200.0, y: 50.0), (x: 200.0, y: 350.0)];

        // The moving average of a linear profile is the profile itself
        let earthwork = road_earthwork(&sloped_terrain, &road, 6.0, &params);
        assert!(earthwork.cut.value() < 1e-6);
        assert!(earthwork.fill.value() < 1e-6);
    }

    #[rstest]
    fn test_road_over_hill(hill_terrain: TerrainModel) {
        let params = EarthworkParameters::default();
        let road = line_string![(x: 50.0, y: 200.0), (x: 350.0, y: 200.0)];
        let earthwork = road_earthwork(&hill_terrain, &road, 6.0, &params);

        // The summit is cut down and the flanks filled
        assert!(earthwork.cut.value() > 0.0);
        assert!(earthwork.fill.value() > 0.0);
        assert_approx_eq!(
            f64,
            earthwork.net().value(),
            earthwork.cut.value() - earthwork.fill.value()
        );
    }

    #[rstest]
    fn test_off_grid_road(flat_terrain: TerrainModel) {
        let road = line_string![(x: -5000.0, y: 0.0), (x: -4000.0, y: 0.0)];
        assert_eq!(
            road_earthwork(&flat_terrain, &road, 6.0, &EarthworkParameters::default()),
            Earthwork::default()
        );
    }
}
