//! The terrain model: an elevation grid over a site with derived slope and aspect layers.
use crate::asset::AssetTypeSpec;
use crate::error::EngineError;
use crate::geometry::angular_distance;
use crate::id::SiteID;
use crate::site::Site;
use geo::{Contains, Coord, Point, Rect};

pub mod provider;
pub use provider::{
    ElevationProvider, ElevationRequest, Hill, InMemoryElevationProvider,
    LoggingElevationProvider, SyntheticElevationProvider, UnavailableElevationProvider,
};
pub mod store;
pub use store::TerrainStore;

/// Gradient magnitudes (rise over run) below this are considered flat, giving no aspect
pub const FLAT_GRADIENT_EPSILON: f64 = 1e-4;

/// The default terrain cell size in metres
pub const DEFAULT_CELL_SIZE_M: f64 = 5.0;

/// Tolerance when checking that a grid covers a site
const COVERAGE_TOLERANCE_M: f64 = 1e-6;

/// A regular grid of elevations sampled at cell centres.
///
/// Row 0 is the southernmost row and column 0 the westernmost column.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationGrid {
    /// South-west corner of the grid in local metres
    pub origin: Coord,
    /// Length of a cell side in metres
    pub cell_size_m: f64,
    /// Number of columns (west to east)
    pub n_cols: usize,
    /// Number of rows (south to north)
    pub n_rows: usize,
    /// Elevations in metres, row-major
    pub elevations: Vec<f64>,
}

impl ElevationGrid {
    /// Create a new grid, checking its dimensions and values
    pub fn new(
        origin: Coord,
        cell_size_m: f64,
        n_cols: usize,
        n_rows: usize,
        elevations: Vec<f64>,
    ) -> Result<Self, String> {
        if !(cell_size_m.is_finite() && cell_size_m > 0.0) {
            return Err(format!("Invalid cell size: {cell_size_m}"));
        }
        if n_cols == 0 || n_rows == 0 {
            return Err("Elevation grid is empty".into());
        }
        if elevations.len() != n_cols * n_rows {
            return Err(format!(
                "Expected {} elevation values for a {n_cols}x{n_rows} grid, found {}",
                n_cols * n_rows,
                elevations.len()
            ));
        }
        if elevations.iter().any(|z| !z.is_finite()) {
            return Err("Elevation grid contains non-finite values".into());
        }

        Ok(Self {
            origin,
            cell_size_m,
            n_cols,
            n_rows,
            elevations,
        })
    }

    /// Build a grid covering `bounds` (plus a one-cell margin) by evaluating a function at each
    /// cell centre
    pub fn from_fn<F>(bounds: Rect, cell_size_m: f64, f: F) -> Self
    where
        F: Fn(Coord) -> f64,
    {
        let origin = Coord {
            x: bounds.min().x - cell_size_m,
            y: bounds.min().y - cell_size_m,
        };
        let n_cols = (bounds.width() / cell_size_m).ceil() as usize + 2;
        let n_rows = (bounds.height() / cell_size_m).ceil() as usize + 2;
        let mut elevations = Vec::with_capacity(n_cols * n_rows);
        for row in 0..n_rows {
            for col in 0..n_cols {
                elevations.push(f(cell_center(origin, cell_size_m, col, row)));
            }
        }

        Self {
            origin,
            cell_size_m,
            n_cols,
            n_rows,
            elevations,
        }
    }

    /// The elevation of a cell
    pub fn get(&self, col: usize, row: usize) -> f64 {
        self.elevations[row * self.n_cols + col]
    }

    /// The area covered by the grid cells
    pub fn extent(&self) -> Rect {
        Rect::new(
            self.origin,
            Coord {
                x: self.origin.x + self.n_cols as f64 * self.cell_size_m,
                y: self.origin.y + self.n_rows as f64 * self.cell_size_m,
            },
        )
    }

    /// Whether the grid extent covers a rectangle
    pub fn covers(&self, rect: &Rect) -> bool {
        let extent = self.extent();
        extent.min().x <= rect.min().x + COVERAGE_TOLERANCE_M
            && extent.min().y <= rect.min().y + COVERAGE_TOLERANCE_M
            && extent.max().x >= rect.max().x - COVERAGE_TOLERANCE_M
            && extent.max().y >= rect.max().y - COVERAGE_TOLERANCE_M
    }
}

/// Centre of a grid cell
fn cell_center(origin: Coord, cell_size_m: f64, col: usize, row: usize) -> Coord {
    Coord {
        x: origin.x + (col as f64 + 0.5) * cell_size_m,
        y: origin.y + (row as f64 + 0.5) * cell_size_m,
    }
}

/// Terrain properties at a point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainSample {
    /// Interpolated elevation in metres
    pub elevation_m: f64,
    /// Slope of the nearest cell in degrees
    pub slope_deg: f64,
    /// Aspect of the nearest cell (compass bearing of steepest descent), `None` if flat
    pub aspect_deg: Option<f64>,
    /// Whether the nearest cell centre lies within the site boundary
    pub on_site: bool,
}

/// Elevation, slope and aspect layers for one site.
///
/// Built once per site and shared read-only between generations.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainModel {
    /// The site this terrain belongs to
    pub site_id: SiteID,
    grid: ElevationGrid,
    slope_deg: Vec<f64>,
    aspect_deg: Vec<Option<f64>>,
    on_site: Vec<bool>,
}

impl TerrainModel {
    /// Derive slope, aspect and the on-site mask from an elevation grid.
    ///
    /// Fails with [`EngineError::TerrainUnavailable`] if the grid doesn't cover the site.
    pub fn build(site: &Site, grid: ElevationGrid) -> Result<Self, EngineError> {
        if !grid.covers(&site.bounds()) {
            return Err(EngineError::terrain_unavailable(
                &site.id,
                "elevation grid does not cover the site boundary",
            ));
        }

        let n_cells = grid.n_cols * grid.n_rows;
        let mut slope_deg = Vec::with_capacity(n_cells);
        let mut aspect_deg = Vec::with_capacity(n_cells);
        let mut on_site = Vec::with_capacity(n_cells);
        for row in 0..grid.n_rows {
            for col in 0..grid.n_cols {
                let (dzdx, dzdy) = gradient(&grid, col, row);
                let magnitude = dzdx.hypot(dzdy);
                slope_deg.push(magnitude.atan().to_degrees());

                // Downslope is the negative gradient; bearings are measured clockwise from north
                aspect_deg.push((magnitude >= FLAT_GRADIENT_EPSILON).then(|| {
                    crate::geometry::normalise_bearing((-dzdx).atan2(-dzdy).to_degrees())
                }));

                let center = Point::from(cell_center(grid.origin, grid.cell_size_m, col, row));
                on_site.push(site.boundary.contains(&center));
            }
        }

        Ok(Self {
            site_id: site.id.clone(),
            grid,
            slope_deg,
            aspect_deg,
            on_site,
        })
    }

    /// The underlying elevation grid
    pub fn grid(&self) -> &ElevationGrid {
        &self.grid
    }

    /// Length of a cell side in metres
    pub fn cell_size_m(&self) -> f64 {
        self.grid.cell_size_m
    }

    /// Number of columns in the grid
    pub fn n_cols(&self) -> usize {
        self.grid.n_cols
    }

    /// Number of rows in the grid
    pub fn n_rows(&self) -> usize {
        self.grid.n_rows
    }

    fn index(&self, col: usize, row: usize) -> usize {
        row * self.grid.n_cols + col
    }

    /// The centre of a cell in local metres
    pub fn cell_center(&self, col: usize, row: usize) -> Point {
        Point::from(cell_center(
            self.grid.origin,
            self.grid.cell_size_m,
            col,
            row,
        ))
    }

    /// The cell containing a point, if the point is on the grid
    pub fn cell_at(&self, point: Point) -> Option<(usize, usize)> {
        let fx = (point.x() - self.grid.origin.x) / self.grid.cell_size_m;
        let fy = (point.y() - self.grid.origin.y) / self.grid.cell_size_m;
        if fx < 0.0 || fy < 0.0 {
            return None;
        }

        let (col, row) = (fx.floor() as usize, fy.floor() as usize);
        (col < self.grid.n_cols && row < self.grid.n_rows).then_some((col, row))
    }

    /// Elevation at a cell centre
    pub fn elevation(&self, col: usize, row: usize) -> f64 {
        self.grid.get(col, row)
    }

    /// Slope of a cell in degrees
    pub fn slope(&self, col: usize, row: usize) -> f64 {
        self.slope_deg[self.index(col, row)]
    }

    /// Aspect of a cell, `None` if flat
    pub fn aspect(&self, col: usize, row: usize) -> Option<f64> {
        self.aspect_deg[self.index(col, row)]
    }

    /// Whether the cell centre is inside the site boundary
    pub fn is_on_site(&self, col: usize, row: usize) -> bool {
        self.on_site[self.index(col, row)]
    }

    /// Bilinearly interpolated elevation at a point, `None` if the point is off the grid
    pub fn elevation_at(&self, point: Point) -> Option<f64> {
        self.cell_at(point)?;

        let g = &self.grid;
        let max_col = (g.n_cols - 1) as f64;
        let max_row = (g.n_rows - 1) as f64;
        let fx = ((point.x() - g.origin.x) / g.cell_size_m - 0.5).clamp(0.0, max_col);
        let fy = ((point.y() - g.origin.y) / g.cell_size_m - 0.5).clamp(0.0, max_row);
        let (c0, r0) = (fx.floor() as usize, fy.floor() as usize);
        let (c1, r1) = ((c0 + 1).min(g.n_cols - 1), (r0 + 1).min(g.n_rows - 1));
        let (tx, ty) = (fx - c0 as f64, fy - r0 as f64);

        let south = g.get(c0, r0) * (1.0 - tx) + g.get(c1, r0) * tx;
        let north = g.get(c0, r1) * (1.0 - tx) + g.get(c1, r1) * tx;
        Some(south * (1.0 - ty) + north * ty)
    }

    /// Terrain properties at a point, `None` if the point is off the grid
    pub fn sample(&self, point: Point) -> Option<TerrainSample> {
        let (col, row) = self.cell_at(point)?;
        Some(TerrainSample {
            elevation_m: self.elevation_at(point)?,
            slope_deg: self.slope(col, row),
            aspect_deg: self.aspect(col, row),
            on_site: self.is_on_site(col, row),
        })
    }
}

/// Elevation gradient (dz/dx, dz/dy) of a cell by finite differences.
///
/// Central differences in the interior, one-sided differences at the grid edges.
fn gradient(grid: &ElevationGrid, col: usize, row: usize) -> (f64, f64) {
    let diff = |lo: f64, hi: f64, steps: usize| {
        if steps == 0 {
            0.0
        } else {
            (hi - lo) / (steps as f64 * grid.cell_size_m)
        }
    };

    let (c_lo, c_hi) = (col.saturating_sub(1), (col + 1).min(grid.n_cols - 1));
    let (r_lo, r_hi) = (row.saturating_sub(1), (row + 1).min(grid.n_rows - 1));
    let dzdx = diff(grid.get(c_lo, row), grid.get(c_hi, row), c_hi - c_lo);
    let dzdy = diff(grid.get(col, r_lo), grid.get(col, r_hi), r_hi - r_lo);

    (dzdx, dzdy)
}

/// Relative weights of the terms in the suitability score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuitabilityWeights {
    /// Weight of the slope-tolerance fit
    pub slope: f64,
    /// Weight of the aspect-preference fit
    pub aspect: f64,
    /// Exponent applied to the slope fit; values above one favour near-flat ground more strongly
    pub slope_exponent: f64,
}

impl Default for SuitabilityWeights {
    fn default() -> Self {
        Self {
            slope: 0.7,
            aspect: 0.3,
            slope_exponent: 1.0,
        }
    }
}

/// The suitability (0 to 1) of terrain for an asset type.
///
/// The slope fit decays linearly from 1 at 0° to 0 at the type's maximum slope (raised to
/// `slope_exponent`); the aspect fit decays linearly with angular distance from the preferred
/// aspect and is 1 where the type has no preference or the ground is flat. Excluded locations and
/// slopes at or beyond the tolerance score 0.
pub fn suitability(
    sample: &TerrainSample,
    spec: &AssetTypeSpec,
    weights: &SuitabilityWeights,
    excluded: bool,
) -> f64 {
    if excluded || sample.slope_deg >= spec.max_slope_deg {
        return 0.0;
    }

    let slope_fit = (1.0 - sample.slope_deg / spec.max_slope_deg)
        .max(0.0)
        .powf(weights.slope_exponent);
    let aspect_fit = match (spec.preferred_aspect_deg, sample.aspect_deg) {
        (Some(preferred), Some(aspect)) => 1.0 - angular_distance(preferred, aspect) / 180.0,
        _ => 1.0,
    };

    let total_weight = weights.slope + weights.aspect;
    if total_weight <= 0.0 {
        return slope_fit;
    }

    ((weights.slope * slope_fit + weights.aspect * aspect_fit) / total_weight).clamp(0.0, 1.0)
}
