//! Geometric helpers shared by the layout engine.
//!
//! Sites arrive as WGS84 lon/lat polygons. All engine computations happen in a local metric frame
//! (metres east and north of an origin near the site) produced by [`LocalProjection`]; results are
//! converted back to lon/lat only at the output boundary.
use geo::{
    Closest, ClosestPoint, Coord, Densify, EuclideanDistance, EuclideanLength, LineString,
    MapCoords, Point, Polygon,
};

/// Segments shorter than this are treated as a repeated vertex
const GEOMETRY_EPSILON: f64 = 1e-9;

/// Smallest spacing used when sampling along a line
const MIN_SAMPLE_STEP_M: f64 = 0.01;

/// An equirectangular projection between lon/lat and a local east/north frame in metres.
///
/// Accurate to well under a metre over the few kilometres spanned by a typical site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    /// Longitude/latitude of the local origin
    origin: Coord,
    /// Metres per degree of longitude at the origin latitude
    m_per_deg_lon: f64,
    /// Metres per degree of latitude at the origin latitude
    m_per_deg_lat: f64,
}

impl LocalProjection {
    /// Create a projection centred on the given lon/lat coordinate
    pub fn new(origin: Coord) -> Self {
        let phi = origin.y.to_radians();
        let m_per_deg_lat =
            111_132.92 - 559.82 * (2.0 * phi).cos() + 1.175 * (4.0 * phi).cos();
        let m_per_deg_lon = 111_412.84 * phi.cos() - 93.5 * (3.0 * phi).cos();

        Self {
            origin,
            m_per_deg_lon,
            m_per_deg_lat,
        }
    }

    /// The lon/lat origin of the local frame
    pub fn origin(&self) -> Coord {
        self.origin
    }

    /// Convert a lon/lat coordinate to local metres
    pub fn to_local(&self, lonlat: Coord) -> Coord {
        Coord {
            x: (lonlat.x - self.origin.x) * self.m_per_deg_lon,
            y: (lonlat.y - self.origin.y) * self.m_per_deg_lat,
        }
    }

    /// Convert a local coordinate in metres to lon/lat
    pub fn to_geographic(&self, local: Coord) -> Coord {
        Coord {
            x: self.origin.x + local.x / self.m_per_deg_lon,
            y: self.origin.y + local.y / self.m_per_deg_lat,
        }
    }

    /// Convert a lon/lat polygon to local metres
    pub fn polygon_to_local(&self, polygon: &Polygon) -> Polygon {
        polygon.map_coords(|c| self.to_local(c))
    }

    /// Convert a local polygon to lon/lat
    pub fn polygon_to_geographic(&self, polygon: &Polygon) -> Polygon {
        polygon.map_coords(|c| self.to_geographic(c))
    }

    /// Convert a local line string to lon/lat
    pub fn line_string_to_geographic(&self, line: &LineString) -> LineString {
        line.map_coords(|c| self.to_geographic(c))
    }

    /// Convert a local point to lon/lat
    pub fn point_to_geographic(&self, point: Point) -> Point {
        Point::from(self.to_geographic(point.0))
    }
}

/// Normalise a compass bearing into `[0, 360)`
pub fn normalise_bearing(bearing_deg: f64) -> f64 {
    let b = bearing_deg.rem_euclid(360.0);
    if b >= 360.0 { 0.0 } else { b }
}

/// The smallest angle between two compass bearings, in `[0, 180]`
pub fn angular_distance(a_deg: f64, b_deg: f64) -> f64 {
    let diff = normalise_bearing(a_deg - b_deg);
    diff.min(360.0 - diff)
}

/// Unit vector (east, north) for a compass bearing
pub fn bearing_vector(bearing_deg: f64) -> (f64, f64) {
    let rad = bearing_deg.to_radians();
    (rad.sin(), rad.cos())
}

/// Euclidean distance between two coordinates
pub fn distance(a: Coord, b: Coord) -> f64 {
    Point::from(a).euclidean_distance(&Point::from(b))
}

/// A rotated rectangular footprint.
///
/// `bearing_deg` is the compass bearing of the long (`length_m`) axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    /// Centre of the rectangle
    pub center: Point,
    /// Extent along the bearing
    pub length_m: f64,
    /// Extent across the bearing
    pub width_m: f64,
    /// Compass bearing of the long axis
    pub bearing_deg: f64,
}

impl Footprint {
    /// Create a new footprint
    pub fn new(center: Point, length_m: f64, width_m: f64, bearing_deg: f64) -> Self {
        Self {
            center,
            length_m,
            width_m,
            bearing_deg: normalise_bearing(bearing_deg),
        }
    }

    /// Map rectangle-frame offsets (along, across) to a world coordinate
    fn to_world(&self, along: f64, across: f64) -> Coord {
        let (ax, ay) = bearing_vector(self.bearing_deg);
        // The across axis is the long axis rotated 90° clockwise
        let (cx, cy) = (ay, -ax);
        Coord {
            x: self.center.x() + along * ax + across * cx,
            y: self.center.y() + along * ay + across * cy,
        }
    }

    /// The footprint as a polygon
    pub fn polygon(&self) -> Polygon {
        let hl = self.length_m / 2.0;
        let hw = self.width_m / 2.0;
        let ring = vec![
            self.to_world(-hl, -hw),
            self.to_world(hl, -hw),
            self.to_world(hl, hw),
            self.to_world(-hl, hw),
        ];

        Polygon::new(LineString::from(ring), vec![])
    }

    /// Half the diagonal: the radius of the smallest circle around the centre containing the footprint
    pub fn half_diagonal(&self) -> f64 {
        self.length_m.hypot(self.width_m) / 2.0
    }

    /// Area of the footprint in square metres
    pub fn area_m2(&self) -> f64 {
        self.length_m * self.width_m
    }

    /// Divide the footprint into sub-cells no larger than `spacing_m` on a side.
    ///
    /// Returns the centre of each sub-cell along with its area. The areas sum to the footprint area.
    pub fn sample_cells(&self, spacing_m: f64) -> Vec<(Point, f64)> {
        let n_along = (self.length_m / spacing_m).ceil().max(1.0) as usize;
        let n_across = (self.width_m / spacing_m).ceil().max(1.0) as usize;
        let d_along = self.length_m / n_along as f64;
        let d_across = self.width_m / n_across as f64;
        let cell_area = d_along * d_across;

        let mut cells = Vec::with_capacity(n_along * n_across);
        for i in 0..n_along {
            let along = -self.length_m / 2.0 + (i as f64 + 0.5) * d_along;
            for j in 0..n_across {
                let across = -self.width_m / 2.0 + (j as f64 + 0.5) * d_across;
                cells.push((Point::from(self.to_world(along, across)), cell_area));
            }
        }

        cells
    }
}

/// Distance from a polygon to the outline of another (zero when they overlap or nest)
pub fn polygon_distance(a: &Polygon, b: &Polygon) -> f64 {
    a.euclidean_distance(b)
}

/// Distance from a polygon to a line string (zero when they touch or the line is inside)
pub fn polygon_line_distance(polygon: &Polygon, line: &LineString) -> f64 {
    polygon.euclidean_distance(line)
}

/// The point on a ring (or any line string) closest to `p`
pub fn nearest_point_on_line_string(line: &LineString, p: Coord) -> Coord {
    match line.closest_point(&Point::from(p)) {
        Closest::Intersection(q) | Closest::SinglePoint(q) => q.0,
        Closest::Indeterminate => line.0.first().copied().unwrap_or(p),
    }
}

/// Planar length of a line string
pub fn line_string_length(line: &LineString) -> f64 {
    line.euclidean_length()
}

/// Sample points along a line string at most `step_m` apart.
///
/// Returns `(distance along the line, point)` pairs including both end points. Repeated vertices
/// produce a single sample.
pub fn sample_along(line: &LineString, step_m: f64) -> Vec<(f64, Coord)> {
    let Some(&first) = line.0.first() else {
        return Vec::new();
    };

    let dense = line.densify(step_m.max(MIN_SAMPLE_STEP_M));
    let mut samples = vec![(0.0, first)];
    let mut travelled = 0.0;
    for segment in dense.lines() {
        let seg_len = segment.euclidean_length();
        if seg_len < GEOMETRY_EPSILON {
            continue;
        }
        travelled += seg_len;
        samples.push((travelled, segment.end));
    }

    samples
}
