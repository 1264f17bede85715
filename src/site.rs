//! A site is the parcel of land on which a layout is generated.
use crate::exclusion::ExclusionZone;
use crate::geometry::{LocalProjection, nearest_point_on_line_string};
use crate::id::SiteID;
use crate::units::SquareMeters;
use anyhow::{Context, Result, ensure};
use geo::{Area, BoundingRect, Centroid, Coord, Point, Polygon, Rect};

/// A site boundary expressed in the local metric frame
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    /// Unique identifier for the site
    pub id: SiteID,
    /// A text description of the site
    pub description: String,
    /// Site boundary in local metres
    pub boundary: Polygon,
    /// Projection between the local frame and lon/lat
    pub projection: LocalProjection,
    /// Where the access road network joins the site, on the boundary
    pub entry_point: Point,
    /// Planar area enclosed by the boundary
    pub area: SquareMeters,
}

impl Site {
    /// Create a site from a lon/lat boundary.
    ///
    /// The local frame is centred on the boundary centroid. If no entry point is given, the first
    /// boundary vertex is used; a given entry point is snapped onto the boundary.
    pub fn from_geographic(
        id: SiteID,
        description: String,
        boundary: &Polygon,
        entry_point: Option<Point>,
    ) -> Result<Self> {
        let centroid = boundary
            .centroid()
            .with_context(|| format!("Boundary for site {id} is empty"))?;
        let projection = LocalProjection::new(centroid.0);
        let local_boundary = projection.polygon_to_local(boundary);
        let local_entry = entry_point.map(|p| Point::from(projection.to_local(p.0)));

        Self::from_local(id, description, local_boundary, local_entry, projection)
    }

    /// Create a site from a boundary already in local metres
    pub fn from_local(
        id: SiteID,
        description: String,
        boundary: Polygon,
        entry_point: Option<Point>,
        projection: LocalProjection,
    ) -> Result<Self> {
        check_boundary(&boundary).with_context(|| format!("Invalid boundary for site {id}"))?;

        let ring = boundary.exterior();
        let entry_point = match entry_point {
            Some(p) => Point::from(nearest_point_on_line_string(ring, p.0)),
            None => Point::from(ring.0[0]),
        };
        let area = SquareMeters::new(boundary.unsigned_area());

        Ok(Self {
            id,
            description,
            boundary,
            projection,
            entry_point,
            area,
        })
    }

    /// Bounding rectangle of the boundary
    pub fn bounds(&self) -> Rect {
        // A validated boundary always has at least three vertices
        self.boundary
            .bounding_rect()
            .unwrap_or_else(|| Rect::new(Coord::zero(), Coord::zero()))
    }

    /// Centroid of the boundary in local metres
    pub fn centroid(&self) -> Point {
        self.boundary
            .centroid()
            .unwrap_or_else(|| Point::from(self.bounds().center()))
    }
}

/// Check that a boundary is usable as a site
fn check_boundary(boundary: &Polygon) -> Result<()> {
    let n_vertices = boundary.exterior().0.len().saturating_sub(1);
    ensure!(
        n_vertices >= 3,
        "Boundary must have at least three vertices (found {n_vertices})"
    );
    ensure!(
        boundary
            .exterior()
            .coords()
            .all(|c| c.x.is_finite() && c.y.is_finite()),
        "Boundary coordinates must be finite"
    );
    ensure!(
        boundary.unsigned_area() > 0.0,
        "Boundary must enclose a non-zero area"
    );

    Ok(())
}

/// A site together with the exclusion zones drawn on it
#[derive(Debug, Clone, PartialEq)]
pub struct SiteData {
    /// The site
    pub site: Site,
    /// No-build zones on the site
    pub zones: Vec<ExclusionZone>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use geo::{coord, point, polygon};

    #[test]
    fn test_site_from_geographic() {
        let boundary = polygon![
            (x: -119.502, y: 36.198),
            (x: -119.498, y: 36.198),
            (x: -119.498, y: 36.202),
            (x: -119.502, y: 36.202),
        ];
        let site = Site::from_geographic("s1".into(), String::new(), &boundary, None).unwrap();

        // Roughly 360 m x 445 m
        let area = site.area.value();
        assert!((area - 160_000.0).abs() < 2_000.0, "{area}");
        let centroid = site.centroid();
        assert_approx_eq!(f64, centroid.x(), 0.0, epsilon = 1e-6);
        assert_approx_eq!(f64, centroid.y(), 0.0, epsilon = 1e-6);
        let origin = site.projection.origin();
        assert_approx_eq!(f64, origin.x, -119.5, epsilon = 1e-9);
        assert_approx_eq!(f64, origin.y, 36.2, epsilon = 1e-9);
    }

    #[test]
    fn test_entry_point_snapped_to_boundary() {
        let boundary = polygon![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0), (x: 100.0, y: 100.0), (x: 0.0, y: 100.0)];
        let projection = LocalProjection::new(coord! {x: 0.0, y: 0.0});
        let site = Site::from_local(
            "s1".into(),
            String::new(),
            boundary,
            Some(point! {x: 50.0, y: 10.0}),
            projection,
        )
        .unwrap();
        assert_eq!(site.entry_point, point! {x: 50.0, y: 0.0});
    }

    #[test]
    fn test_degenerate_boundary() {
        let boundary = polygon![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)];
        let projection = LocalProjection::new(coord! {x: 0.0, y: 0.0});
        assert_error!(
            Site::from_local("s1".into(), String::new(), boundary, None, projection),
            "Invalid boundary for site s1"
        );
    }
}
