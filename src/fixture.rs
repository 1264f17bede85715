//! Fixtures for tests
use crate::asset::AssetCatalogue;
use crate::compliance::RuleBook;
use crate::exclusion::{ExclusionZone, ZoneType};
use crate::generation::{GenerationRequest, LayoutEngine};
use crate::geometry::LocalProjection;
use crate::site::{Site, SiteData};
use crate::terrain::{
    ElevationProvider, ElevationRequest, Hill, SyntheticElevationProvider, TerrainModel,
    TerrainStore,
};
use geo::{Polygon, coord, polygon};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// An axis-aligned square centred on `(cx, cy)`
pub fn square(cx: f64, cy: f64, size: f64) -> Polygon {
    let h = size / 2.0;
    polygon![
        (x: cx - h, y: cy - h),
        (x: cx + h, y: cy - h),
        (x: cx + h, y: cy + h),
        (x: cx - h, y: cy + h),
    ]
}

/// A wetland zone covering the rectangle `(x0, y0)` to `(x1, y1)`
pub fn wetland_zone(x0: f64, y0: f64, x1: f64, y1: f64, buffer_m: f64) -> ExclusionZone {
    ExclusionZone {
        id: "wetland".into(),
        zone_type: ZoneType::Wetland,
        geometry: polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)],
        buffer_m,
        label: "Wetland".into(),
        color: "#2a9d8f".into(),
    }
}

/// A 400 m square site with its south-west corner at the local origin
#[fixture]
pub fn flat_site() -> SiteData {
    let projection = LocalProjection::new(coord! {x: -119.5, y: 36.2});
    let site = Site::from_local(
        "site1".into(),
        "A square test site".into(),
        square(200.0, 200.0, 400.0),
        None,
        projection,
    )
    .unwrap();

    SiteData {
        site,
        zones: Vec::new(),
    }
}

/// Build terrain for a site from a synthetic provider with 5 m cells
pub fn build_terrain(site: &Site, provider: &SyntheticElevationProvider) -> TerrainModel {
    let request = ElevationRequest {
        site_id: site.id.clone(),
        bounds: site.bounds(),
        projection: site.projection,
        cell_size_m: 5.0,
    };
    TerrainModel::build(site, provider.fetch_elevation(&request).unwrap()).unwrap()
}

/// Flat terrain at 100 m over [`flat_site`]
#[fixture]
pub fn flat_terrain(flat_site: SiteData) -> TerrainModel {
    build_terrain(&flat_site.site, &SyntheticElevationProvider::flat(100.0))
}

/// Terrain over [`flat_site`] rising 10% to the north from 100 m at the southern edge
#[fixture]
pub fn sloped_terrain(flat_site: SiteData) -> TerrainModel {
    build_terrain(
        &flat_site.site,
        &SyntheticElevationProvider::inclined(100.0, 0.0, 10.0),
    )
}

/// A 20 m hill in the middle of [`flat_site`]
#[fixture]
pub fn hill_terrain(flat_site: SiteData) -> TerrainModel {
    let provider = SyntheticElevationProvider {
        hills: vec![Hill {
            x_m: 200.0,
            y_m: 200.0,
            height_m: 20.0,
            radius_m: 50.0,
        }],
        ..SyntheticElevationProvider::flat(100.0)
    };
    build_terrain(&flat_site.site, &provider)
}

/// A generation request for 500 kW of solar
#[fixture]
pub fn request() -> GenerationRequest {
    GenerationRequest::new("layout1".into(), 500.0)
}

/// An engine with flat synthetic terrain and the built-in catalogue and rules
#[fixture]
pub fn flat_engine() -> LayoutEngine {
    LayoutEngine::new(
        TerrainStore::new(Box::new(SyntheticElevationProvider::flat(100.0)), 5.0),
        AssetCatalogue::default(),
        RuleBook::default(),
    )
}
