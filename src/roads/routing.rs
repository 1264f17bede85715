//! Grade-limited path search over the terrain grid.
use crate::geometry::distance;
use crate::terrain::TerrainModel;
use geo::{Coord, LineString, Point};
use pathfinding::prelude::astar;

/// Offsets to the eight neighbours of a cell
const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Path costs are integer centimetres
fn to_cost(length_m: f64) -> u64 {
    (length_m * 100.0).round() as u64
}

/// Find a route between two points whose steps between adjacent cells never exceed the grade
/// limit, preferring the shortest terrain-following length.
///
/// The route stays on site except at its end points. Returns `None` if either end is off the
/// grid or no such route exists.
pub fn find_detour(
    terrain: &TerrainModel,
    from: Point,
    to: Point,
    max_grade_pct: f64,
) -> Option<LineString> {
    let start = terrain.cell_at(from)?;
    let goal = terrain.cell_at(to)?;
    let goal_center = terrain.cell_center(goal.0, goal.1);

    let successors = |&(col, row): &(usize, usize)| {
        let here = terrain.cell_center(col, row);
        let z = terrain.elevation(col, row);
        NEIGHBOURS
            .iter()
            .filter_map(move |&(dc, dr)| {
                let c = col.checked_add_signed(dc)?;
                let r = row.checked_add_signed(dr)?;
                if c >= terrain.n_cols() || r >= terrain.n_rows() {
                    return None;
                }
                if !terrain.is_on_site(c, r) && (c, r) != goal {
                    return None;
                }

                let run = distance(here.0, terrain.cell_center(c, r).0);
                let rise = terrain.elevation(c, r) - z;
                if rise.abs() / run * 100.0 > max_grade_pct {
                    return None;
                }

                Some(((c, r), to_cost(run.hypot(rise))))
            })
            .collect::<Vec<_>>()
    };
    let heuristic = |&(col, row): &(usize, usize)| {
        to_cost(distance(terrain.cell_center(col, row).0, goal_center.0))
    };

    let (cells, _) = astar(&start, successors, heuristic, |cell| *cell == goal)?;

    // Exact end points, with the cell centres of the path between them
    let mut coords: Vec<Coord> = Vec::with_capacity(cells.len() + 2);
    coords.push(from.0);
    if cells.len() > 2 {
        coords.extend(
            cells[1..cells.len() - 1]
                .iter()
                .map(|&(c, r)| terrain.cell_center(c, r).0),
        );
    }
    coords.push(to.0);

    Some(LineString::from(coords))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{build_terrain, flat_site, flat_terrain};
    use crate::site::SiteData;
    use crate::terrain::SyntheticElevationProvider;
    use geo::point;
    use rstest::rstest;

    #[rstest]
    fn test_flat_detour_is_direct(flat_terrain: TerrainModel) {
        let path = find_detour(
            &flat_terrain,
            point! {x: 52.5, y: 52.5},
            point! {x: 152.5, y: 52.5},
            15.0,
        )
        .unwrap();
        assert!(path.0.iter().all(|c| (c.y - 52.5).abs() < 1e-9));
        assert_eq!(path.0.first().unwrap().x, 52.5);
        assert_eq!(path.0.last().unwrap().x, 152.5);
    }

    #[rstest]
    fn test_no_route_up_a_cliff(flat_site: SiteData) {
        let terrain = build_terrain(
            &flat_site.site,
            &SyntheticElevationProvider::inclined(100.0, 0.0, 10.0),
        );

        // Only level steps are allowed, so the route can never climb
        assert_eq!(
            find_detour(
                &terrain,
                point! {x: 200.0, y: 20.0},
                point! {x: 200.0, y: 380.0},
                0.5
            ),
            None
        );
    }

    #[rstest]
    fn test_off_grid(flat_terrain: TerrainModel) {
        assert_eq!(
            find_detour(
                &flat_terrain,
                point! {x: -500.0, y: 0.0},
                point! {x: 100.0, y: 100.0},
                15.0
            ),
            None
        );
    }
}
