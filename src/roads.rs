//! Access road networks connecting the site entry point to every placed asset.
use crate::asset::Asset;
use crate::earthwork::Earthwork;
use crate::geometry::sample_along;
use crate::id::{AssetID, RoadID, define_id_getter, sequential_id};
use crate::terrain::TerrainModel;
use crate::units::Meters;
use geo::{LineString, Point};
use itertools::Itertools;
use log::{debug, warn};
use petgraph::Undirected;
use petgraph::algo::min_spanning_tree;
use petgraph::data::Element;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::graphmap::UnGraphMap;
use petgraph::unionfind::UnionFind;
use petgraph::visit::Bfs;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;

pub mod routing;
use routing::find_detour;

/// The shape of the road network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadTopology {
    /// The cheapest tree connecting all assets to the entry point
    #[default]
    MinimumSpanningTree,
    /// A separate road from the entry point to each asset
    Star,
}

/// Settings for road generation
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoadParameters {
    /// Carriageway width
    pub width_m: f64,
    /// Steepest grade (in percent) a road should have
    pub max_grade_pct: f64,
    /// Distance between elevation samples along a road
    pub sample_step_m: f64,
    /// Overrides the topology chosen by the strategy
    pub topology: Option<RoadTopology>,
}

impl Default for RoadParameters {
    fn default() -> Self {
        Self {
            width_m: 6.0,
            max_grade_pct: 15.0,
            sample_step_m: 5.0,
            topology: None,
        }
    }
}

/// One end of a road segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoadEndpoint {
    /// The site entry point
    Entry,
    /// A placed asset
    Asset(AssetID),
}

impl Display for RoadEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoadEndpoint::Entry => write!(f, "entry"),
            RoadEndpoint::Asset(id) => write!(f, "{id}"),
        }
    }
}

/// A stretch of road between two endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct RoadSegment {
    /// Unique identifier within the layout, e.g. `road-004`
    pub id: RoadID,
    /// The end nearer the entry point
    pub from: RoadEndpoint,
    /// The end further from the entry point
    pub to: RoadEndpoint,
    /// Centre line in local metres
    pub geometry: LineString,
    /// Terrain-following length
    pub length: Meters,
    /// Carriageway width
    pub width_m: f64,
    /// Steepest grade along the segment, in percent
    pub max_grade_pct: f64,
    /// Whether the segment is steeper than the grade limit
    pub over_grade_limit: bool,
    /// Whether the segment follows a detour instead of a straight line
    pub detoured: bool,
    /// Cut and fill to build the segment
    pub earthwork: Earthwork,
}
define_id_getter! {RoadSegment, RoadID}

/// Length and steepness of a line over terrain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileStats {
    /// Terrain-following length in metres
    pub length_m: f64,
    /// Steepest grade between consecutive samples, in percent
    pub max_grade_pct: f64,
}

/// Measure a line over terrain. Stretches off the terrain count at their planar length.
pub fn profile_stats(terrain: &TerrainModel, line: &LineString, step_m: f64) -> ProfileStats {
    let samples: Vec<_> = sample_along(line, step_m)
        .into_iter()
        .map(|(d, c)| (d, terrain.elevation_at(Point::from(c))))
        .collect();

    let mut stats = ProfileStats {
        length_m: 0.0,
        max_grade_pct: 0.0,
    };
    for ((d0, z0), (d1, z1)) in samples.into_iter().tuple_windows() {
        let run = d1 - d0;
        match (z0, z1) {
            (Some(z0), Some(z1)) if run > 0.0 => {
                let rise = z1 - z0;
                stats.length_m += run.hypot(rise);
                stats.max_grade_pct = stats.max_grade_pct.max(rise.abs() / run * 100.0);
            }
            _ => stats.length_m += run,
        }
    }

    stats
}

/// A node of the candidate road graph
#[derive(Debug, Clone, PartialEq)]
struct RoadNode {
    endpoint: RoadEndpoint,
    position: Point,
}

/// A complete graph between the entry point and all assets, weighted by grade-penalised length
type RoadGraph = Graph<RoadNode, f64, Undirected>;

/// Cost of a straight road: its length, inflated in proportion to how far it exceeds the grade limit
fn edge_cost(stats: &ProfileStats, max_grade_pct: f64) -> f64 {
    let excess = (stats.max_grade_pct - max_grade_pct).max(0.0);
    stats.length_m * (1.0 + excess / max_grade_pct.max(f64::EPSILON))
}

fn create_road_graph(
    terrain: &TerrainModel,
    entry: Point,
    assets: &[Asset],
    params: &RoadParameters,
) -> RoadGraph {
    let mut graph = Graph::new_undirected();
    graph.add_node(RoadNode {
        endpoint: RoadEndpoint::Entry,
        position: entry,
    });
    for asset in assets {
        graph.add_node(RoadNode {
            endpoint: RoadEndpoint::Asset(asset.id.clone()),
            position: asset.position(),
        });
    }

    let nodes: Vec<_> = graph.node_indices().collect();
    for (a, b) in nodes.into_iter().tuple_combinations() {
        let line = LineString::from(vec![graph[a].position.0, graph[b].position.0]);
        let stats = profile_stats(terrain, &line, params.sample_step_m);
        graph.add_edge(a, b, edge_cost(&stats, params.max_grade_pct));
    }

    graph
}

/// Choose which pairs of nodes (by index) are joined by a road
fn choose_edges(graph: &RoadGraph, topology: RoadTopology) -> Vec<(usize, usize)> {
    match topology {
        RoadTopology::MinimumSpanningTree => min_spanning_tree(graph)
            .filter_map(|element| match element {
                Element::Edge { source, target, .. } => Some((source, target)),
                Element::Node { .. } => None,
            })
            .collect(),
        RoadTopology::Star => (1..graph.node_count()).map(|i| (0, i)).collect(),
    }
}

/// Orient the edges of a tree away from the entry point (node 0), in breadth-first order.
///
/// Neighbours are visited in ascending index order.
fn orient_from_entry(edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let sorted = edges.iter().map(|&(a, b)| (a.min(b), a.max(b))).sorted();
    let mut tree = UnGraphMap::<usize, ()>::from_edges(sorted);
    tree.add_node(0);

    let mut oriented = Vec::with_capacity(edges.len());
    let mut reached = HashSet::new();
    let mut bfs = Bfs::new(&tree, 0);
    while let Some(node) = bfs.next(&tree) {
        if let Some(parent) = tree.neighbors(node).find(|n| reached.contains(n)) {
            oriented.push((parent, node));
        }
        reached.insert(node);
    }

    oriented
}

/// Build a road network connecting the entry point to every asset.
///
/// Roads which would exceed the grade limit are rerouted where the terrain allows; otherwise the
/// straight road is kept and flagged.
pub fn build_road_network(
    terrain: &TerrainModel,
    entry: Point,
    assets: &[Asset],
    params: &RoadParameters,
    topology: RoadTopology,
) -> RoadNetwork {
    let graph = create_road_graph(terrain, entry, assets, params);
    let edges = orient_from_entry(&choose_edges(&graph, topology));

    let mut segments = Vec::with_capacity(edges.len());
    for (number, (from, to)) in edges.into_iter().enumerate() {
        let (from, to) = (&graph[NodeIndex::new(from)], &graph[NodeIndex::new(to)]);
        let mut geometry = LineString::from(vec![from.position.0, to.position.0]);
        let mut stats = profile_stats(terrain, &geometry, params.sample_step_m);
        let mut detoured = false;

        if stats.max_grade_pct > params.max_grade_pct {
            match find_detour(terrain, from.position, to.position, params.max_grade_pct) {
                Some(detour) => {
                    debug!(
                        "Rerouted road from {} to {} to avoid a {:.1}% grade",
                        from.endpoint, to.endpoint, stats.max_grade_pct
                    );
                    stats = profile_stats(terrain, &detour, params.sample_step_m);
                    geometry = detour;
                    detoured = true;
                }
                None => warn!(
                    "No route from {} to {} within the {}% grade limit",
                    from.endpoint, to.endpoint, params.max_grade_pct
                ),
            }
        }

        segments.push(RoadSegment {
            id: sequential_id("road", number + 1),
            from: from.endpoint.clone(),
            to: to.endpoint.clone(),
            geometry,
            length: Meters(stats.length_m),
            width_m: params.width_m,
            max_grade_pct: stats.max_grade_pct,
            over_grade_limit: stats.max_grade_pct > params.max_grade_pct,
            detoured,
            earthwork: Earthwork::default(),
        });
    }

    RoadNetwork { segments }
}

/// The roads of a layout
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoadNetwork {
    /// Segments in breadth-first order from the entry point
    pub segments: Vec<RoadSegment>,
}

impl RoadNetwork {
    /// Combined terrain-following length of all segments
    pub fn total_length(&self) -> Meters {
        self.segments.iter().map(|s| s.length).sum()
    }

    /// Steepest grade on any segment
    pub fn max_grade_pct(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.max_grade_pct)
            .fold(0.0, f64::max)
    }

    /// Number of segments steeper than the grade limit
    pub fn over_grade_count(&self) -> usize {
        self.segments.iter().filter(|s| s.over_grade_limit).count()
    }

    /// Whether every listed asset is reachable from the entry point
    pub fn is_connected<'a, I>(&self, asset_ids: I) -> bool
    where
        I: IntoIterator<Item = &'a AssetID>,
    {
        let mut index = HashMap::from([(RoadEndpoint::Entry, 0)]);
        for segment in &self.segments {
            for endpoint in [&segment.from, &segment.to] {
                let next = index.len();
                index.entry(endpoint.clone()).or_insert(next);
            }
        }

        let mut sets = UnionFind::new(index.len());
        for segment in &self.segments {
            sets.union(index[&segment.from], index[&segment.to]);
        }

        asset_ids.into_iter().all(|id| {
            index
                .get(&RoadEndpoint::Asset(id.clone()))
                .is_some_and(|&i| sets.equiv(0, i))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetCatalogue, AssetKind};
    use crate::fixture::{build_terrain, flat_site, flat_terrain};
    use crate::site::SiteData;
    use crate::terrain::SyntheticElevationProvider;
    use float_cmp::assert_approx_eq;
    use geo::{coord, point};
    use rstest::rstest;

    fn battery_at(number: usize, x: f64, y: f64) -> Asset {
        let catalogue = AssetCatalogue::default();
        let footprint = catalogue
            .get(AssetKind::Battery)
            .unwrap()
            .footprint(point! {x: x, y: y}, 90.0);
        Asset {
            id: sequential_id("battery", number),
            kind: AssetKind::Battery,
            polygon: footprint.polygon(),
            footprint,
            capacity: crate::units::Kilowatts(100.0),
            elevation_m: 0.0,
            slope_deg: 0.0,
            aspect_deg: None,
            suitability: 1.0,
            low_suitability: false,
            pad_elevation_m: 0.0,
            earthwork: Earthwork::default(),
        }
    }

    fn assets() -> Vec<Asset> {
        vec![
            battery_at(1, 100.0, 0.0),
            battery_at(2, 200.0, 0.0),
            battery_at(3, 100.0, 100.0),
        ]
    }

    #[rstest]
    fn test_mst_on_flat_terrain(flat_terrain: TerrainModel) {
        let network = build_road_network(
            &flat_terrain,
            point! {x: 0.0, y: 0.0},
            &assets(),
            &RoadParameters::default(),
            RoadTopology::MinimumSpanningTree,
        );

        assert_eq!(network.segments.len(), 3);
        assert_approx_eq!(f64, network.total_length().value(), 300.0, epsilon = 1e-6);
        assert_eq!(network.max_grade_pct(), 0.0);
        assert_eq!(network.over_grade_count(), 0);

        let first = &network.segments[0];
        assert_eq!(first.id.as_str(), "road-001");
        assert_eq!(first.from, RoadEndpoint::Entry);
        assert_eq!(first.to, RoadEndpoint::Asset("battery-001".into()));
        assert!(network.segments[1..]
            .iter()
            .all(|s| s.from == RoadEndpoint::Asset("battery-001".into())));

        let ids: Vec<_> = assets().into_iter().map(|a| a.id).collect();
        assert!(network.is_connected(&ids));
    }

    #[rstest]
    fn test_star(flat_terrain: TerrainModel) {
        let network = build_road_network(
            &flat_terrain,
            point! {x: 0.0, y: 0.0},
            &assets(),
            &RoadParameters::default(),
            RoadTopology::Star,
        );
        assert_eq!(network.segments.len(), 3);
        assert!(network.segments.iter().all(|s| s.from == RoadEndpoint::Entry));

        // 100 + 200 + 141.42
        let expected = 300.0 + 100.0 * 2.0_f64.sqrt();
        assert_approx_eq!(f64, network.total_length().value(), expected, epsilon = 1e-6);
    }

    #[rstest]
    fn test_no_assets(flat_terrain: TerrainModel) {
        let network = build_road_network(
            &flat_terrain,
            point! {x: 0.0, y: 0.0},
            &[],
            &RoadParameters::default(),
            RoadTopology::MinimumSpanningTree,
        );
        assert!(network.segments.is_empty());
        assert!(network.is_connected(&Vec::<AssetID>::new()));
    }

    #[rstest]
    fn test_steep_road_is_detoured(flat_site: SiteData) {
        // 20% to the north
        let terrain = build_terrain(
            &flat_site.site,
            &SyntheticElevationProvider::inclined(100.0, 0.0, 20.0),
        );
        let straight = LineString::from(vec![(200.0, 20.0), (200.0, 380.0)]);
        let straight_stats = profile_stats(&terrain, &straight, 5.0);
        assert_approx_eq!(f64, straight_stats.max_grade_pct, 20.0, epsilon = 1e-6);

        let network = build_road_network(
            &terrain,
            point! {x: 200.0, y: 20.0},
            &[battery_at(1, 200.0, 380.0)],
            &RoadParameters::default(),
            RoadTopology::MinimumSpanningTree,
        );
        let segment = &network.segments[0];
        assert!(segment.detoured);
        assert!(segment.max_grade_pct < straight_stats.max_grade_pct);
        assert!(segment.length.value() > straight_stats.length_m);
        assert_eq!(segment.geometry.0.first(), Some(&coord! {x: 200.0, y: 20.0}));
        assert_eq!(segment.geometry.0.last(), Some(&coord! {x: 200.0, y: 380.0}));
    }

    #[rstest]
    fn test_impossible_road_is_flagged(flat_site: SiteData) {
        let terrain = build_terrain(
            &flat_site.site,
            &SyntheticElevationProvider::inclined(100.0, 0.0, 10.0),
        );
        let params = RoadParameters {
            max_grade_pct: 0.5,
            ..Default::default()
        };
        let network = build_road_network(
            &terrain,
            point! {x: 200.0, y: 20.0},
            &[battery_at(1, 200.0, 380.0)],
            &params,
            RoadTopology::MinimumSpanningTree,
        );
        let segment = &network.segments[0];
        assert!(!segment.detoured);
        assert!(segment.over_grade_limit);
        assert_eq!(network.over_grade_count(), 1);
        assert_eq!(segment.geometry.0.len(), 2);
    }

    #[test]
    fn test_disconnected() {
        let network = RoadNetwork::default();
        assert!(!network.is_connected(&[AssetID::from("battery-001")]));
    }

    #[test]
    fn test_orient_from_entry() {
        // Edges given in arbitrary order and direction
        let edges = [(3, 1), (0, 2), (1, 0), (4, 2)];
        assert_eq!(orient_from_entry(&edges), [(0, 1), (0, 2), (1, 3), (2, 4)]);
        assert!(orient_from_entry(&[]).is_empty());
    }

    #[test]
    fn test_edge_cost() {
        let stats = ProfileStats {
            length_m: 100.0,
            max_grade_pct: 30.0,
        };
        assert_approx_eq!(f64, edge_cost(&stats, 15.0), 200.0);
        let gentle = ProfileStats {
            length_m: 100.0,
            max_grade_pct: 5.0,
        };
        assert_approx_eq!(f64, edge_cost(&gentle, 15.0), 100.0);
    }
}
