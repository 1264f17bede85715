//! Greedy placement of assets on suitable, unexcluded terrain.
use crate::asset::{Asset, AssetCatalogue, AssetKind, AssetTypeSpec, required_spacing};
use crate::earthwork::Earthwork;
use crate::exclusion::ExclusionFilter;
use crate::geometry::{Footprint, distance, normalise_bearing, polygon_distance};
use crate::id::sequential_id;
use crate::site::SiteData;
use crate::strategy::StrategyPolicy;
use crate::terrain::{TerrainModel, TerrainSample, suitability};
use crate::units::Kilowatts;
use geo::{Coord, Point};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Deserialize;

pub mod allocation;
pub use allocation::{AllocationPolicy, Allocator, KindWeight};

/// Assets scoring below this are flagged as poorly sited
pub const LOW_SUITABILITY_THRESHOLD: f64 = 0.2;

/// Placed capacity within this margin of the target counts as meeting it
const CAPACITY_TOLERANCE_KW: f64 = 1e-6;

/// Settings controlling asset placement
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlacementParameters {
    /// Distance between candidate locations
    pub candidate_spacing_m: f64,
    /// Rotate footprints to follow the terrain contours
    pub terrain_aware: bool,
    /// Footprint bearing used on flat ground or when not terrain-aware
    pub default_bearing_deg: f64,
    /// Place a substation near the entry point before any other asset
    pub include_substation: bool,
}

impl Default for PlacementParameters {
    fn default() -> Self {
        Self {
            candidate_spacing_m: 10.0,
            terrain_aware: true,
            default_bearing_deg: 90.0,
            include_substation: false,
        }
    }
}

/// A location considered for an asset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// The location in local metres
    pub position: Point,
    /// Terrain at the location
    pub sample: TerrainSample,
    /// Suitability of the location for the asset kind being ranked
    pub score: f64,
    /// Score blended with proximity to the entry point, used for ranking
    rank: f64,
    /// Distance to the site centroid, used to break ties
    centroid_distance: f64,
    /// Position in the candidate grid, used to break remaining ties
    order: usize,
}

/// Everything the placement engine reads
pub struct PlacementContext<'a> {
    /// The site and its zones
    pub site_data: &'a SiteData,
    /// Terrain over the site
    pub terrain: &'a TerrainModel,
    /// The asset types available
    pub catalogue: &'a AssetCatalogue,
    /// Boundary, setback and zone filter
    pub filter: &'a ExclusionFilter<'a>,
}

/// The result of a placement run
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementOutcome {
    /// Placed assets, in placement order
    pub assets: Vec<Asset>,
    /// The capacity requested
    pub target: Kilowatts,
    /// The capacity placed
    pub achieved: Kilowatts,
}

impl PlacementOutcome {
    /// Whether the site could not accommodate the target capacity
    pub fn is_partial(&self) -> bool {
        self.achieved.value() + CAPACITY_TOLERANCE_KW < self.target.value()
    }

    /// Placed capacity as a fraction of the target
    pub fn achieved_fraction(&self) -> f64 {
        if self.target.value() > 0.0 {
            self.achieved.value() / self.target.value()
        } else {
            1.0
        }
    }
}

/// The locations of the candidate grid which lie on site and outside every zone
fn candidate_points(ctx: &PlacementContext, spacing_m: f64) -> Vec<(Point, TerrainSample)> {
    let bounds = ctx.site_data.site.bounds();
    let n_cols = (bounds.width() / spacing_m).floor() as usize + 1;
    let n_rows = (bounds.height() / spacing_m).floor() as usize + 1;

    let mut points = Vec::new();
    for row in 0..n_rows {
        for col in 0..n_cols {
            let position = Point::from(Coord {
                x: bounds.min().x + (col as f64 + 0.5) * spacing_m,
                y: bounds.min().y + (row as f64 + 0.5) * spacing_m,
            });
            if ctx.filter.is_point_excluded(position) {
                continue;
            }
            if let Some(sample) = ctx.terrain.sample(position) {
                points.push((position, sample));
            }
        }
    }

    points
}

/// Rank candidate locations for one asset type, best first
fn rank_candidates(
    points: &[(Point, TerrainSample)],
    spec: &AssetTypeSpec,
    anchor: Point,
    centroid: Point,
    policy: &StrategyPolicy,
) -> Vec<Candidate> {
    let max_anchor_distance = points
        .iter()
        .map(|(p, _)| distance(p.0, anchor.0))
        .fold(0.0, f64::max)
        .max(1.0);

    let mut candidates: Vec<_> = points
        .iter()
        .enumerate()
        .filter_map(|(order, &(position, sample))| {
            let score = suitability(&sample, spec, &policy.suitability, false);
            if score <= 0.0 {
                return None;
            }

            let proximity = 1.0 - distance(position.0, anchor.0) / max_anchor_distance;
            let w = policy.proximity_weight;
            Some(Candidate {
                position,
                sample,
                score,
                rank: (1.0 - w) * score + w * proximity,
                centroid_distance: distance(position.0, centroid.0),
                order,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.rank
            .total_cmp(&a.rank)
            .then(a.centroid_distance.total_cmp(&b.centroid_distance))
            .then(a.order.cmp(&b.order))
    });

    candidates
}

/// Candidates for one kind and how far through them placement has got
struct KindQueue<'a> {
    spec: &'a AssetTypeSpec,
    candidates: Vec<Candidate>,
    cursor: usize,
    count: usize,
}

impl KindQueue<'_> {
    fn is_exhausted(&self) -> bool {
        self.cursor >= self.candidates.len()
    }
}

/// Places assets one at a time, enforcing exclusions and spacing
struct Placer<'a> {
    ctx: &'a PlacementContext<'a>,
    params: &'a PlacementParameters,
    policy: &'a StrategyPolicy,
    assets: Vec<Asset>,
}

impl Placer<'_> {
    /// The footprint bearing at a candidate
    fn bearing(&self, candidate: &Candidate) -> f64 {
        match candidate.sample.aspect_deg {
            // Long axis along the contour, i.e. perpendicular to the downslope direction
            Some(aspect) if self.params.terrain_aware => normalise_bearing(aspect + 90.0) % 180.0,
            _ => self.params.default_bearing_deg,
        }
    }

    /// Whether a footprint keeps the required distance from every placed asset
    fn is_spaced(&self, spec: &AssetTypeSpec, footprint: &Footprint) -> bool {
        let polygon = footprint.polygon();
        self.assets.iter().all(|other| {
            let Some(other_spec) = self.ctx.catalogue.get(other.kind) else {
                return true;
            };
            let required = required_spacing(spec, other_spec) * self.policy.spacing_factor;

            // Circles around the footprints already far enough apart
            let center_gap = distance(footprint.center.0, other.footprint.center.0)
                - footprint.half_diagonal()
                - other.footprint.half_diagonal();
            center_gap >= required || polygon_distance(&polygon, &other.polygon) >= required
        })
    }

    /// Mean slope of the terrain under a footprint
    fn mean_slope(&self, footprint: &Footprint, fallback: f64) -> f64 {
        let slopes: Vec<_> = footprint
            .sample_cells(self.ctx.terrain.cell_size_m())
            .into_iter()
            .filter_map(|(p, _)| self.ctx.terrain.sample(p).map(|s| s.slope_deg))
            .collect();
        if slopes.is_empty() {
            fallback
        } else {
            slopes.iter().sum::<f64>() / slopes.len() as f64
        }
    }

    /// Try the queue's candidates in order, placing an asset at the first acceptable one
    fn place_next(&mut self, queue: &mut KindQueue, capacity: Kilowatts) -> Option<&Asset> {
        while let Some(candidate) = queue.candidates.get(queue.cursor).copied() {
            queue.cursor += 1;

            let footprint = queue
                .spec
                .footprint(candidate.position, self.bearing(&candidate));
            let polygon = footprint.polygon();
            if let Err(reason) = self.ctx.filter.check(&polygon) {
                debug!("Rejected {} candidate: {reason:?}", queue.spec.kind);
                continue;
            }
            if !self.is_spaced(queue.spec, &footprint) {
                continue;
            }

            queue.count += 1;
            let slope_deg = self.mean_slope(&footprint, candidate.sample.slope_deg);
            let asset = Asset {
                id: sequential_id(&queue.spec.kind.to_string(), queue.count),
                kind: queue.spec.kind,
                footprint,
                polygon,
                capacity,
                elevation_m: candidate.sample.elevation_m,
                slope_deg,
                aspect_deg: candidate.sample.aspect_deg,
                suitability: candidate.score,
                low_suitability: slope_deg > queue.spec.max_slope_deg
                    || candidate.score < LOW_SUITABILITY_THRESHOLD,
                pad_elevation_m: candidate.sample.elevation_m,
                earthwork: Earthwork::default(),
            };
            self.assets.push(asset);
            return self.assets.last();
        }

        None
    }
}

/// Place assets until the target capacity is reached or no more will fit.
///
/// Running out of room is not an error: the outcome reports the capacity actually placed.
pub fn place_assets(
    ctx: &PlacementContext,
    target: Kilowatts,
    allocation: &AllocationPolicy,
    params: &PlacementParameters,
    policy: &StrategyPolicy,
) -> PlacementOutcome {
    let site = &ctx.site_data.site;
    let entry = site.entry_point;
    let centroid = site.centroid();
    let points = candidate_points(ctx, params.candidate_spacing_m);
    debug!(
        "{} candidate locations on site {} at {} m spacing",
        points.len(),
        site.id,
        params.candidate_spacing_m
    );

    let mut placer = Placer {
        ctx,
        params,
        policy,
        assets: Vec::new(),
    };

    if params.include_substation {
        match ctx.catalogue.get(AssetKind::Substation) {
            Some(spec) => {
                // Nearest the entry point regardless of strategy
                let nearest = StrategyPolicy {
                    proximity_weight: 1.0,
                    ..*policy
                };
                let mut queue = KindQueue {
                    spec,
                    candidates: rank_candidates(&points, spec, entry, centroid, &nearest),
                    cursor: 0,
                    count: 0,
                };
                if placer.place_next(&mut queue, Kilowatts(0.0)).is_none() {
                    warn!("No room for a substation on site {}", site.id);
                }
            }
            None => warn!("No substation type in the asset catalogue"),
        }
    }

    let mut queues: IndexMap<AssetKind, KindQueue> = allocation
        .kinds()
        .into_iter()
        .filter_map(|kind| {
            let Some(spec) = ctx.catalogue.get(kind) else {
                warn!("Asset type {kind} is not in the catalogue and will not be placed");
                return None;
            };
            let candidates = rank_candidates(&points, spec, entry, centroid, policy);
            Some((
                kind,
                KindQueue {
                    spec,
                    candidates,
                    cursor: 0,
                    count: 0,
                },
            ))
        })
        .collect();

    let mut allocator = Allocator::new(allocation.clone(), target.value());
    let mut achieved = Kilowatts(0.0);
    loop {
        let remaining = target.value() - achieved.value();
        if remaining <= CAPACITY_TOLERANCE_KW {
            break;
        }

        let is_available =
            |kind: AssetKind| queues.get(&kind).is_some_and(|q| !q.is_exhausted());
        let Some(mut kind) = allocator.next_kind(is_available) else {
            break;
        };

        // A kind whose smallest unit overshoots the remainder gives way to one which fits
        if remaining < queues[&kind].spec.min_capacity_kw.value() {
            if let Some((&other, _)) = queues.iter().find(|(k, q)| {
                is_available(**k) && q.spec.min_capacity_kw.value() <= remaining
            }) {
                kind = other;
            }
        }

        let Some(queue) = queues.get_mut(&kind) else {
            break;
        };
        let capacity = Kilowatts(remaining.clamp(
            queue.spec.min_capacity_kw.value(),
            queue.spec.max_capacity_kw.value(),
        ));
        if placer.place_next(queue, capacity).is_some() {
            allocator.record(kind, capacity.value());
            achieved += capacity;
        } else {
            debug!("No more room for {kind} on site {}", site.id);
        }
    }

    let outcome = PlacementOutcome {
        assets: placer.assets,
        target,
        achieved,
    };
    if outcome.is_partial() {
        warn!(
            "Site {} can only accommodate {} of the {} requested",
            site.id, outcome.achieved, outcome.target
        );
    } else {
        info!(
            "Placed {} assets totalling {} on site {}",
            outcome.assets.len(),
            outcome.achieved,
            site.id
        );
    }

    outcome
}
