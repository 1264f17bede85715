//! A background queue of layout generations.
//!
//! Each layout ID has at most one generation in flight. A newer request for the same layout
//! must explicitly supersede the old one; the superseded run is cancelled and its result, if it
//! still arrives, is discarded. The replacement stays queued until the superseded claim has been
//! handed back through [`LayoutQueue::finish`], so two generations of one layout never run at once.
use crate::error::EngineError;
use crate::generation::{CancellationToken, GenerationRequest, LayoutEngine};
use crate::id::LayoutID;
use crate::layout::{FailureReason, Layout, LayoutStatus};
use crate::site::SiteData;
use crate::strategy::Strategy;
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

/// A queued or finished generation
struct Job {
    site: Arc<SiteData>,
    request: GenerationRequest,
    strategy: Strategy,
    /// Incremented every time the layout is superseded
    generation: u64,
    cancel: CancellationToken,
    layout: Layout,
}

#[derive(Default)]
struct QueueState {
    /// Jobs in submission order
    jobs: IndexMap<LayoutID, Job>,
    /// Jobs waiting for a worker, with the generation they were queued as
    pending: VecDeque<(LayoutID, u64)>,
    /// Layouts with a claim that has not been finished
    in_flight: HashSet<LayoutID>,
}

/// A generation handed to a worker.
///
/// Every claim must be passed back to [`LayoutQueue::finish`]; until then no other generation of
/// the same layout can be claimed.
pub struct Claim {
    /// The layout to generate
    pub layout_id: LayoutID,
    generation: u64,
    site: Arc<SiteData>,
    request: GenerationRequest,
    strategy: Strategy,
    cancel: CancellationToken,
}

impl Claim {
    /// Run the generation
    pub fn run(&self, engine: &LayoutEngine) -> Layout {
        engine.generate(&self.site, &self.request, self.strategy, &self.cancel)
    }
}

/// Layout generations waiting for, or finished by, a pool of workers
#[derive(Default)]
pub struct LayoutQueue {
    state: Mutex<QueueState>,
}

impl LayoutQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a generation.
    ///
    /// Fails with [`EngineError::GenerationInProgress`] if the layout already has a queued or
    /// processing generation.
    pub fn submit(
        &self,
        site: Arc<SiteData>,
        request: GenerationRequest,
        strategy: Strategy,
    ) -> Result<(), EngineError> {
        let mut state = self.lock();
        let id = request.layout_id.clone();
        let generation = match state.jobs.get(&id) {
            Some(job) if !job.layout.status().is_terminal() => {
                return Err(EngineError::GenerationInProgress(id));
            }
            Some(job) => job.generation + 1,
            None => 0,
        };
        queue_job(&mut state, site, request, strategy, generation);
        info!("Queued generation of layout {id}");

        Ok(())
    }

    /// Queue a generation, cancelling any generation already in flight for the layout
    pub fn supersede(&self, site: Arc<SiteData>, request: GenerationRequest, strategy: Strategy) {
        let mut state = self.lock();
        let id = request.layout_id.clone();
        let generation = match state.jobs.get(&id) {
            Some(job) => {
                if !job.layout.status().is_terminal() {
                    info!("Superseding in-flight generation of layout {id}");
                    job.cancel.cancel();
                }
                job.generation + 1
            }
            None => 0,
        };
        queue_job(&mut state, site, request, strategy, generation);
    }

    /// Cancel a layout's generation.
    ///
    /// A queued layout fails immediately. A processing layout fails once its worker next checks
    /// for cancellation.
    pub fn cancel(&self, id: &LayoutID) -> Result<(), EngineError> {
        let mut state = self.lock();
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownLayout(id.clone()))?;

        match job.layout.status() {
            LayoutStatus::Queued => {
                job.cancel.cancel();
                job.layout.fail(
                    FailureReason::Cancelled,
                    format!("Generation of layout {id} was cancelled"),
                )?;
                info!("Cancelled queued layout {id}");
            }
            LayoutStatus::Processing => {
                job.cancel.cancel();
                info!("Requested cancellation of layout {id}");
            }
            from => {
                return Err(EngineError::InvalidTransition {
                    id: id.clone(),
                    from,
                    to: LayoutStatus::Failed,
                });
            }
        }

        Ok(())
    }

    /// The current status of a layout
    pub fn status(&self, id: &LayoutID) -> Option<LayoutStatus> {
        self.lock().jobs.get(id).map(|job| job.layout.status())
    }

    /// A snapshot of a layout
    pub fn layout(&self, id: &LayoutID) -> Option<Layout> {
        self.lock().jobs.get(id).map(|job| job.layout.clone())
    }

    /// Snapshots of every layout, in submission order
    pub fn layouts(&self) -> Vec<Layout> {
        self.lock()
            .jobs
            .values()
            .map(|job| job.layout.clone())
            .collect()
    }

    /// Number of generations waiting for a worker, including any held back behind a superseded
    /// generation
    pub fn pending_count(&self) -> usize {
        let state = self.lock();
        state
            .pending
            .iter()
            .filter(|(id, generation)| is_claimable(&state, id, *generation))
            .count()
    }

    /// Take the next queued generation and mark its layout as processing.
    ///
    /// Generations whose layout still has an unfinished claim are left in the queue.
    pub fn claim_next(&self) -> Option<Claim> {
        let mut state = self.lock();
        let mut index = 0;
        while let Some((id, generation)) = state.pending.get(index).cloned() {
            if !is_claimable(&state, &id, generation) {
                debug!("Skipping stale queue entry for layout {id}");
                state.pending.remove(index);
                continue;
            }
            if state.in_flight.contains(&id) {
                debug!("Layout {id} is waiting for its superseded generation to finish");
                index += 1;
                continue;
            }

            state.pending.remove(index);
            let job = state.jobs.get_mut(&id)?;
            if let Err(err) = job.layout.transition(LayoutStatus::Processing) {
                warn!("{err}");
                continue;
            }
            let claim = Claim {
                layout_id: id.clone(),
                generation,
                site: Arc::clone(&job.site),
                request: job.request.clone(),
                strategy: job.strategy,
                cancel: job.cancel.clone(),
            };
            state.in_flight.insert(id);
            return Some(claim);
        }

        None
    }

    /// Store the result of a claimed generation.
    ///
    /// Returns `false` if the result was discarded because the layout has since been
    /// superseded.
    pub fn finish(&self, claim: &Claim, mut layout: Layout) -> bool {
        let mut state = self.lock();
        state.in_flight.remove(&claim.layout_id);
        let Some(job) = state.jobs.get_mut(&claim.layout_id) else {
            return false;
        };
        if job.generation != claim.generation {
            info!(
                "Discarding superseded result for layout {}",
                claim.layout_id
            );
            return false;
        }

        layout.created_at = job.layout.created_at;
        job.layout = layout;
        true
    }

    /// Drain the queue using `n_workers` threads, returning the number of generations run
    pub fn run_workers(&self, engine: &LayoutEngine, n_workers: usize) -> usize {
        let n_workers = n_workers.max(1);
        debug!("Starting {n_workers} layout workers");
        thread::scope(|scope| {
            let handles: Vec<_> = (0..n_workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut count = 0;
                        while let Some(claim) = self.claim_next() {
                            let layout = claim.run(engine);
                            self.finish(&claim, layout);
                            count += 1;
                        }
                        count
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(0))
                .sum()
        })
    }
}

fn queue_job(
    state: &mut QueueState,
    site: Arc<SiteData>,
    request: GenerationRequest,
    strategy: Strategy,
    generation: u64,
) {
    let id = request.layout_id.clone();
    let layout = Layout::new(
        id.clone(),
        site.site.id.clone(),
        strategy,
        request.target_capacity,
    );
    state.jobs.insert(
        id.clone(),
        Job {
            site,
            request,
            strategy,
            generation,
            cancel: CancellationToken::new(),
            layout,
        },
    );
    state.pending.push_back((id, generation));
}

fn is_claimable(state: &QueueState, id: &LayoutID, generation: u64) -> bool {
    state.jobs.get(id).is_some_and(|job| {
        job.generation == generation && job.layout.status() == LayoutStatus::Queued
    })
}
