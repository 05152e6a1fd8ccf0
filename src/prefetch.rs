//! Region summary prefetching: a deduplicating priority queue with bounded
//! concurrency and capped exponential backoff, plus the per-galaxy bulk loader
//! that only falls back to the queue when the bulk requests fail.
//!
//! Everything here is driven from the frame loop through `pump`. Nothing
//! blocks and nothing is awaited; in-flight requests are polled once per call.

use std::collections::{HashMap, VecDeque};
use std::task::Poll;

use bevy::log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::coords::REGION_COUNT;
use crate::data::{
    poll_fetch, FetchFuture, GalaxyRegionSummaries, GalaxyStarColors, MapDataSource,
    RegionStarColors,
};
use crate::errors::FetchError;
use crate::summaries::{region_key, RegionSummary, RegionSummaryCache};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    pub max_concurrent: usize,
    pub max_attempts: u32,
    /// Delay before the first retry, in seconds.
    pub base_backoff: f32,
    pub max_backoff: f32,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 6,
            max_attempts: 4,
            base_backoff: 0.5,
            max_backoff: 8.0,
        }
    }
}

impl PrefetchConfig {
    /// Delay before retrying after `failures` consecutive failures.
    pub fn backoff_for(&self, failures: u32) -> f32 {
        let exponent = failures.saturating_sub(1).min(16);
        (self.base_backoff * 2f32.powi(exponent as i32)).min(self.max_backoff)
    }
}

// =============================================================================
// Tasks and Events
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTask {
    pub server: char,
    pub galaxy: u8,
    pub region: u8,
    pub key: String,
    pub priority: bool,
}

impl QueueTask {
    pub fn new(server: char, galaxy: u8, region: u8) -> Self {
        Self {
            server,
            galaxy,
            region,
            key: region_key(server, galaxy, region),
            priority: false,
        }
    }

    pub fn prioritized(mut self) -> Self {
        self.priority = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrefetchEvent {
    Fetched { key: String },
    Retrying { key: String, attempt: u32, delay: f32 },
    Failed { key: String, error: FetchError },
}

struct QueuedTask {
    task: QueueTask,
    failures: u32,
    ready_at: f32,
}

struct InFlight {
    task: QueueTask,
    failures: u32,
    fetch: FetchFuture<RegionStarColors>,
}

// =============================================================================
// Queue
// =============================================================================

pub struct SummaryPrefetchQueue {
    config: PrefetchConfig,
    pending: VecDeque<QueuedTask>,
    in_flight: HashMap<String, InFlight>,
    destroyed: bool,
    requests_issued: u64,
}

impl SummaryPrefetchQueue {
    pub fn new(config: PrefetchConfig) -> Self {
        Self {
            config,
            pending: VecDeque::new(),
            in_flight: HashMap::new(),
            destroyed: false,
            requests_issued: 0,
        }
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.in_flight.contains_key(key) || self.pending.iter().any(|queued| queued.task.key == key)
    }

    /// Queue a fetch. Returns `false` when the key is already in flight or
    /// queued, or the queue is destroyed. A priority task for a key that is
    /// already queued moves that entry to the front instead.
    pub fn enqueue(&mut self, task: QueueTask) -> bool {
        if self.destroyed || self.in_flight.contains_key(&task.key) {
            return false;
        }

        if let Some(position) = self.pending.iter().position(|queued| queued.task.key == task.key) {
            if task.priority && !self.pending[position].task.priority {
                if let Some(mut queued) = self.pending.remove(position) {
                    queued.task.priority = true;
                    self.pending.push_front(queued);
                }
            }
            return false;
        }

        let queued = QueuedTask {
            task,
            failures: 0,
            ready_at: 0.0,
        };
        if queued.task.priority {
            self.pending.push_front(queued);
        } else {
            self.pending.push_back(queued);
        }
        true
    }

    /// Drop queued tasks that do not belong to `galaxy`. In-flight requests
    /// are left to finish; their results are still valid cache data.
    pub fn retain_galaxy(&mut self, server: char, galaxy: u8) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|queued| queued.task.server == server && queued.task.galaxy == galaxy);
        let dropped = before - self.pending.len();
        if dropped > 0 {
            debug!("prefetch: dropped {} queued tasks outside {}{}", dropped, server, galaxy);
        }
        dropped
    }

    /// Start ready tasks up to the concurrency limit, then poll every
    /// in-flight request once. `now` is the frame clock in seconds.
    pub fn pump(
        &mut self,
        now: f32,
        source: &dyn MapDataSource,
        cache: &mut RegionSummaryCache,
    ) -> Vec<PrefetchEvent> {
        if self.destroyed {
            return Vec::new();
        }

        self.start_ready(now, source);

        let mut finished = Vec::new();
        for (key, in_flight) in self.in_flight.iter_mut() {
            if let Poll::Ready(result) = poll_fetch(&mut in_flight.fetch) {
                finished.push((key.clone(), result));
            }
        }

        let mut events = Vec::with_capacity(finished.len());
        for (key, result) in finished {
            let Some(in_flight) = self.in_flight.remove(&key) else {
                continue;
            };
            match result {
                Ok(colors) => {
                    cache.insert(key.clone(), RegionSummary::from_colors(&colors));
                    events.push(PrefetchEvent::Fetched { key });
                }
                Err(error) => events.push(self.handle_failure(now, in_flight, error)),
            }
        }
        events
    }

    fn start_ready(&mut self, now: f32, source: &dyn MapDataSource) {
        while self.in_flight.len() < self.config.max_concurrent {
            let Some(position) = self.pending.iter().position(|queued| queued.ready_at <= now) else {
                break;
            };
            let Some(queued) = self.pending.remove(position) else {
                break;
            };
            let task = queued.task;
            let fetch = source.region_star_colors(task.server, task.galaxy, task.region);
            self.requests_issued += 1;
            self.in_flight.insert(
                task.key.clone(),
                InFlight {
                    task,
                    failures: queued.failures,
                    fetch,
                },
            );
        }
    }

    fn handle_failure(&mut self, now: f32, in_flight: InFlight, error: FetchError) -> PrefetchEvent {
        let failures = in_flight.failures + 1;
        let key = in_flight.task.key.clone();

        if failures >= self.config.max_attempts {
            warn!(
                "prefetch: giving up on {} after {} attempts: {}",
                key, failures, error
            );
            return PrefetchEvent::Failed { key, error };
        }

        let delay = self.config.backoff_for(failures);
        debug!("prefetch: {} failed ({}), retry in {:.2}s", key, error, delay);
        self.pending.push_back(QueuedTask {
            task: in_flight.task,
            failures,
            ready_at: now + delay,
        });
        PrefetchEvent::Retrying {
            key,
            attempt: failures + 1,
            delay,
        }
    }

    /// Discard queued and in-flight work. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        let discarded = self.pending.len() + self.in_flight.len();
        self.pending.clear();
        self.in_flight.clear();
        info!("prefetch: destroyed, discarded {} tasks", discarded);
    }
}

// =============================================================================
// Galaxy Bulk Loader
// =============================================================================

enum GalaxyStage {
    Colors(FetchFuture<GalaxyStarColors>),
    Positions(FetchFuture<GalaxyRegionSummaries>),
    Done,
}

/// Loads every region summary of one galaxy, trying one bulk request first.
///
/// Bulk colours fill the cache completely. If that fails, bulk positions are
/// written as incomplete entries and every region still lacking colours is
/// handed to the queue.
pub struct GalaxyPrefetch {
    server: char,
    galaxy: u8,
    stage: GalaxyStage,
}

impl GalaxyPrefetch {
    pub fn start(server: char, galaxy: u8, source: &dyn MapDataSource) -> Self {
        info!("prefetch: bulk request for galaxy {}{}", server, galaxy);
        Self {
            server,
            galaxy,
            stage: GalaxyStage::Colors(source.galaxy_region_star_colors(server, galaxy)),
        }
    }

    pub fn server(&self) -> char {
        self.server
    }

    pub fn galaxy(&self) -> u8 {
        self.galaxy
    }

    pub fn is_done(&self) -> bool {
        matches!(self.stage, GalaxyStage::Done)
    }

    /// Advance the bulk requests. Returns the failures seen this call so the
    /// caller can surface them.
    pub fn pump(
        &mut self,
        source: &dyn MapDataSource,
        cache: &mut RegionSummaryCache,
        queue: &mut SummaryPrefetchQueue,
    ) -> Vec<FetchError> {
        let mut failures = Vec::new();

        if let GalaxyStage::Colors(fetch) = &mut self.stage {
            match poll_fetch(fetch) {
                Poll::Pending => return failures,
                Poll::Ready(Ok(colors)) => {
                    let written = cache.insert_galaxy(self.server, self.galaxy, &colors);
                    info!(
                        "prefetch: bulk colours for {}{} filled {} regions",
                        self.server, self.galaxy, written
                    );
                    // regions the response left out still need their own fetch
                    self.enqueue_incomplete(cache, queue);
                    self.stage = GalaxyStage::Done;
                    return failures;
                }
                Poll::Ready(Err(error)) => {
                    warn!(
                        "prefetch: bulk colours for {}{} failed ({}), falling back",
                        self.server, self.galaxy, error
                    );
                    failures.push(error);
                    self.stage = GalaxyStage::Positions(
                        source.galaxy_region_summaries(self.server, self.galaxy),
                    );
                }
            }
        }

        if let GalaxyStage::Positions(fetch) = &mut self.stage {
            match poll_fetch(fetch) {
                Poll::Pending => return failures,
                Poll::Ready(Ok(summaries)) => {
                    for positions in &summaries.regions {
                        cache.insert_positions(
                            region_key(self.server, self.galaxy, positions.region),
                            positions,
                        );
                    }
                }
                Poll::Ready(Err(error)) => {
                    warn!(
                        "prefetch: bulk positions for {}{} failed ({})",
                        self.server, self.galaxy, error
                    );
                    failures.push(error);
                }
            }
            self.enqueue_incomplete(cache, queue);
            self.stage = GalaxyStage::Done;
        }

        failures
    }

    fn enqueue_incomplete(&self, cache: &RegionSummaryCache, queue: &mut SummaryPrefetchQueue) {
        let mut queued = 0;
        for region in 0..REGION_COUNT {
            let task = QueueTask::new(self.server, self.galaxy, region);
            if cache.is_complete(&task.key) {
                continue;
            }
            if queue.enqueue(task) {
                queued += 1;
            }
        }
        if queued > 0 {
            info!(
                "prefetch: queued {} region fetches for {}{}",
                queued, self.server, self.galaxy
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
