//! JobDispatcher
//!
//! Starts background fetch jobs and routes their outcomes back to the
//! foreground context.
//! Responsibilities:
//!   • Keep at most one in-flight job per `JobKey`; later submits for the
//!     same key attach to it instead of fetching again
//!   • Run job futures on the tokio worker pool, bounded by a semaphore and
//!     a per-kind timeout
//!   • On completion, write the `ResultCache` and fan the event out to every
//!     waiting `JobHandle`
//!
//! Workers never touch the cache. They only send a `Completion` over the
//! channel; all mutation happens in `complete()`, called from the
//! foreground loop.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use market::FetchError;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tracing::{Instrument, debug, warn};

use crate::cache::ResultCache;
use crate::config::JobTimeouts;
use crate::jobs::key::{JobKey, JobValue};
use crate::logger::{job_span, warn_if_slow};
use crate::metrics::Counters;
use crate::time::Clock;

pub type JobOutcome = Result<JobValue, FetchError>;

/// Raw result crossing from a worker back to the foreground.
#[derive(Debug)]
pub struct Completion {
    pub key: JobKey,
    pub generation: u64,
    pub outcome: JobOutcome,
}

/// Settled outcome of a job, as seen by its waiters.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Completed { key: JobKey, value: JobValue },
    Failed { key: JobKey, error: FetchError },
}

impl JobEvent {
    pub fn key(&self) -> &JobKey {
        match self {
            Self::Completed { key, .. } | Self::Failed { key, .. } => key,
        }
    }

    pub fn value(&self) -> Option<&JobValue> {
        match self {
            Self::Completed { value, .. } => Some(value),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Completed { .. } => None,
        }
    }
}

/// Receiver side of one `submit` call.
#[derive(Debug)]
pub struct JobHandle {
    generation: u64,
    attached: bool,
    rx: oneshot::Receiver<JobEvent>,
}

impl JobHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` if this submit joined a job that was already in flight.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Wait for the job to settle. `None` if the dispatcher was dropped
    /// before the job finished.
    pub async fn wait(self) -> Option<JobEvent> {
        self.rx.await.ok()
    }
}

struct InFlight {
    generation: u64,
    waiters: Vec<oneshot::Sender<JobEvent>>,
}

pub struct JobDispatcher {
    in_flight: HashMap<JobKey, InFlight>,
    cache: ResultCache,
    completion_tx: mpsc::UnboundedSender<Completion>,
    permits: Arc<Semaphore>,
    timeouts: JobTimeouts,
    clock: Arc<dyn Clock>,
    next_generation: u64,
    counters: Counters,
}

impl JobDispatcher {
    /// Returns the dispatcher and the completion channel the foreground must
    /// drain into [`JobDispatcher::complete`].
    pub fn new(
        cache: ResultCache,
        max_concurrent_jobs: usize,
        timeouts: JobTimeouts,
        clock: Arc<dyn Clock>,
        counters: Counters,
    ) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let dispatcher = Self {
            in_flight: HashMap::new(),
            cache,
            completion_tx,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            timeouts,
            clock,
            next_generation: 1,
            counters,
        };

        (dispatcher, completion_rx)
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn is_in_flight(&self, key: &JobKey) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Cache lookup that records hit/miss counters.
    pub fn lookup(&self, key: &JobKey) -> Option<&JobValue> {
        let hit = self.cache.get(key);
        if hit.is_some() {
            Counters::bump(&self.counters.cache_hits);
        } else {
            Counters::bump(&self.counters.cache_misses);
        }
        hit
    }

    /// Submit `work` under `key`.
    ///
    /// If a job with an equal key is in flight, `work` is dropped without
    /// being polled and the returned handle receives that job's outcome.
    /// Otherwise `work` is spawned on the worker pool.
    ///
    /// Never fails synchronously; must be called from within a tokio runtime.
    pub fn submit<F>(&mut self, key: JobKey, work: F) -> JobHandle
    where
        F: Future<Output = JobOutcome> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        if let Some(entry) = self.in_flight.get_mut(&key) {
            entry.waiters.push(tx);
            Counters::bump(&self.counters.jobs_attached);
            debug!(key = %key, generation = entry.generation, "attached to in-flight job");

            return JobHandle {
                generation: entry.generation,
                attached: true,
                rx,
            };
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        self.in_flight.insert(
            key.clone(),
            InFlight {
                generation,
                waiters: vec![tx],
            },
        );
        Counters::bump(&self.counters.jobs_started);

        self.spawn_worker(key.clone(), generation, work);

        JobHandle {
            generation,
            attached: false,
            rx,
        }
    }

    fn timeout_for(&self, key: &JobKey) -> Duration {
        if key.is_icon() {
            self.timeouts.icon
        } else {
            self.timeouts.market
        }
    }

    fn spawn_worker<F>(&self, key: JobKey, generation: u64, work: F)
    where
        F: Future<Output = JobOutcome> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let tx = self.completion_tx.clone();
        let limit = self.timeout_for(&key);
        let span = job_span(&key, generation);

        tokio::spawn(
            async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    warn!("worker pool closed; job dropped");
                    return;
                };

                let guarded = AssertUnwindSafe(work).catch_unwind();
                let outcome =
                    match tokio::time::timeout(limit, warn_if_slow("job", limit / 2, guarded)).await
                    {
                        Ok(Ok(outcome)) => outcome,
                        Ok(Err(_)) => Err(FetchError::transport("job panicked")),
                        Err(_) => Err(FetchError::transport(format!(
                            "timed out after {}s",
                            limit.as_secs_f32()
                        ))),
                    };

                let completion = Completion {
                    key,
                    generation,
                    outcome,
                };

                if tx.send(completion).is_err() {
                    debug!("completion receiver gone; result discarded");
                }
            }
            .instrument(span),
        );
    }

    /// Settle a completion received from the worker channel.
    ///
    /// Returns the event that was delivered to the waiters, or `None` if the
    /// completion did not match the current in-flight generation for its key.
    pub fn complete(&mut self, completion: Completion) -> Option<JobEvent> {
        let Completion {
            key,
            generation,
            outcome,
        } = completion;

        let matches = self
            .in_flight
            .get(&key)
            .is_some_and(|e| e.generation == generation);

        if !matches {
            Counters::bump(&self.counters.results_discarded);
            debug!(key = %key, generation, "completion without matching in-flight job; discarded");
            return None;
        }

        let entry = self.in_flight.remove(&key)?;

        let event = match outcome {
            Ok(value) if value.fits(&key) => {
                self.cache.put(key.clone(), value.clone(), self.clock.now());
                Counters::bump(&self.counters.jobs_completed);
                JobEvent::Completed { key, value }
            }
            Ok(value) => {
                Counters::bump(&self.counters.jobs_failed);
                let error = FetchError::data_shape(format!(
                    "{} job produced a {} value",
                    key.kind(),
                    value.kind()
                ));
                JobEvent::Failed { key, error }
            }
            Err(error) => {
                Counters::bump(&self.counters.jobs_failed);
                JobEvent::Failed { key, error }
            }
        };

        let waiters = entry.waiters.len();
        for w in entry.waiters {
            // A dropped handle just means nobody is waiting on that submit.
            let _ = w.send(event.clone());
        }

        debug!(key = %event.key(), generation, waiters, "job settled");

        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartRange;
    use crate::time::SystemClock;
    use market::IconImage;

    fn dispatcher() -> (JobDispatcher, mpsc::UnboundedReceiver<Completion>) {
        JobDispatcher::new(
            ResultCache::new(16),
            4,
            JobTimeouts::default(),
            Arc::new(SystemClock),
            Counters::default(),
        )
    }

    fn icon_value(id: &str) -> JobValue {
        JobValue::Icon(Arc::new(IconImage {
            asset_id: id.into(),
            bytes: vec![0xAB],
        }))
    }

    async fn never_polled() -> JobOutcome {
        panic!("duplicate work must never be polled")
    }

    async fn boom() -> JobOutcome {
        panic!("boom")
    }

    #[tokio::test]
    async fn duplicate_submit_attaches_and_skips_work() {
        let (mut d, mut rx) = dispatcher();
        let key = JobKey::icon("bitcoin".into());

        let first = d.submit(key.clone(), async { Ok(icon_value("bitcoin")) });
        let second = d.submit(key.clone(), never_polled());

        assert!(!first.is_attached());
        assert!(second.is_attached());
        assert_eq!(first.generation(), second.generation());
        assert_eq!(d.in_flight_len(), 1);

        let c = rx.recv().await.unwrap();
        d.complete(c).unwrap();

        assert!(first.wait().await.unwrap().value().is_some());
        assert!(second.wait().await.unwrap().value().is_some());
        assert!(!d.is_in_flight(&key));
        assert_eq!(Counters::get(&d.counters().jobs_started), 1);
        assert_eq!(Counters::get(&d.counters().jobs_attached), 1);
    }

    #[tokio::test]
    async fn failure_is_not_cached_and_next_submit_runs_again() {
        let (mut d, mut rx) = dispatcher();
        let key = JobKey::icon("bitcoin".into());

        let h = d.submit(key.clone(), async { Err(FetchError::transport("503")) });
        let c = rx.recv().await.unwrap();
        let ev = d.complete(c).unwrap();

        assert!(ev.error().is_some());
        assert!(h.wait().await.unwrap().error().is_some());
        assert!(d.cache().get(&key).is_none());

        let retry = d.submit(key.clone(), async { Ok(icon_value("bitcoin")) });
        assert!(!retry.is_attached());
        let c = rx.recv().await.unwrap();
        d.complete(c).unwrap();
        assert!(d.cache().icon(&"bitcoin".into()).is_some());
    }

    #[tokio::test]
    async fn stale_generation_is_discarded() {
        let (mut d, _rx) = dispatcher();
        let key = JobKey::ohlc(
            "bitcoin".into(),
            ChartRange::Days7,
            chrono::Utc::now().date_naive(),
        );

        let _h = d.submit(key.clone(), futures::future::pending());

        let late = Completion {
            key: key.clone(),
            generation: 999,
            outcome: Err(FetchError::transport("late")),
        };

        assert!(d.complete(late).is_none());
        assert!(d.is_in_flight(&key));
        assert_eq!(Counters::get(&d.counters().results_discarded), 1);
    }

    #[tokio::test]
    async fn wrong_value_kind_becomes_data_shape_failure() {
        let (mut d, mut rx) = dispatcher();

        let _h = d.submit(JobKey::Snapshot, async { Ok(icon_value("bitcoin")) });
        let ev = d.complete(rx.recv().await.unwrap()).unwrap();

        assert!(ev.error().unwrap().is_data_shape());
        assert!(d.cache().snapshot().is_none());
    }

    #[tokio::test]
    async fn panicking_job_settles_as_transport_failure() {
        let (mut d, mut rx) = dispatcher();
        let key = JobKey::icon("bitcoin".into());

        let h = d.submit(key.clone(), boom());
        d.complete(rx.recv().await.unwrap()).unwrap();

        let ev = h.wait().await.unwrap();
        assert!(matches!(ev.error(), Some(FetchError::Transport(_))));
        assert!(!d.is_in_flight(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn icon_job_times_out_with_icon_limit() {
        let (mut d, mut rx) = dispatcher();

        let _h = d.submit(JobKey::icon("bitcoin".into()), futures::future::pending());
        let c = rx.recv().await.unwrap();

        match c.outcome {
            Err(FetchError::Transport(msg)) => assert!(msg.contains("timed out after 10s")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn handle_resolves_none_when_dispatcher_dropped() {
        let (mut d, _rx) = dispatcher();
        let h = d.submit(JobKey::Snapshot, futures::future::pending());
        drop(d);
        assert!(h.wait().await.is_none());
    }
}
