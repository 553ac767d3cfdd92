//! Foreground loop.
//!
//! `Tracker::run` is the single owner of the dispatcher (and through it the
//! cache), the entity registry and the presentation. Commands, job
//! completions and refresh ticks are multiplexed onto it; workers never
//! touch any of that state.

mod command;
mod flows;

use std::sync::Arc;

use market::{AssetId, IconTransport, MarketDataProvider};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cache::ResultCache;
use crate::config::{AppConfig, ChartRange, RefreshInterval};
use crate::error::TrackerError;
use crate::jobs::{Completion, JobDispatcher};
use crate::metrics::Counters;
use crate::presentation::Presentation;
use crate::registry::{EntityRegistry, SortSpec};
use crate::scheduler::{RefreshReason, RefreshScheduler};
use crate::time::Clock;

pub use command::TrackerCommand;

/// Foreground task. Owns the dispatcher and the registry, and is the only
/// place either is touched.
///
/// Job results reach the display through the `JobEvent` that
/// `JobDispatcher::complete` returns for each `Completion`. The
/// `JobHandle`s handed out by `submit` are dropped here; the waiter side
/// exists for other callers of the dispatcher.
pub struct Tracker {
    cfg: AppConfig,
    dispatcher: JobDispatcher,
    completions: mpsc::UnboundedReceiver<Completion>,
    commands: mpsc::UnboundedReceiver<TrackerCommand>,
    registry: EntityRegistry,
    scheduler: RefreshScheduler,
    provider: Arc<dyn MarketDataProvider>,
    icons: Arc<dyn IconTransport>,
    presentation: Box<dyn Presentation>,
    clock: Arc<dyn Clock>,
}

enum Wake {
    Command(TrackerCommand),
    Completion(Completion),
    Refresh(RefreshReason),
    /// Every handle dropped.
    Closed,
}

impl Tracker {
    pub fn new(
        cfg: AppConfig,
        provider: Arc<dyn MarketDataProvider>,
        icons: Arc<dyn IconTransport>,
        presentation: Box<dyn Presentation>,
        clock: Arc<dyn Clock>,
    ) -> (Self, TrackerHandle) {
        let (dispatcher, completions) = JobDispatcher::new(
            ResultCache::new(cfg.cache_capacity),
            cfg.max_concurrent_jobs,
            cfg.timeouts,
            Arc::clone(&clock),
            Counters::default(),
        );
        let (tx, commands) = mpsc::unbounded_channel();

        let tracker = Self {
            scheduler: RefreshScheduler::new(cfg.refresh),
            cfg,
            dispatcher,
            completions,
            commands,
            registry: EntityRegistry::new(),
            provider,
            icons,
            presentation,
            clock,
        };

        (tracker, TrackerHandle { tx })
    }

    pub fn counters(&self) -> &Counters {
        self.dispatcher.counters()
    }

    /// Load once, arm the timer, then serve until shutdown.
    pub async fn run(mut self) {
        info!(
            assets = self.cfg.assets.len(),
            refresh = %self.cfg.refresh,
            "tracker started"
        );

        self.request_snapshot(RefreshReason::Manual);
        self.scheduler.arm(self.cfg.refresh);

        loop {
            let wake = tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => Wake::Command(cmd),
                    None => Wake::Closed,
                },
                Some(completion) = self.completions.recv() => Wake::Completion(completion),
                reason = self.scheduler.tick() => Wake::Refresh(reason),
            };

            match wake {
                Wake::Command(TrackerCommand::Shutdown) | Wake::Closed => break,
                Wake::Command(cmd) => self.handle_command(cmd),
                Wake::Completion(completion) => {
                    if let Some(event) = self.dispatcher.complete(completion) {
                        self.on_event(event);
                    }
                }
                Wake::Refresh(reason) => self.request_snapshot(reason),
            }
        }

        info!(
            in_flight = self.dispatcher.in_flight_len(),
            "tracker stopped; abandoning in-flight jobs"
        );
    }

    fn handle_command(&mut self, cmd: TrackerCommand) {
        debug!(?cmd, "command");
        match cmd {
            TrackerCommand::RefreshNow => {
                let reason = self.scheduler.trigger_now();
                self.request_snapshot(reason);
            }
            TrackerCommand::SetInterval(interval) => {
                self.scheduler.set_interval(interval);
                self.presentation
                    .set_status(&format!("Auto-refresh every {interval}"));
            }
            TrackerCommand::ShowChart { asset_id, range } => self.request_chart(asset_id, range),
            TrackerCommand::ChartForRow { row, range } => self.chart_for_row(row, range),
            TrackerCommand::Sort(spec) => {
                self.registry.sort_by(spec);
                self.rerender_table();
            }
            TrackerCommand::Filter(text) => {
                self.registry.set_filter(&text);
                self.rerender_table();
            }
            // Handled by the loop.
            TrackerCommand::Shutdown => {}
        }
    }

    fn rerender_table(&mut self) {
        let rows = self.registry.visible();
        self.presentation.render_snapshot_table(&rows);
    }
}

/// Cloneable sender side of the tracker. Dropping every handle stops the
/// loop.
#[derive(Clone, Debug)]
pub struct TrackerHandle {
    tx: mpsc::UnboundedSender<TrackerCommand>,
}

impl TrackerHandle {
    pub fn send(&self, cmd: TrackerCommand) -> Result<(), TrackerError> {
        self.tx.send(cmd).map_err(|_| TrackerError::Stopped)
    }

    pub fn refresh_now(&self) -> Result<(), TrackerError> {
        self.send(TrackerCommand::RefreshNow)
    }

    pub fn set_interval(&self, interval: RefreshInterval) -> Result<(), TrackerError> {
        self.send(TrackerCommand::SetInterval(interval))
    }

    pub fn show_chart(&self, asset_id: AssetId, range: ChartRange) -> Result<(), TrackerError> {
        self.send(TrackerCommand::ShowChart { asset_id, range })
    }

    pub fn chart_for_row(&self, row: usize, range: ChartRange) -> Result<(), TrackerError> {
        self.send(TrackerCommand::ChartForRow { row, range })
    }

    pub fn sort(&self, spec: SortSpec) -> Result<(), TrackerError> {
        self.send(TrackerCommand::Sort(spec))
    }

    pub fn filter(&self, text: impl Into<String>) -> Result<(), TrackerError> {
        self.send(TrackerCommand::Filter(text.into()))
    }

    pub fn shutdown(&self) -> Result<(), TrackerError> {
        self.send(TrackerCommand::Shutdown)
    }
}
