#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use market::{
    AssetId, AssetSnapshot, FetchError, IconTransport, MarketDataProvider, OhlcSeries, RawOhlcRow,
};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;
use tracker::metrics::Counters;
use tracker::time::Clock;
use tracker::{AppConfig, ChartRange, Presentation, RefreshInterval, Tracker, TrackerHandle};

/// Holds fetches until released. Starts open.
pub struct Gate(watch::Sender<bool>);

impl Default for Gate {
    fn default() -> Self {
        Self(watch::channel(true).0)
    }
}

impl Gate {
    pub fn hold(&self) {
        self.0.send_replace(false);
    }

    pub fn release(&self) {
        self.0.send_replace(true);
    }

    async fn pass(&self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[derive(Default)]
pub struct FakeProvider {
    snapshot: Mutex<Option<Result<Vec<AssetSnapshot>, FetchError>>>,
    ohlc: Mutex<HashMap<AssetId, Result<Vec<RawOhlcRow>, FetchError>>>,
    pub snapshot_calls: AtomicUsize,
    pub ohlc_calls: AtomicUsize,
    pub snapshot_gate: Gate,
    pub ohlc_gate: Gate,
}

impl FakeProvider {
    pub fn with_snapshot(snaps: Vec<AssetSnapshot>) -> Arc<Self> {
        let p = Self::default();
        p.set_snapshot(Ok(snaps));
        Arc::new(p)
    }

    pub fn set_snapshot(&self, r: Result<Vec<AssetSnapshot>, FetchError>) {
        *self.snapshot.lock() = Some(r);
    }

    pub fn set_ohlc(&self, id: &str, r: Result<Vec<RawOhlcRow>, FetchError>) {
        self.ohlc.lock().insert(id.into(), r);
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn ohlc_calls(&self) -> usize {
        self.ohlc_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    async fn fetch_snapshot(&self, _ids: &[AssetId]) -> Result<Vec<AssetSnapshot>, FetchError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        self.snapshot_gate.pass().await;
        self.snapshot
            .lock()
            .clone()
            .unwrap_or_else(|| Err(FetchError::transport("no snapshot fixture")))
    }

    async fn fetch_ohlc(&self, id: &AssetId, _days: u32) -> Result<Vec<RawOhlcRow>, FetchError> {
        self.ohlc_calls.fetch_add(1, Ordering::SeqCst);
        self.ohlc_gate.pass().await;
        self.ohlc
            .lock()
            .get(id)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::transport("no ohlc fixture")))
    }
}

/// Icon bytes are the URL itself. Listed URLs fail or never answer.
#[derive(Default)]
pub struct FakeIcons {
    pub failing: HashSet<String>,
    pub hanging: HashSet<String>,
    pub calls: AtomicUsize,
    pub gate: Gate,
}

impl FakeIcons {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IconTransport for FakeIcons {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.pass().await;

        if self.failing.contains(url) {
            return Err(FetchError::transport("HTTP status client error (404 Not Found)"));
        }
        if self.hanging.contains(url) {
            futures::future::pending::<()>().await;
        }
        Ok(url.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    pub name: String,
    pub range: ChartRange,
    pub candles: usize,
    pub ascending: bool,
}

#[derive(Default, Debug)]
pub struct Screen {
    /// Asset ids of each rendered table, in display order.
    pub tables: Vec<Vec<String>>,
    pub charts: Vec<RenderedChart>,
    pub icons: Vec<String>,
    pub errors: Vec<String>,
    pub statuses: Vec<String>,
}

/// Records every call; the test keeps a clone of the inner handle.
#[derive(Clone, Default)]
pub struct RecordingPresentation(pub Arc<Mutex<Screen>>);

impl Presentation for RecordingPresentation {
    fn render_snapshot_table(&mut self, rows: &[AssetSnapshot]) {
        self.0
            .lock()
            .tables
            .push(rows.iter().map(|s| s.id.to_string()).collect());
    }

    fn render_chart(&mut self, series: &OhlcSeries, asset_name: &str, range: ChartRange) {
        let candles = series.candles();
        self.0.lock().charts.push(RenderedChart {
            name: asset_name.to_string(),
            range,
            candles: candles.len(),
            ascending: candles.windows(2).all(|w| w[0].ts < w[1].ts),
        });
    }

    fn update_icon(&mut self, asset_id: &AssetId, _bytes: &[u8]) {
        self.0.lock().icons.push(asset_id.to_string());
    }

    fn report_error(&mut self, message: &str) {
        self.0.lock().errors.push(message.to_string());
    }

    fn set_status(&mut self, text: &str) {
        self.0.lock().statuses.push(text.to_string());
    }
}

pub struct Harness {
    pub handle: TrackerHandle,
    pub screen: Arc<Mutex<Screen>>,
    pub counters: Counters,
    pub task: JoinHandle<()>,
}

/// Config with a long refresh interval, so only explicit refreshes fire.
pub fn config(assets: &[&str]) -> AppConfig {
    AppConfig {
        assets: assets.iter().map(|a| AssetId::from(*a)).collect(),
        refresh: RefreshInterval::Min10,
        ..AppConfig::default()
    }
}

pub fn start(
    cfg: AppConfig,
    provider: Arc<FakeProvider>,
    icons: Arc<FakeIcons>,
    clock: Arc<dyn Clock>,
) -> Harness {
    let presentation = RecordingPresentation::default();
    let screen = Arc::clone(&presentation.0);

    let (tracker, handle) = Tracker::new(cfg, provider, icons, Box::new(presentation), clock);
    let counters = tracker.counters().clone();

    // Keep the test's span so captured logs are attributed to it.
    let task = tokio::spawn(tracker.run().instrument(tracing::Span::current()));

    Harness {
        handle,
        screen,
        counters,
        task,
    }
}

pub async fn wait_until(what: &str, mut ready: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !ready() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn snap(id: &str, name: &str, price: f64) -> AssetSnapshot {
    AssetSnapshot {
        id: id.into(),
        name: name.to_string(),
        symbol: id.chars().take(3).collect(),
        price,
        market_cap: price * 1_000_000.0,
        change_24h_pct: 0.5,
        change_7d_pct: -1.0,
        volume_24h: 1_000.0,
        circulating_supply: 1_000_000.0,
        total_supply: None,
        icon_url: None,
    }
}

pub fn with_icon(mut s: AssetSnapshot) -> AssetSnapshot {
    s.icon_url = Some(icon_url(s.id.as_str()));
    s
}

pub fn icon_url(id: &str) -> String {
    format!("https://assets.example/{id}.png")
}

/// `n` ascending 4-hour candles.
pub fn ascending_rows(n: usize) -> Vec<RawOhlcRow> {
    (0..n)
        .map(|i| {
            let ts = 1_709_251_200_000.0 + i as f64 * 14_400_000.0;
            let p = 100.0 + i as f64;
            [ts, p, p + 2.0, p - 2.0, p + 1.0]
        })
        .collect()
}
